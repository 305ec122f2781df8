//! Binds validated wire actions to driver commands.

use std::time::Duration;

use crate::catalog::{self, ActionError, RawAction};

use super::parser::Guard;

/// A bound driver action. The tagged sum keeps the executor's loop
/// monomorphic; capture slots are chosen by the executing block's index.
#[derive(Clone, Debug, PartialEq)]
pub enum DriverCommand {
    Navigate(String),
    Click(String),
    OuterHtml,
    ScrollToBottom,
    ScrollIntoView(String),
    Sleep(Duration),
    Listen(Vec<String>),
    EnableNetwork,
    EnableLifecycleEvents,
}

/// Binds one wire action to a driver command. Zero-arg sleeps bind the
/// query's render delay here, at parse time.
pub fn bind(action: &RawAction, render_delay: Duration) -> Result<DriverCommand, ActionError> {
    action.check_non_empty()?;
    match action.name() {
        "navigate" => {
            action.must_arg_count(&[1])?;
            catalog::parse_absolute_url(action.arg(1))?;
            Ok(DriverCommand::Navigate(action.arg(1).to_string()))
        }
        "click" => {
            action.must_arg_count(&[1])?;
            Ok(DriverCommand::Click(action.arg(1).to_string()))
        }
        "outer_html" => {
            action.must_arg_count(&[0])?;
            Ok(DriverCommand::OuterHtml)
        }
        "scroll" => {
            action.must_arg_count(&[0, 1])?;
            if action.args().is_empty() {
                Ok(DriverCommand::ScrollToBottom)
            } else {
                Ok(DriverCommand::ScrollIntoView(action.arg(1).to_string()))
            }
        }
        "sleep" => {
            action.must_arg_count(&[0, 1])?;
            let delay = if action.args().is_empty() {
                render_delay
            } else {
                catalog::parse_sleep_duration(action.arg(1))?
            };
            Ok(DriverCommand::Sleep(delay))
        }
        "listen" => {
            let events = catalog::parse_events(action.args())?;
            Ok(DriverCommand::Listen(events))
        }
        "eval" => {
            action.must_arg_count(&[1])?;
            Err(ActionError::EvalUnsupported)
        }
        "load_tab" => {
            action.must_arg_count(&[1])?;
            Err(ActionError::MisplacedLoadTab)
        }
        "element_exists" => {
            action.must_arg_count(&[1])?;
            Err(ActionError::GuardOnly)
        }
        other => Err(ActionError::UnknownName(other.to_string())),
    }
}

/// Binds a `while` guard action; only guard actions are legal here.
pub fn bind_guard(action: &RawAction) -> Result<Guard, ActionError> {
    action.check_non_empty()?;
    match action.name() {
        "element_exists" => {
            action.must_arg_count(&[1])?;
            Ok(Guard::ElementExists(action.arg(1).to_string()))
        }
        other => Err(ActionError::NotAGuard(other.to_string())),
    }
}

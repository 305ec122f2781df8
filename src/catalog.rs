//! Action catalog and argument validation.
//!
//! Defines the recognised action names, their arity policies, and the typing
//! rules for URL, duration, and lifecycle-event arguments. Everything here is
//! pure; binding to the browser driver happens in `query::binder`.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Page lifecycle events a `listen` action may wait for.
pub const LIFECYCLE_EVENTS: [&str; 10] = [
    "DOMContentLoaded",
    "firstContentfulPaint",
    "firstImagePaint",
    "firstMeaningfulPaint",
    "firstMeaningfulPaintCandidate",
    "firstPaint",
    "init",
    "load",
    "networkAlmostIdle",
    "networkIdle",
];

/// Events awaited by a bare `listen` with no arguments.
pub const DEFAULT_PAGELOAD_EVENTS: [&str; 4] = [
    "DOMContentLoaded",
    "firstMeaningfulPaint",
    "load",
    "networkAlmostIdle",
];

#[derive(Clone, Debug, Error)]
pub enum ActionError {
    #[error("[0] must contain the name of an action")]
    MissingName,
    #[error("[{0}] must contain a non-empty argument")]
    EmptyArg(usize),
    #[error("unknown action name \"{0}\"")]
    UnknownName(String),
    #[error("{0}: not enough arguments")]
    NotEnoughArgs(String),
    #[error("{name}: too many arguments (\"{extra}\")")]
    TooManyArgs { name: String, extra: String },
    #[error("{name}: needs {expected} arguments")]
    ArgCountMismatch { name: String, expected: String },
    #[error("navigate: non-URL argument: {0}")]
    InvalidUrl(url::ParseError),
    #[error("sleep: invalid duration: {0}")]
    InvalidDuration(humantime::DurationError),
    #[error("listen: arg {index} contains unknown event \"{event}\"")]
    UnknownEvent { index: usize, event: String },
    #[error("eval not implemented")]
    EvalUnsupported,
    #[error("load_tab is only allowed as the first action of the first block")]
    MisplacedLoadTab,
    #[error("element_exists is only allowed in a while guard")]
    GuardOnly,
    #[error("\"{0}\" is not a guard action")]
    NotAGuard(String),
}

/// On-wire action: a positional `[name, arg…]` array.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RawAction(pub Vec<String>);

impl RawAction {
    pub fn name(&self) -> &str {
        self.arg(0)
    }

    /// The element at position `n`, or the empty string when out of range.
    pub fn arg(&self, n: usize) -> &str {
        self.0.get(n).map(String::as_str).unwrap_or("")
    }

    pub fn args(&self) -> &[String] {
        if self.0.is_empty() {
            &[]
        } else {
            &self.0[1..]
        }
    }

    /// Validates the argument count against the allowed arities.
    ///
    /// An empty `counts` slice only requires the name to be present; a single
    /// entry requires exactly that many positional arguments; several entries
    /// require membership, reported as `n₁, n₂, … or n_k`.
    pub fn must_arg_count(&self, counts: &[usize]) -> Result<(), ActionError> {
        let name = self.name().to_string();
        match counts {
            [] => {
                if self.0.is_empty() {
                    return Err(ActionError::NotEnoughArgs(name));
                }
            }
            [n] => {
                let have = self.args().len();
                if have < *n {
                    return Err(ActionError::NotEnoughArgs(name));
                }
                if have > *n {
                    return Err(ActionError::TooManyArgs {
                        name,
                        extra: self.arg(n + 1).to_string(),
                    });
                }
            }
            many => {
                if !many.contains(&self.args().len()) {
                    let (last, head) = many.split_last().expect("non-empty arity list");
                    let head = head
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(ActionError::ArgCountMismatch {
                        name,
                        expected: format!("{head} or {last}"),
                    });
                }
            }
        }
        Ok(())
    }

    /// The name must be present and every argument non-empty.
    pub fn check_non_empty(&self) -> Result<(), ActionError> {
        if self.name().is_empty() {
            return Err(ActionError::MissingName);
        }
        for (i, arg) in self.args().iter().enumerate() {
            if arg.is_empty() {
                return Err(ActionError::EmptyArg(i + 1));
            }
        }
        Ok(())
    }
}

/// `navigate` arguments must be absolute request URIs: a full URL, or a
/// rooted path as it would appear in an HTTP request line.
pub fn parse_absolute_url(raw: &str) -> Result<(), ActionError> {
    match url::Url::parse(raw) {
        Ok(_) => Ok(()),
        Err(url::ParseError::RelativeUrlWithoutBase)
            if raw.starts_with('/') && !raw.contains(char::is_whitespace) =>
        {
            Ok(())
        }
        Err(err) => Err(ActionError::InvalidUrl(err)),
    }
}

pub fn parse_sleep_duration(raw: &str) -> Result<Duration, ActionError> {
    humantime::parse_duration(raw).map_err(ActionError::InvalidDuration)
}

/// Validates listen arguments against the event catalog; no arguments select
/// the default pageload set.
pub fn parse_events(events: &[String]) -> Result<Vec<String>, ActionError> {
    if events.is_empty() {
        return Ok(DEFAULT_PAGELOAD_EVENTS
            .iter()
            .map(|event| event.to_string())
            .collect());
    }
    for (index, event) in events.iter().enumerate() {
        if !valid_event(event) {
            return Err(ActionError::UnknownEvent {
                index,
                event: event.clone(),
            });
        }
    }
    Ok(events.to_vec())
}

pub fn valid_event(event: &str) -> bool {
    LIFECYCLE_EVENTS.contains(&event)
}

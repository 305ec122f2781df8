use thiserror::Error;

use cdp_driver::DriverError;

use crate::catalog::ActionError;

/// Client-side request errors; the HTTP layer maps these to 400.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("value \"true\" is not supported for init.forward_user_agent")]
    UserAgentForwarding,
    #[error("global_render_delay is empty or missing")]
    MissingRenderDelay,
    #[error("invalid global_render_delay: {0}")]
    InvalidRenderDelay(humantime::DurationError),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(humantime::DurationError),
    #[error("query[0] must contain at least one action block")]
    NoBlocks,
    #[error("query[0].actions[0] must begin with either \"load_tab\" or \"navigate\"")]
    InvalidFirstAction,
    #[error("query[0].actions[0] must contain at least two actions")]
    NavigateAlone,
    #[error("illegal tab ID format \"{0}\"")]
    InvalidTabId(String),
    #[error("tab {tab} is not part of window session {session}")]
    ForeignTab { tab: String, session: String },
    #[error("query[{block}].actions can't be empty")]
    EmptyBlock { block: usize },
    #[error("query[{block}].actions[{index}]: {source}")]
    Action {
        block: usize,
        index: usize,
        source: ActionError,
    },
    #[error("query[{block}].repeat: must be a non-negative integer")]
    NegativeRepeat { block: usize },
    #[error("query[{block}].while: {source}")]
    Guard { block: usize, source: ActionError },
}

/// Execution-side failures; the HTTP layer maps these to 500.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("tab with id \"{0}\" doesn't exist")]
    TabNotFound(String),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

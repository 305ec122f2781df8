use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by the driver.
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
pub enum DriverErrorKind {
    #[error("browser launch failed")]
    Launch,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("navigation failed")]
    Navigation,
    #[error("tab deadline exceeded")]
    DeadlineExceeded,
    #[error("tab context cancelled")]
    Cancelled,
    #[error("target element not found")]
    TargetNotFound,
    #[error("couldn't locate \"document\" node")]
    DocumentMissing,
    #[error("internal error")]
    Internal,
}

/// Enriched error metadata passed back to higher layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}

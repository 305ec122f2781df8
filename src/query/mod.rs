//! The declarative query engine: parse, validate, bind, execute.

use std::time::Duration;

mod binder;
mod error;
mod executor;
mod parser;

pub use binder::DriverCommand;
pub use error::{ExecError, ParseError};
pub use executor::execute;
pub use parser::{Block, Guard, Query};

/// `global_render_delay` values above this are clamped down.
pub const MAX_RENDER_DELAY: Duration = Duration::from_secs(10);

/// Per-tab deadline ceiling.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(120);

/// Per-tab deadline when the request names none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

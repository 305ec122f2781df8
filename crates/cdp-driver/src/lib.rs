//! Chromium DevTools Protocol driver for decap.
//!
//! Wraps chromiumoxide behind the small capability surface the query engine
//! needs: one [`BrowserHandle`] per long-lived window, and deadline-guarded
//! [`Tab`] operations for everything that touches a page.

pub mod browser;
pub mod config;
pub mod error;
pub mod tab;

pub use browser::BrowserHandle;
pub use config::DriverConfig;
pub use error::{DriverError, DriverErrorKind};
pub use tab::{PageTab, Tab, TabDriver};

//! Decap executes declarative browsing scripts against a pool of headless
//! Chromium windows, reusing windows and saved tabs across independent HTTP
//! requests.

pub mod catalog;
pub mod ids;
pub mod query;
pub mod result;
pub mod server;
pub mod sessions;

#[cfg(test)]
pub(crate) mod testutil;

pub const DEFAULT_PORT: u16 = 4531;

/// The current browse endpoint.
pub const NEW_BROWSE_PATH: &str = "/api/decap/v0/browse";

/// Active legacy API window: anything older is deprecated, anything newer
/// doesn't exist yet.
pub const MIN_API: &str = "v0.8";
pub const NEXT_API: &str = "v0.9";

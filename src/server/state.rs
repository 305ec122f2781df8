use crate::sessions::SessionManager;

/// Shared state behind the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
}

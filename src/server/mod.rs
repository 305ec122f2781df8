mod router;
mod state;

pub use router::router;
pub use state::AppState;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cdp_driver::DriverConfig;
use decap::server::{self, AppState};
use decap::sessions::SessionManager;
use decap::{DEFAULT_PORT, NEW_BROWSE_PATH};

/// Decap - declarative headless browsing over HTTP
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Run in GUI-debugging mode on a per-user port
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decap=info,cdp_driver=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let port = if cli.debug { debug_port() } else { DEFAULT_PORT };

    let sessions = SessionManager::spawn(DriverConfig::default());
    let app = server::router(AppState { sessions });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(target: "decap", "decap listening on http://localhost:{port}{NEW_BROWSE_PATH}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Developer instances bind one port per user next to the production port.
fn debug_port() -> u16 {
    DEFAULT_PORT - DEFAULT_PORT % 1000 + 100 + (uid() % 100) as u16
}

#[cfg(unix)]
fn uid() -> u32 {
    unsafe { libc::getuid() }
}

#[cfg(not(unix))]
fn uid() -> u32 {
    0
}

//! Window and saved-tab lifecycle, owned by a single coordinator task.
//!
//! All shared mutable state (the window and tab maps, every window's
//! last-used stamp and idle timeout) lives inside the task. Callers hold a
//! cloneable [`SessionManager`] handle and speak to the task through message
//! passing only; each request carries its own oneshot reply channel, so the
//! send-then-await pair behaves like a synchronous RPC.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use cdp_driver::{BrowserHandle, DriverConfig, DriverError, DriverErrorKind, Tab};

use crate::ids;

/// Idle timeout a window starts with; raised by demand, never lowered.
pub const WINDOW_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

pub const GC_INTERVAL: Duration = Duration::from_secs(2);

/// Read-only view of a window handed to query executors.
#[derive(Clone)]
pub struct WindowSnapshot {
    pub id: String,
    pub browser: Arc<BrowserHandle>,
    pub idle_timeout: Duration,
}

struct Window {
    id: String,
    browser: Arc<BrowserHandle>,
    last: Instant,
    idle_timeout: Duration,
}

impl Window {
    fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            id: self.id.clone(),
            browser: Arc::clone(&self.browser),
            idle_timeout: self.idle_timeout,
        }
    }
}

enum SessionMsg {
    WindowQuery {
        id: String,
        requested_timeout: Duration,
        reply: oneshot::Sender<Result<WindowSnapshot, DriverError>>,
    },
    WindowClose {
        id: String,
    },
    TabSave {
        tab: Tab,
    },
    TabLoad {
        id: String,
        reply: oneshot::Sender<Option<Tab>>,
    },
}

/// Opens the browser process backing a new window. Injectable so lifecycle
/// logic is testable without Chromium.
pub type Launcher =
    Arc<dyn Fn(DriverConfig) -> BoxFuture<'static, Result<BrowserHandle, DriverError>> + Send + Sync>;

/// Cloneable handle to the session coordinator task.
#[derive(Clone)]
pub struct SessionManager {
    tx: mpsc::Sender<SessionMsg>,
}

impl SessionManager {
    /// Spawns the coordinator with the real Chromium launcher.
    pub fn spawn(config: DriverConfig) -> Self {
        let launcher: Launcher = Arc::new(|config: DriverConfig| {
            Box::pin(async move { BrowserHandle::launch(&config).await })
        });
        Self::spawn_with_launcher(config, launcher)
    }

    pub fn spawn_with_launcher(config: DriverConfig, launcher: Launcher) -> Self {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(run(config, launcher, rx));
        Self { tx }
    }

    /// Looks up a window, creating it (and its browser process) when unknown.
    /// The window's idle timeout is raised to at least `requested_timeout`
    /// and its last-used stamp refreshed.
    pub async fn window_query(
        &self,
        id: &str,
        requested_timeout: Duration,
    ) -> Result<WindowSnapshot, DriverError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(SessionMsg::WindowQuery {
                id: id.to_string(),
                requested_timeout,
                reply,
            })
            .await
            .map_err(|_| manager_gone())?;
        response.await.map_err(|_| manager_gone())?
    }

    /// Closes a window and every saved tab under it.
    pub async fn close_window(&self, id: &str) {
        let _ = self
            .tx
            .send(SessionMsg::WindowClose { id: id.to_string() })
            .await;
    }

    /// Stores a tab for later reuse; a second save under the same id wins.
    pub async fn save_tab(&self, tab: Tab) {
        let _ = self.tx.send(SessionMsg::TabSave { tab }).await;
    }

    /// Takes a saved tab out of the map. Loading consumes the handle: a
    /// second load of the same id returns `None`.
    pub async fn load_tab(&self, id: &str) -> Option<Tab> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(SessionMsg::TabLoad {
                id: id.to_string(),
                reply,
            })
            .await
            .ok()?;
        response.await.ok().flatten()
    }
}

fn manager_gone() -> DriverError {
    DriverError::new(DriverErrorKind::Internal).with_hint("session manager unavailable")
}

async fn run(config: DriverConfig, launcher: Launcher, mut rx: mpsc::Receiver<SessionMsg>) {
    let mut state = ManagerState {
        config,
        launcher,
        windows: HashMap::new(),
        tabs: HashMap::new(),
    };

    let mut gc = interval(GC_INTERVAL);
    gc.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(message) => state.handle(message).await,
                None => break,
            },
            _ = gc.tick() => state.sweep().await,
        }
    }
    info!(target: "sessions", "session manager stopped");
}

struct ManagerState {
    config: DriverConfig,
    launcher: Launcher,
    windows: HashMap<String, Window>,
    tabs: HashMap<String, Tab>,
}

impl ManagerState {
    async fn handle(&mut self, message: SessionMsg) {
        match message {
            SessionMsg::WindowQuery {
                id,
                requested_timeout,
                reply,
            } => {
                let result = self.window_query(id, requested_timeout).await;
                let _ = reply.send(result);
            }
            SessionMsg::WindowClose { id } => self.close_window(&id).await,
            SessionMsg::TabSave { tab } => {
                self.tabs.insert(tab.id().to_string(), tab);
            }
            SessionMsg::TabLoad { id, reply } => {
                let tab = self.tabs.remove(&id);
                let _ = reply.send(tab);
                self.touch_tab_window(&id);
            }
        }
    }

    async fn window_query(
        &mut self,
        id: String,
        requested_timeout: Duration,
    ) -> Result<WindowSnapshot, DriverError> {
        let key = if self.windows.contains_key(&id) {
            id
        } else {
            let window = self.create_window(&id).await?;
            let key = window.id.clone();
            self.windows.insert(key.clone(), window);
            key
        };

        let Some(window) = self.windows.get_mut(&key) else {
            return Err(DriverError::new(DriverErrorKind::Internal)
                .with_hint("window vanished during lookup"));
        };
        if requested_timeout > window.idle_timeout {
            window.idle_timeout = requested_timeout;
        }
        window.last = Instant::now();
        Ok(window.snapshot())
    }

    async fn create_window(&self, requested_id: &str) -> Result<Window, DriverError> {
        // short or missing ids are replaced with a fresh one
        let id = if requested_id.len() < 8 {
            ids::new_session_id()
        } else {
            requested_id.to_string()
        };
        let browser = (self.launcher)(self.config.clone()).await?;
        info!(target: "sessions", session = %id, "opened window");
        Ok(Window {
            id,
            browser: Arc::new(browser),
            last: Instant::now(),
            idle_timeout: WINDOW_IDLE_TIMEOUT,
        })
    }

    async fn close_window(&mut self, id: &str) {
        match self.windows.remove(id) {
            Some(window) => {
                window.browser.shutdown().await;
                let suffixes = self.drop_window_tabs(id).await;
                if suffixes.is_empty() {
                    info!(target: "sessions", session = %id, "deleted window");
                } else {
                    info!(target: "sessions", session = %id, tabs = ?suffixes, "deleted window including tabs");
                }
            }
            None => warn!(target: "sessions", session = %id, "close requested for unknown window"),
        }
    }

    fn touch_tab_window(&mut self, tab_id: &str) {
        match ids::parse_tab_id(tab_id) {
            Some((prefix, _)) => match self.windows.get_mut(prefix) {
                Some(window) => window.last = Instant::now(),
                None => {
                    error!(target: "sessions", tab = %tab_id, "tab id didn't match any window")
                }
            },
            None => error!(target: "sessions", tab = %tab_id, "tab id parse error"),
        }
    }

    async fn sweep(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .windows
            .values()
            .filter(|window| now.duration_since(window.last) > window.idle_timeout)
            .map(|window| window.id.clone())
            .collect();

        for id in expired {
            if let Some(window) = self.windows.remove(&id) {
                let idle = now.duration_since(window.last);
                info!(
                    target: "sessions",
                    session = %id,
                    idle_secs = idle.as_secs_f64(),
                    "window idle past its timeout, closing it"
                );
                window.browser.shutdown().await;
                let suffixes = self.drop_window_tabs(&id).await;
                if suffixes.is_empty() {
                    info!(target: "sessions", session = %id, "deleted window");
                } else {
                    info!(target: "sessions", session = %id, tabs = ?suffixes, "deleted window including tabs");
                }
            }
        }
    }

    /// Removes and closes every saved tab under a window prefix, returning
    /// the `_suffix` list for the teardown log line.
    async fn drop_window_tabs(&mut self, window_id: &str) -> Vec<String> {
        let doomed: Vec<String> = self
            .tabs
            .keys()
            .filter(|tab_id| {
                ids::parse_tab_id(tab_id)
                    .map(|(prefix, _)| prefix == window_id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let mut suffixes = Vec::new();
        for tab_id in doomed {
            if let Some((_, suffix)) = ids::parse_tab_id(&tab_id) {
                suffixes.push(format!("_{suffix}"));
            }
            if let Some(tab) = self.tabs.remove(&tab_id) {
                if let Err(err) = tab.close().await {
                    debug!(target: "sessions", tab = %tab_id, %err, "failed to close saved tab");
                }
            }
        }
        suffixes
    }
}

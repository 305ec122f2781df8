use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DriverConfig;
use crate::error::{DriverError, DriverErrorKind};

/// One live Chromium process. The session manager owns one handle per window;
/// query executors borrow it through a shared reference to open sibling tabs.
pub struct BrowserHandle {
    browser: Mutex<Option<Browser>>,
    cancel: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl BrowserHandle {
    /// Launches a browser process and starts pumping its event handler.
    pub async fn launch(config: &DriverConfig) -> Result<Self, DriverError> {
        let browser_config = build_browser_config(config)?;
        let (browser, mut handler) =
            tokio::time::timeout(config.launch_timeout, Browser::launch(browser_config))
                .await
                .map_err(|_| {
                    DriverError::new(DriverErrorKind::Launch).with_hint("browser launch timed out")
                })?
                .map_err(|err| {
                    DriverError::new(DriverErrorKind::Launch).with_hint(err.to_string())
                })?;

        let cancel = CancellationToken::new();
        let pump_cancel = cancel.clone();
        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = pump_cancel.cancelled() => break,
                    message = handler.next() => match message {
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            debug!(target: "cdp-driver", "handler pump stopped");
        });

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            cancel,
            pump: Some(pump),
        })
    }

    /// A handle with no underlying process; every tab operation fails. Used
    /// as a stand-in where no browser is wanted (tests, dry wiring).
    pub fn detached() -> Self {
        Self {
            browser: Mutex::new(None),
            cancel: CancellationToken::new(),
            pump: None,
        }
    }

    /// Root cancellation token; child tokens derived from it are cancelled
    /// when the window shuts down.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Opens a fresh about:blank page in this browser.
    pub async fn new_tab(&self) -> Result<Page, DriverError> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or_else(|| {
            DriverError::new(DriverErrorKind::Internal).with_hint("browser is not running")
        })?;
        browser
            .new_page("about:blank")
            .await
            .map_err(|err| DriverError::new(DriverErrorKind::CdpIo).with_hint(err.to_string()))
    }

    /// Cancels every tab descending from this window and closes the process.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(err) = browser.close().await {
                warn!(target: "cdp-driver", %err, "failed to close chromium cleanly");
            }
        }
    }
}

impl Drop for BrowserHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

fn build_browser_config(config: &DriverConfig) -> Result<BrowserConfig, DriverError> {
    let mut builder = BrowserConfig::builder()
        .request_timeout(config.request_timeout)
        .launch_timeout(config.launch_timeout);

    if !config.headless {
        builder = builder.with_head();
    }

    if std::env::var("DECAP_DISABLE_SANDBOX")
        .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
        .unwrap_or(false)
    {
        builder = builder.no_sandbox();
    }

    let mut args = vec![
        "--disable-background-networking",
        "--disable-background-timer-throttling",
        "--disable-breakpad",
        "--disable-client-side-phishing-detection",
        "--disable-component-update",
        "--disable-default-apps",
        "--disable-dev-shm-usage",
        "--disable-extensions",
        "--disable-hang-monitor",
        "--disable-popup-blocking",
        "--disable-prompt-on-repost",
        "--disable-sync",
        "--metrics-recording-only",
        "--no-first-run",
        "--no-default-browser-check",
        "--password-store=basic",
        "--use-mock-keychain",
    ];
    if config.headless {
        args.push("--hide-scrollbars");
        args.push("--mute-audio");
    }
    builder = builder.args(args);

    if let Some(executable) = &config.executable {
        builder = builder.chrome_executable(executable.clone());
    }

    builder.build().map_err(|err| {
        DriverError::new(DriverErrorKind::Launch).with_hint(format!("browser config error: {err}"))
    })
}

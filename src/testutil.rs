//! Shared test doubles: a scripted tab driver and a browserless session
//! manager.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use cdp_driver::{BrowserHandle, DriverConfig, DriverError, DriverErrorKind, Tab, TabDriver};

use crate::sessions::{Launcher, SessionManager};

/// Records every driver call; `html` and `exists` script the returns of
/// `outer_html` and `element_exists`, and `fail_on` makes one call kind fail.
#[derive(Default)]
pub struct FakeTab {
    calls: Mutex<Vec<String>>,
    html: Mutex<VecDeque<String>>,
    exists: Mutex<VecDeque<bool>>,
    fail_on: Option<String>,
}

impl FakeTab {
    pub fn with_html(pages: &[&str]) -> Self {
        let fake = Self::default();
        *fake.html.lock().expect("html lock") =
            pages.iter().map(|page| page.to_string()).collect();
        fake
    }

    pub fn failing_on(call: &str) -> Self {
        Self {
            fail_on: Some(call.to_string()),
            ..Self::default()
        }
    }

    pub fn script_exists(&self, answers: &[bool]) {
        *self.exists.lock().expect("exists lock") = answers.iter().copied().collect();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: impl Into<String>) -> Result<(), DriverError> {
        let call = call.into();
        let kind = call.split(' ').next().unwrap_or("").to_string();
        self.calls.lock().expect("calls lock").push(call);
        if self.fail_on.as_deref() == Some(kind.as_str()) {
            return Err(DriverError::new(DriverErrorKind::CdpIo).with_hint("scripted failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl TabDriver for FakeTab {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.record(format!("navigate {url}"))
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.record(format!("click {selector}"))
    }

    async fn element_exists(&self, selector: &str) -> Result<bool, DriverError> {
        self.record(format!("element_exists {selector}"))?;
        Ok(self
            .exists
            .lock()
            .expect("exists lock")
            .pop_front()
            .unwrap_or(true))
    }

    async fn outer_html(&self) -> Result<String, DriverError> {
        self.record("outer_html")?;
        Ok(self
            .html
            .lock()
            .expect("html lock")
            .pop_front()
            .unwrap_or_else(|| "<html></html>".to_string()))
    }

    async fn scroll_to_bottom(&self) -> Result<(), DriverError> {
        self.record("scroll_to_bottom")
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError> {
        self.record(format!("scroll_into_view {selector}"))
    }

    async fn enable_network(&self) -> Result<(), DriverError> {
        self.record("enable_network")
    }

    async fn enable_lifecycle_events(&self) -> Result<(), DriverError> {
        self.record("enable_lifecycle_events")
    }

    async fn listen(&self, session_id: &str, events: &[String]) -> Result<(), DriverError> {
        self.record(format!("listen {session_id} {}", events.join(" ")))
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.record("close")
    }
}

pub fn fake_tab(id: &str, driver: Arc<FakeTab>) -> Tab {
    Tab::new(
        id,
        driver,
        CancellationToken::new(),
        Duration::from_secs(20),
    )
}

/// A session manager whose windows carry no browser process.
pub fn stub_session_manager() -> SessionManager {
    let launcher: Launcher = Arc::new(|_config: DriverConfig| {
        Box::pin(async { Ok(BrowserHandle::detached()) })
    });
    SessionManager::spawn_with_launcher(DriverConfig::default(), launcher)
}

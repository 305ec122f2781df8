use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::EnableParams as NetworkEnableParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EnableParams as PageEnableParams, EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{DriverError, DriverErrorKind};

const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The side-effecting operations a tab supports. Implemented by [`PageTab`]
/// for real pages; the trait seam lets upper layers run without a browser.
#[async_trait]
pub trait TabDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;
    async fn click(&self, selector: &str) -> Result<(), DriverError>;
    async fn element_exists(&self, selector: &str) -> Result<bool, DriverError>;
    async fn outer_html(&self) -> Result<String, DriverError>;
    async fn scroll_to_bottom(&self) -> Result<(), DriverError>;
    async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError>;
    async fn enable_network(&self) -> Result<(), DriverError>;
    async fn enable_lifecycle_events(&self) -> Result<(), DriverError>;
    async fn listen(&self, session_id: &str, events: &[String]) -> Result<(), DriverError>;
    async fn close(&self) -> Result<(), DriverError>;
}

/// Real tab driver over a chromiumoxide [`Page`].
pub struct PageTab {
    page: Page,
}

impl PageTab {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Polls for a selector until it resolves; the caller's deadline bounds
    /// the loop.
    async fn wait_for_element(
        &self,
        selector: &str,
    ) -> Result<chromiumoxide::element::Element, DriverError> {
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(_) => tokio::time::sleep(ELEMENT_POLL_INTERVAL).await,
            }
        }
    }

    /// Polls until the selector matches an element with a non-zero bounding
    /// box; the caller's deadline bounds the loop.
    async fn wait_for_visible(
        &self,
        selector: &str,
    ) -> Result<chromiumoxide::element::Element, DriverError> {
        let probe = format!(
            r#"(function() {{
                const el = document.querySelector({});
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }})()"#,
            js_string(selector)
        );
        loop {
            let visible = self
                .page
                .evaluate(probe.clone())
                .await
                .ok()
                .and_then(|result| result.into_value::<bool>().ok())
                .unwrap_or(false);
            if visible {
                if let Ok(element) = self.page.find_element(selector).await {
                    return Ok(element);
                }
            }
            tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }
}

fn js_string(raw: &str) -> String {
    serde_json::Value::String(raw.to_string()).to_string()
}

fn cdp_io(err: impl std::fmt::Display) -> DriverError {
    DriverError::new(DriverErrorKind::CdpIo).with_hint(err.to_string())
}

#[async_trait]
impl TabDriver for PageTab {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.page.goto(url).await.map_err(|err| {
            DriverError::new(DriverErrorKind::Navigation).with_hint(err.to_string())
        })?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let element = self.wait_for_visible(selector).await?;
        element.click().await.map_err(cdp_io)?;
        Ok(())
    }

    async fn element_exists(&self, selector: &str) -> Result<bool, DriverError> {
        let matches = self.page.find_elements(selector).await.map_err(cdp_io)?;
        Ok(!matches.is_empty())
    }

    async fn outer_html(&self) -> Result<String, DriverError> {
        self.page.content().await.map_err(|err| {
            DriverError::new(DriverErrorKind::DocumentMissing).with_hint(err.to_string())
        })
    }

    async fn scroll_to_bottom(&self) -> Result<(), DriverError> {
        self.page
            .evaluate("document.body.scrollTo(0,document.body.scrollHeight);")
            .await
            .map_err(cdp_io)?;
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError> {
        let element = self.wait_for_element(selector).await?;
        element.scroll_into_view().await.map_err(cdp_io)?;
        Ok(())
    }

    async fn enable_network(&self) -> Result<(), DriverError> {
        self.page
            .execute(NetworkEnableParams::default())
            .await
            .map_err(cdp_io)?;
        Ok(())
    }

    async fn enable_lifecycle_events(&self) -> Result<(), DriverError> {
        self.page
            .execute(PageEnableParams::default())
            .await
            .map_err(cdp_io)?;
        self.page
            .execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(cdp_io)?;
        Ok(())
    }

    async fn listen(&self, session_id: &str, events: &[String]) -> Result<(), DriverError> {
        let mut outstanding: HashSet<String> = events.iter().cloned().collect();
        let mut lifecycle = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(cdp_io)?;

        while !outstanding.is_empty() {
            match lifecycle.next().await {
                Some(event) => {
                    if outstanding.remove(&event.name) {
                        info!(
                            target: "cdp-driver",
                            session = %session_id,
                            event = %event.name,
                            "caught lifecycle event"
                        );
                    } else {
                        debug!(
                            target: "cdp-driver",
                            session = %session_id,
                            event = %event.name,
                            "ignored lifecycle event"
                        );
                    }
                }
                None => {
                    return Err(DriverError::new(DriverErrorKind::CdpIo)
                        .with_hint("lifecycle event stream closed"))
                }
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.page.clone().close().await.map_err(cdp_io)
    }
}

/// A page bound to a window, with a hard deadline and a cancellation token
/// derived from its parent window.
///
/// Every operation races the token and the deadline; releasing the tab is an
/// explicit [`Tab::close`] (a driver-level page close), never a bare token
/// cancellation.
pub struct Tab {
    id: String,
    driver: Arc<dyn TabDriver>,
    cancel: CancellationToken,
    deadline: Instant,
}

impl Tab {
    pub fn new(
        id: impl Into<String>,
        driver: Arc<dyn TabDriver>,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            driver,
            cancel,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    async fn run<T, F>(&self, op: F) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(DriverError::new(DriverErrorKind::Cancelled)),
            result = tokio::time::timeout_at(self.deadline, op) => match result {
                Ok(inner) => inner,
                Err(_) => Err(DriverError::new(DriverErrorKind::DeadlineExceeded)),
            },
        }
    }

    pub async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.run(self.driver.navigate(url)).await
    }

    pub async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.run(self.driver.click(selector)).await
    }

    pub async fn element_exists(&self, selector: &str) -> Result<bool, DriverError> {
        self.run(self.driver.element_exists(selector)).await
    }

    pub async fn outer_html(&self) -> Result<String, DriverError> {
        self.run(self.driver.outer_html()).await
    }

    pub async fn scroll_to_bottom(&self) -> Result<(), DriverError> {
        self.run(self.driver.scroll_to_bottom()).await
    }

    pub async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError> {
        self.run(self.driver.scroll_into_view(selector)).await
    }

    pub async fn sleep(&self, delay: Duration) -> Result<(), DriverError> {
        self.run(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }

    pub async fn enable_network(&self) -> Result<(), DriverError> {
        self.run(self.driver.enable_network()).await
    }

    pub async fn enable_lifecycle_events(&self) -> Result<(), DriverError> {
        self.run(self.driver.enable_lifecycle_events()).await
    }

    pub async fn listen(&self, session_id: &str, events: &[String]) -> Result<(), DriverError> {
        self.run(self.driver.listen(session_id, events)).await
    }

    /// Releases the tab: cancels its token and closes the page.
    pub async fn close(self) -> Result<(), DriverError> {
        self.cancel.cancel();
        self.driver.close().await
    }
}

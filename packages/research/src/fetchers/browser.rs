//! Headless Chromium fetch strategy.
//!
//! Requires the `browser` feature flag. The browser process is launched on
//! first use and shared by every render; each render gets its own tab, which
//! is closed when the render finishes, fails or is dropped mid-flight.

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use chrono::Utc;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::PageFetchStrategy;
use crate::types::config::ResearchConfig;
use crate::types::page::{FetchMethod, PageContent};

/// Extra time given to client-side rendering after the load event.
const SETTLE_DELAY: Duration = Duration::from_millis(750);

struct BrowserSession {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

/// Renders pages in a shared headless browser.
pub struct BrowserFetcher {
    session: OnceCell<BrowserSession>,
    slots: Arc<Semaphore>,
    timeout: Duration,
    chrome_path: Option<PathBuf>,
}

impl BrowserFetcher {
    /// `concurrency` bounds the number of tabs rendering at once.
    pub fn new(concurrency: usize, timeout: Duration) -> Self {
        Self {
            session: OnceCell::new(),
            slots: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout,
            chrome_path: None,
        }
    }

    pub fn from_config(config: &ResearchConfig) -> Self {
        Self::new(config.browser_concurrency, config.fetch_timeout)
    }

    /// Use a specific Chrome/Chromium binary instead of searching for one.
    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    async fn session(&self) -> Result<&BrowserSession, String> {
        self.session
            .get_or_try_init(|| launch(self.chrome_path.clone()))
            .await
    }

    async fn render(&self, session: &BrowserSession, url: &Url) -> Result<(String, Option<String>), String> {
        let page = {
            let browser = session.browser.lock().await;
            browser
                .new_page(url.as_str())
                .await
                .map_err(|e| format!("failed to open tab: {e}"))?
        };
        let tab = TabGuard(Some(page));
        let page = tab.page()?.clone();

        page.wait_for_navigation()
            .await
            .map_err(|e| format!("navigation failed: {e}"))?;
        tokio::time::sleep(SETTLE_DELAY).await;

        let html = page
            .content()
            .await
            .map_err(|e| format!("failed to read DOM: {e}"))?;
        let title = page.get_title().await.ok().flatten();

        tab.close().await;
        Ok((html, title))
    }
}

async fn launch(chrome_path: Option<PathBuf>) -> Result<BrowserSession, String> {
    let mut builder = chromiumoxide::BrowserConfig::builder();
    if let Some(path) = chrome_path.or_else(find_chrome_binary) {
        builder = builder.chrome_executable(path);
    }

    // Unique profile dir so parallel runs don't fight over a lock file.
    let user_data_dir = std::env::temp_dir().join(format!(
        "research-chrome-{}-{}",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ));

    let config = builder
        .user_data_dir(user_data_dir)
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-gpu")
        .arg("--disable-extensions")
        .arg("--disable-dev-shm-usage")
        .build()
        .map_err(|e| format!("failed to build browser config: {e}"))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| format!("failed to launch Chrome: {e}"))?;

    let handler = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                debug!("Browser handler event error");
            }
        }
    });

    info!("Headless browser launched");
    Ok(BrowserSession {
        browser: Mutex::new(browser),
        handler,
    })
}

/// Closes the tab on every exit path. A render future dropped by
/// cancellation closes its tab from a spawned task.
struct TabGuard(Option<Page>);

impl TabGuard {
    fn page(&self) -> Result<&Page, String> {
        self.0.as_ref().ok_or_else(|| "tab already closed".to_string())
    }

    async fn close(mut self) {
        if let Some(page) = self.0.take() {
            if let Err(e) = page.close().await {
                debug!(error = %e, "Failed to close tab");
            }
        }
    }
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Some(page) = self.0.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = page.close().await;
                });
            }
        }
    }
}

#[async_trait]
impl PageFetchStrategy for BrowserFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult<PageContent> {
        let browser_error = |message: String| FetchError::Browser {
            url: url.to_string(),
            message,
        };

        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| browser_error("browser pool closed".to_string()))?;

        let session = self.session().await.map_err(browser_error)?;

        debug!(url = %url, "Browser render starting");
        let (html, title) = tokio::time::timeout(self.timeout, self.render(session, url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })?
            .map_err(browser_error)?;
        debug!(url = %url, bytes = html.len(), "Browser render complete");

        let mut page = PageContent::new(url.clone(), html, FetchMethod::Browser)
            .with_content_type("text/html")
            .with_fetched_at(Utc::now());
        if let Some(title) = title {
            page = page.with_title(title);
        }
        Ok(page)
    }

    fn name(&self) -> &str {
        "browser"
    }

    async fn shutdown(&self) {
        let Some(session) = self.session.get() else {
            return;
        };
        let mut browser = session.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!(error = %e, "Failed to close browser");
        }
        let _ = browser.wait().await;
        session.handler.abort();
        info!("Headless browser shut down");
    }
}

/// Find a Chrome or Chromium binary in the usual install locations.
fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROME_PATH") {
        let p = PathBuf::from(path);
        if p.exists() {
            return Some(p);
        }
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    };

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}

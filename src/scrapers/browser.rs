//! Headless-browser fetcher for JavaScript-rendered pages.
//!
//! Uses chromiumoxide (CDP) to drive a local Chrome/Chromium. The discovery
//! scraper and the rendered extraction strategy both go through here: open a
//! page, wait for the DOM to settle, then hand the serialized HTML to the
//! selector code. All DOM walking happens on the HTML string, never through
//! element handles, so the strategies stay testable on static fixtures.

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[cfg(feature = "browser")]
use std::sync::Arc;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::Context;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

/// Browser configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Page load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// User agent override applied to every page.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

fn default_headless() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    super::http_client::DEFAULT_USER_AGENT.to_string()
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            chrome_args: Vec::new(),
        }
    }
}

/// Browser-based page fetcher.
#[cfg(feature = "browser")]
pub struct BrowserFetcher {
    settings: BrowserSettings,
    browser: Option<Arc<Mutex<Browser>>>,
}

#[cfg(feature = "browser")]
impl BrowserFetcher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    /// Create a new browser fetcher. The browser launches lazily on first use.
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            browser: None,
        }
    }

    /// Find a Chrome executable.
    fn find_chrome() -> Result<std::path::PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Please install it:\n\
             - Arch/Manjaro: sudo pacman -S chromium\n\
             - Ubuntu/Debian: sudo apt install chromium-browser\n\
             - Fedora: sudo dnf install chromium\n\
             - Or download from: https://www.google.com/chrome/"
        ))
    }

    /// Launch the browser if not already running.
    pub async fn ensure_browser(&mut self) -> Result<()> {
        if self.browser.is_some() {
            return Ok(());
        }

        info!("Launching browser (headless={})", self.settings.headless);
        let chrome_path = Self::find_chrome()?;

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless, confusingly
        if !self.settings.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox") // Often needed for headless in containers/restricted environments
            .arg("--disable-gpu"); // Recommended for headless

        for arg in &self.settings.chrome_args {
            builder = builder.arg(arg.as_str());
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        // Spawn handler task
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        self.browser = Some(Arc::new(Mutex::new(browser)));

        Ok(())
    }

    /// Open a URL in a fresh tab. Call [`RenderedPage::settle`] before
    /// reading content.
    pub async fn open(&mut self, url: &str) -> Result<RenderedPage> {
        self.ensure_browser().await?;

        let page = {
            let browser = self.browser.as_ref().unwrap().lock().await;
            browser.new_page("about:blank").await?
        };

        // Set the user agent before any navigation
        page.execute(SetUserAgentOverrideParams::new(
            self.settings.user_agent.clone(),
        ))
        .await?;

        debug!("Navigating to {}", url);
        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid URL: {}", e))?;
        page.execute(nav_params).await?;

        Ok(RenderedPage {
            page,
            timeout: Duration::from_secs(self.settings.timeout),
        })
    }

    /// Close the browser.
    pub async fn close(&mut self) {
        self.browser = None;
    }
}

/// Handle to one rendered tab.
#[cfg(feature = "browser")]
pub struct RenderedPage {
    page: Page,
    timeout: Duration,
}

#[cfg(feature = "browser")]
impl RenderedPage {
    /// Wait for document.readyState instead of a fixed sleep. Falls through
    /// on non-HTML pages where the script cannot run. Callers run this after
    /// `open` returns so the fetcher lock is not held for the wait.
    pub async fn settle(&self) {
        let script = r#"
            new Promise((resolve) => {
                if (document.readyState === 'complete' || document.readyState === 'interactive') {
                    resolve(document.readyState);
                } else {
                    document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                    setTimeout(() => resolve('timeout'), 10000);
                }
            })
        "#;

        match tokio::time::timeout(self.timeout, self.page.evaluate(script.to_string())).await {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => {
                debug!("Could not check ready state: {}", e);
            }
            Err(_) => {
                warn!("Timeout waiting for page ready state");
            }
        }

        // Small additional delay for late-loading scripts
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    /// Serialized DOM after scripts have run.
    pub async fn html(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    /// Run a script, discarding its value.
    pub async fn run(&self, script: &str) -> Result<()> {
        self.page.evaluate(script.to_string()).await?;
        Ok(())
    }

    /// Run a script that resolves to a boolean.
    pub async fn run_bool(&self, script: &str) -> Result<bool> {
        let result = self.page.evaluate(script.to_string()).await?;
        Ok(result.into_value().unwrap_or(false))
    }

    /// Run a script that resolves to a number.
    pub async fn run_i64(&self, script: &str) -> Result<i64> {
        let result = self.page.evaluate(script.to_string()).await?;
        Ok(result.into_value().unwrap_or(0))
    }

    /// Wait until a selector appears, up to the page timeout.
    /// Returns false rather than erroring when it never shows.
    pub async fn wait_for_selector(&self, selector: &str) -> bool {
        match tokio::time::timeout(self.timeout, self.page.find_element(selector)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Selector {} not found: {}", selector, e);
                false
            }
            Err(_) => {
                warn!("Timeout waiting for selector {}", selector);
                false
            }
        }
    }

    /// Close the tab to prevent accumulation.
    pub async fn close(self) {
        let _ = self.page.close().await;
    }
}

#[cfg(not(feature = "browser"))]
fn browser_not_compiled() -> anyhow::Error {
    anyhow::anyhow!("Browser support not compiled. Rebuild with: cargo build --features browser")
}

// Stubs for when the browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserFetcher {
    #[allow(dead_code)]
    settings: BrowserSettings,
}

#[cfg(not(feature = "browser"))]
impl BrowserFetcher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    pub async fn ensure_browser(&mut self) -> Result<()> {
        Err(browser_not_compiled())
    }

    pub async fn open(&mut self, _url: &str) -> Result<RenderedPage> {
        Err(browser_not_compiled())
    }

    pub async fn close(&mut self) {}
}

#[cfg(not(feature = "browser"))]
pub struct RenderedPage;

#[cfg(not(feature = "browser"))]
impl RenderedPage {
    pub async fn settle(&self) {}

    pub async fn html(&self) -> Result<String> {
        Err(browser_not_compiled())
    }

    pub async fn run(&self, _script: &str) -> Result<()> {
        Err(browser_not_compiled())
    }

    pub async fn run_bool(&self, _script: &str) -> Result<bool> {
        Err(browser_not_compiled())
    }

    pub async fn run_i64(&self, _script: &str) -> Result<i64> {
        Err(browser_not_compiled())
    }

    pub async fn wait_for_selector(&self, _selector: &str) -> bool {
        false
    }

    pub async fn close(self) {}
}

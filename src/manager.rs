//! Browser instance manager
//!
//! Owns at most one Chromium process, launched lazily on first use and
//! shared by every extraction.
//!
//! # Async Lock Requirements
//!
//! Must use `tokio::sync::Mutex`, NOT `parking_lot`: the browser is used
//! across `.await` points while the lock is held.

use anyhow::Result;
use chromiumoxide::page::Page;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::BrowserConfig;
use crate::browser::{BrowserError, BrowserResult, BrowserWrapper, launch_browser};

/// Manager for the scraper's browser with health checking and crash recovery
///
/// - Only one browser instance exists at a time (lazy-loaded)
/// - Health check on every access via the `version()` CDP command
/// - A crashed browser is torn down and relaunched transparently
/// - `shutdown()` closes the process and removes its profile directory
///
/// There is no global instance; whoever creates the manager owns its
/// lifecycle and must call `shutdown()` before dropping it.
pub struct BrowserManager {
    config: crate::BrowserConfig,
    browser: Arc<Mutex<Option<BrowserWrapper>>>,
}

impl BrowserManager {
    /// Create a manager. The browser is launched on first `get_or_launch()`.
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: Arc::new(Mutex::new(None)),
        }
    }

    /// Get or launch the shared browser instance with health checking and auto-recovery
    ///
    /// # Health Check and Recovery Flow
    /// 1. Lock browser mutex
    /// 2. If browser exists, check health via version() CDP command
    /// 3. If unhealthy, close crashed browser and remove from cache
    /// 4. If no browser or was unhealthy, launch new instance
    ///
    /// # Returns
    /// Arc to the browser Mutex - caller locks it to access BrowserWrapper
    pub async fn get_or_launch(&self) -> Result<Arc<Mutex<Option<BrowserWrapper>>>> {
        let mut guard = self.browser.lock().await;

        if let Some(wrapper) = guard.as_ref() {
            match wrapper.browser().version().await {
                Ok(_) => {
                    tracing::debug!("Browser health check passed, reusing existing browser");
                    drop(guard);
                    return Ok(self.browser.clone());
                }
                Err(e) => {
                    tracing::warn!("Browser health check failed: {}. Triggering recovery...", e);

                    if let Some(mut crashed_wrapper) = guard.take() {
                        // Best-effort: the process may already be gone
                        let _ = crashed_wrapper.browser_mut().close().await;
                        let _ = crashed_wrapper.browser_mut().wait().await;
                        crashed_wrapper.cleanup_temp_dir();
                    }

                    tracing::info!("Crashed browser cleaned up, launching new instance");
                }
            }
        }

        tracing::info!("Launching browser (first time or after recovery)");
        let (browser, handler, user_data_dir) = launch_browser(&self.config).await?;
        *guard = Some(BrowserWrapper::new(browser, handler, user_data_dir));
        drop(guard);

        Ok(self.browser.clone())
    }

    /// Open `url` in a fresh page and wait for its load event.
    ///
    /// Each call gets its own page, so extractions never see each other's
    /// DOM. The caller owns the page and should close it when done.
    pub async fn open_page(&self, url: &str) -> BrowserResult<Page> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(BrowserError::NavigationFailed(format!(
                "URL must start with http:// or https://: {url}"
            )));
        }

        let browser_arc = self
            .get_or_launch()
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;
        let page = {
            let browser_guard = browser_arc.lock().await;
            let wrapper = browser_guard
                .as_ref()
                .ok_or_else(|| BrowserError::PageCreationFailed("Browser not available".into()))?;
            wrapper
                .browser()
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?
        };

        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        let navigation = async {
            page.goto(url)
                .await
                .map_err(|e| BrowserError::NavigationFailed(format!("{url}: {e}")))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| BrowserError::NavigationFailed(format!("{url}: {e}")))?;
            Ok::<_, BrowserError>(())
        };

        let outcome = match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis(),
            }),
        };

        match outcome {
            Ok(()) => Ok(page),
            Err(e) => {
                let _ = page.close().await;
                Err(e)
            }
        }
    }

    /// Shutdown the browser if running
    ///
    /// Safe to call multiple times (subsequent calls are no-ops).
    ///
    /// Both `close()` and `wait()` are required: `BrowserWrapper::drop()`
    /// only aborts the handler task, and without an explicit close Chrome
    /// lingers as a zombie process.
    pub async fn shutdown(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;

        if let Some(mut wrapper) = guard.take() {
            info!("Shutting down browser");

            if let Err(e) = wrapper.browser_mut().close().await {
                tracing::warn!("Failed to close browser cleanly: {}", e);
            }

            if let Err(e) = wrapper.browser_mut().wait().await {
                tracing::warn!("Failed to wait for browser exit: {}", e);
            }

            wrapper.cleanup_temp_dir();
            drop(wrapper);
        }

        Ok(())
    }

    /// Check if browser is currently running
    pub async fn is_browser_running(&self) -> bool {
        self.browser.lock().await.is_some()
    }
}

impl Drop for BrowserManager {
    fn drop(&mut self) {
        // Not a clean shutdown: BrowserWrapper::drop() only aborts the handler.
        info!("BrowserManager dropping - browser will be cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manager_starts_without_browser() {
        let manager = BrowserManager::new(BrowserConfig::default());
        assert!(!manager.is_browser_running().await);
        // Shutdown before launch is a no-op
        manager.shutdown().await.unwrap();
        assert!(!manager.is_browser_running().await);
    }

    #[tokio::test]
    async fn open_page_rejects_non_http_urls_before_launching() {
        let manager = BrowserManager::new(BrowserConfig::default());
        let err = manager.open_page("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, BrowserError::NavigationFailed(_)));
        assert!(!manager.is_browser_running().await);
    }
}

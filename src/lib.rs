//! Product image scraper for Danawa and Compuzone
//!
//! Opens product pages in a headless Chromium via chromiumoxide, extracts the
//! title and image URLs, and saves the images under a folder named after the
//! product. Work is serialized through a single-worker queue.

mod browser;
pub mod browser_setup;
pub mod downloader;
mod manager;
pub mod notifier;
pub mod page_extractor;
pub mod queue;
pub mod scraper;
pub mod task;
pub mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::constants::CHROME_USER_AGENT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root under which `danawa_images/` and `compuzone_images/` are created
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,

    /// CDP request and navigation timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Fixed settle delays before and between in-page scripts.
///
/// These are worst-case load-time guesses, not completion signals. Slow
/// networks can still outrun them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_title_settle_ms")]
    pub title_settle_ms: u64,

    #[serde(default = "default_detail_settle_ms")]
    pub detail_settle_ms: u64,

    /// Pause after expanding the collapsed Danawa description
    #[serde(default = "default_detail_expand_pause_ms")]
    pub detail_expand_pause_ms: u64,

    #[serde(default = "default_compuzone_settle_ms")]
    pub compuzone_settle_ms: u64,

    /// Pause after opening the detail tab and after the first scroll
    #[serde(default = "default_compuzone_step_pause_ms")]
    pub compuzone_step_pause_ms: u64,

    /// Pause after scrolling back to the top
    #[serde(default = "default_compuzone_short_pause_ms")]
    pub compuzone_short_pause_ms: u64,

    /// Pause for lazy images after the final scroll
    #[serde(default = "default_compuzone_final_pause_ms")]
    pub compuzone_final_pause_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false // SECURE BY DEFAULT
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_title_settle_ms() -> u64 {
    2000
}

fn default_detail_settle_ms() -> u64 {
    3000
}

fn default_detail_expand_pause_ms() -> u64 {
    500
}

fn default_compuzone_settle_ms() -> u64 {
    7000
}

fn default_compuzone_step_pause_ms() -> u64 {
    1000
}

fn default_compuzone_short_pause_ms() -> u64 {
    500
}

fn default_compuzone_final_pause_ms() -> u64 {
    2000
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    CHROME_USER_AGENT.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            browser: BrowserConfig::default(),
            timing: TimingConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            title_settle_ms: default_title_settle_ms(),
            detail_settle_ms: default_detail_settle_ms(),
            detail_expand_pause_ms: default_detail_expand_pause_ms(),
            compuzone_settle_ms: default_compuzone_settle_ms(),
            compuzone_step_pause_ms: default_compuzone_step_pause_ms(),
            compuzone_short_pause_ms: default_compuzone_short_pause_ms(),
            compuzone_final_pause_ms: default_compuzone_final_pause_ms(),
        }
    }
}

impl TimingConfig {
    /// All delays zeroed, for driving the pipeline against fakes
    pub fn immediate() -> Self {
        Self {
            title_settle_ms: 0,
            detail_settle_ms: 0,
            detail_expand_pause_ms: 0,
            compuzone_settle_ms: 0,
            compuzone_step_pause_ms: 0,
            compuzone_short_pause_ms: 0,
            compuzone_final_pause_ms: 0,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

pub(crate) fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Load config from YAML.
///
/// An explicit `path` must exist. Without one, `config.yaml` in the working
/// directory is used when present, defaults otherwise.
pub fn load_yaml_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                return Ok(Config::default());
            }
            fallback
        }
    };

    let contents = fs::read_to_string(&config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", config_path.display(), e))?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

pub use browser::{BrowserError, BrowserResult, BrowserWrapper, launch_browser};
pub use downloader::{Downloader, HttpFetcher, ImageFetcher};
pub use manager::BrowserManager;
pub use notifier::Notifier;
pub use page_extractor::{BrowserPageExtractor, PageExtractor};
pub use queue::{QueueCoordinator, TaskHandle, TaskProcessor};
pub use scraper::ProductScraper;
pub use task::{Site, Task, TaskReport};

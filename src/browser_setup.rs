//! Locating, fetching and launching Chromium
//!
//! Lookup order: `CHROMIUM_PATH`, the usual install locations for the
//! platform, then `which`. When all of those miss, a managed Chromium is
//! downloaded into the user cache and reused on later runs.

use anyhow::{Context, Result};
use chromiumoxide::Handler;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::BrowserConfig;
use crate::utils::constants::CHROME_USER_AGENT;

const BROWSER_PATH_ENV: &str = "CHROMIUM_PATH";
const MANAGED_BROWSER_DIR: &str = "product_image_scraper/chromium";

#[cfg(target_os = "windows")]
const INSTALL_LOCATIONS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"%LOCALAPPDATA%\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\Chromium\Application\chrome.exe",
];

#[cfg(target_os = "macos")]
const INSTALL_LOCATIONS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/opt/homebrew/bin/chromium",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const INSTALL_LOCATIONS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

const PATH_COMMANDS: [&str; 4] = ["chromium", "chromium-browser", "google-chrome", "chrome"];

/// Profile directory that is removed again unless the launch succeeds
struct TempDirGuard {
    path: PathBuf,
    keep: bool,
}

impl TempDirGuard {
    fn new(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create profile directory {}", path.display()))?;
        Ok(Self { path, keep: false })
    }

    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed unused profile directory {}", self.path.display()),
            Err(e) => warn!("Failed to remove profile directory {}: {}", self.path.display(), e),
        }
    }
}

/// Expand `~/` and `%VAR%` in an install location
fn expand_location(location: &str) -> Option<PathBuf> {
    if let Some(rest) = location.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    if location.contains('%') {
        return Some(PathBuf::from(expand_windows_env_vars(location)));
    }
    Some(PathBuf::from(location))
}

/// Expand `%VAR%` tokens; unknown variables are left as written.
fn expand_windows_env_vars(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            result.push(ch);
            continue;
        }
        let name: String = chars.by_ref().take_while(|&c| c != '%').collect();
        match std::env::var(&name) {
            _ if name.is_empty() => result.push('%'),
            Ok(value) => result.push_str(&value),
            Err(_) => {
                result.push('%');
                result.push_str(&name);
                result.push('%');
            }
        }
    }

    result
}

fn which(command: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(command).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!found.is_empty()).then(|| PathBuf::from(found))
}

/// Path of a locally installed Chrome/Chromium
pub async fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(BROWSER_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from {}: {}", BROWSER_PATH_ENV, path.display());
            return Ok(path);
        }
        warn!("{} points to a missing file: {}", BROWSER_PATH_ENV, path.display());
    }

    if let Some(path) = INSTALL_LOCATIONS
        .iter()
        .filter_map(|location| expand_location(location))
        .find(|path| path.exists())
    {
        info!("Found browser at {}", path.display());
        return Ok(path);
    }

    if !cfg!(target_os = "windows")
        && let Some(path) = PATH_COMMANDS.iter().find_map(|cmd| which(cmd))
    {
        info!("Found browser on PATH: {}", path.display());
        return Ok(path);
    }

    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download Chromium into the user cache and return its executable
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_root = dirs::cache_dir().unwrap_or_else(|| std::env::temp_dir().join(".cache"));
    let cache_dir = cache_root.join(MANAGED_BROWSER_DIR);
    info!("Downloading managed Chromium into {}", cache_dir.display());

    std::fs::create_dir_all(&cache_dir).context("Failed to create browser cache directory")?;

    let options = BrowserFetcherOptions::builder()
        .with_path(&cache_dir)
        .build()
        .context("Failed to build fetcher options")?;
    let revision = BrowserFetcher::new(options)
        .fetch()
        .await
        .context("Failed to download Chromium")?;

    info!("Chromium ready at {}", revision.folder_path.display());
    Ok(revision.executable_path)
}

/// Command-line switches for a scraping session.
///
/// Images stay enabled: Compuzone only fills in lazy detail images once they
/// have been rendered in the viewport.
fn launch_args(config: &BrowserConfig, in_container: bool) -> Vec<String> {
    let mut args: Vec<String> = [
        "--disable-blink-features=AutomationControlled",
        "--disable-infobars",
        "--disable-notifications",
        "--disable-extensions",
        "--disable-popup-blocking",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-renderer-backgrounding",
        "--disable-features=TranslateUI",
        "--no-first-run",
        "--no-default-browser-check",
        "--password-store=basic",
        "--use-mock-keychain",
        "--mute-audio",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    args.insert(0, format!("--user-agent={CHROME_USER_AGENT}"));

    if config.disable_security {
        args.extend(
            [
                "--disable-web-security",
                "--disable-features=IsolateOrigins,site-per-process",
                "--ignore-certificate-errors",
            ]
            .map(String::from),
        );
    }

    // setuid sandboxing is unavailable inside containers
    if in_container || config.disable_security {
        args.extend(["--no-sandbox", "--disable-setuid-sandbox"].map(String::from));
    }

    args
}

fn in_container() -> bool {
    Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

/// chromiumoxide cannot decode every CDP event Chrome emits
fn is_benign_cdp_error(message: &str) -> bool {
    message.contains("data did not match any variant of untagged enum Message")
        || message.contains("Failed to deserialize WS response")
}

fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            match event {
                Err(e) if is_benign_cdp_error(&e.to_string()) => trace!("Ignored CDP event: {}", e),
                Err(e) => error!("Browser handler error: {:?}", e),
                Ok(()) => {}
            }
        }
        debug!("Browser handler stopped");
    })
}

/// Find or download Chromium and launch it with its own profile directory.
///
/// Without `chrome_data_dir` a per-process directory under the system temp
/// dir is used. The directory is removed again if the launch fails.
pub async fn launch_browser(
    config: &BrowserConfig,
    chrome_data_dir: Option<PathBuf>,
) -> Result<(Browser, JoinHandle<()>)> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(e) => {
            warn!("{}; falling back to a managed Chromium", e);
            download_managed_browser().await?
        }
    };

    let profile = TempDirGuard::new(chrome_data_dir.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("product_image_scraper_chrome_{}", std::process::id()))
    }))?;

    if config.disable_security {
        warn!("Browser security features are disabled");
    }

    let builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(config.request_timeout_secs))
        .window_size(config.window.width, config.window.height)
        .user_data_dir(profile.path.clone())
        .chrome_executable(chrome_path)
        .args(launch_args(config, in_container()));
    let builder = if config.headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    let browser_config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    debug!("Launching browser with config: {:?}", browser_config);
    let (browser, handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    profile.into_path();
    Ok((browser, spawn_handler(handler)))
}

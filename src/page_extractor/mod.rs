//! In-page data extraction
//!
//! A routine opens a URL in its own page, waits a fixed settle interval,
//! runs optional preparation steps (clicks, scrolls), then evaluates a
//! read-only script whose JSON result is handed back. The browser-backed
//! implementation is [`BrowserPageExtractor`]; the pipeline only sees the
//! [`PageExtractor`] trait.
//!
//! Settle intervals are latency guesses. Nothing in the page signals that
//! lazy content has finished loading, so a slow site can still come back
//! with fewer images than it has.

mod browser_extractor;
pub mod extractors;
pub mod js_scripts;
pub mod schema;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::browser::BrowserError;

pub use browser_extractor::BrowserPageExtractor;
pub use extractors::{compuzone_product, danawa_detail_images, danawa_title};
pub use schema::{ExtractedImage, ExtractedProduct, ImageKind};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Browser unavailable: {0}")]
    Browser(#[from] BrowserError),

    #[error("Script '{routine}' failed: {message}")]
    Script { routine: String, message: String },

    #[error("Unexpected result from '{routine}': {source}")]
    Decode {
        routine: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No matching elements for '{0}'")]
    NoMatch(String),
}

/// A script run before extraction, followed by a fixed pause
#[derive(Debug, Clone)]
pub struct PrepStep {
    pub script: &'static str,
    pub pause: Duration,
}

/// Everything needed to pull one piece of data out of a page
#[derive(Debug, Clone)]
pub struct ExtractionRoutine {
    pub name: &'static str,
    pub settle: Duration,
    pub steps: Vec<PrepStep>,
    /// JS expression evaluating to a JSON-serializable value
    pub script: &'static str,
}

impl ExtractionRoutine {
    pub fn new(name: &'static str, script: &'static str) -> Self {
        Self {
            name,
            settle: Duration::ZERO,
            steps: Vec::new(),
            script,
        }
    }

    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn step(mut self, script: &'static str, pause: Duration) -> Self {
        self.steps.push(PrepStep { script, pause });
        self
    }
}

#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Load `url` in an isolated page and return the routine's raw result
    async fn run(&self, url: &str, routine: &ExtractionRoutine) -> Result<Value, ExtractionError>;
}

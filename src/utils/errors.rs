use thiserror::Error;

use crate::page_extractor::ExtractionError;
use crate::queue::QueueError;

/// Errors that end a scrape task
///
/// Per-image download failures never end a task; they are counted in the
/// task report instead.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Task aborted: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserError;

    #[test]
    fn browser_failures_reach_tasks_through_extraction() {
        let err: ScrapeError =
            ExtractionError::from(BrowserError::LaunchFailed("no chromium".into())).into();
        assert_eq!(
            err.to_string(),
            "Extraction error: Browser unavailable: Failed to launch browser: no chromium"
        );
        assert!(matches!(
            err,
            ScrapeError::Extraction(ExtractionError::Browser(BrowserError::LaunchFailed(_)))
        ));
    }
}

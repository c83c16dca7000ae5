use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::Page;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ExtractionError, ExtractionRoutine, PageExtractor};
use crate::manager::BrowserManager;

/// Runs routines in fresh pages of the managed Chromium instance
#[derive(Clone)]
pub struct BrowserPageExtractor {
    manager: Arc<BrowserManager>,
}

impl BrowserPageExtractor {
    pub fn new(manager: Arc<BrowserManager>) -> Self {
        Self { manager }
    }

    async fn evaluate(page: &Page, routine: &str, script: &str) -> Result<Value, ExtractionError> {
        let script_error = |message: String| ExtractionError::Script {
            routine: routine.to_string(),
            message,
        };

        let result = page
            .evaluate(script)
            .await
            .map_err(|e| script_error(e.to_string()))?;
        Ok(script_value(result.value()))
    }

    async fn run_on_page(page: &Page, routine: &ExtractionRoutine) -> Result<Value, ExtractionError> {
        tokio::time::sleep(routine.settle).await;

        for (index, step) in routine.steps.iter().enumerate() {
            // Preparation is best effort: a missing button must not lose the page
            if let Err(e) = Self::evaluate(page, routine.name, step.script).await {
                warn!("{} step {} failed: {}", routine.name, index + 1, e);
            }
            tokio::time::sleep(step.pause).await;
        }

        Self::evaluate(page, routine.name, routine.script).await
    }
}

/// CDP reports a JS `null` (and `undefined`) as a missing value; callers
/// decode that as "nothing found", not as a script failure.
fn script_value(raw: Option<&Value>) -> Value {
    raw.cloned().unwrap_or(Value::Null)
}

#[async_trait]
impl PageExtractor for BrowserPageExtractor {
    async fn run(&self, url: &str, routine: &ExtractionRoutine) -> Result<Value, ExtractionError> {
        debug!("Running {} on {}", routine.name, url);
        let page = self.manager.open_page(url).await?;

        let result = Self::run_on_page(&page, routine).await;

        if let Err(e) = page.close().await {
            warn!("Failed to close page for {}: {}", url, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimingConfig;
    use crate::page_extractor::extractors::tests::CannedExtractor;
    use crate::page_extractor::danawa_title;
    use serde_json::json;

    #[test]
    fn missing_value_becomes_null() {
        assert_eq!(script_value(None), Value::Null);
        assert_eq!(script_value(Some(&json!(["a"]))), json!(["a"]));
    }

    #[tokio::test]
    async fn null_title_from_the_page_is_no_match() {
        let extractor = CannedExtractor::default().with("danawa_title", script_value(None));
        let err = danawa_title(
            &extractor,
            "https://prod.danawa.com/info/?pcode=1",
            &TimingConfig::immediate(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExtractionError::NoMatch(_)));
    }
}

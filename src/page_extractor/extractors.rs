//! Site routines and typed results
//!
//! Each function builds the routine for one piece of data, runs it through
//! a [`PageExtractor`], and turns the raw JSON into domain types.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::js_scripts;
use super::schema::{CompuzonePage, ExtractedImage, ExtractedProduct, ImageKind};
use super::{ExtractionError, ExtractionRoutine, PageExtractor};
use crate::utils::constants::DANAWA_PRODUCT_PAGE;
use crate::utils::naming::{dedupe_urls, is_danawa_detail_image, resolve_image_url};
use crate::{TimingConfig, millis};

fn decode<T: DeserializeOwned>(routine: &ExtractionRoutine, value: Value) -> Result<T, ExtractionError> {
    serde_json::from_value(value).map_err(|source| ExtractionError::Decode {
        routine: routine.name.to_string(),
        source,
    })
}

pub fn danawa_title_routine(timing: &TimingConfig) -> ExtractionRoutine {
    ExtractionRoutine::new("danawa_title", js_scripts::DANAWA_TITLE)
        .settle(millis(timing.title_settle_ms))
}

pub fn danawa_detail_routine(timing: &TimingConfig) -> ExtractionRoutine {
    ExtractionRoutine::new("danawa_detail_images", js_scripts::DANAWA_DETAIL_IMAGES)
        .settle(millis(timing.detail_settle_ms))
        .step(
            js_scripts::DANAWA_EXPAND_DETAIL,
            millis(timing.detail_expand_pause_ms),
        )
}

/// Detail tab, then bottom/top/bottom scrolling to trigger lazy loading
pub fn compuzone_routine(timing: &TimingConfig) -> ExtractionRoutine {
    let step = millis(timing.compuzone_step_pause_ms);
    ExtractionRoutine::new("compuzone_product", js_scripts::COMPUZONE_PRODUCT)
        .settle(millis(timing.compuzone_settle_ms))
        .step(js_scripts::COMPUZONE_OPEN_DETAIL, step)
        .step(js_scripts::SCROLL_TO_BOTTOM, step)
        .step(js_scripts::SCROLL_TO_TOP, millis(timing.compuzone_short_pause_ms))
        .step(js_scripts::SCROLL_TO_BOTTOM, millis(timing.compuzone_final_pause_ms))
}

/// Product title shown on a Danawa product page
pub async fn danawa_title(
    extractor: &dyn PageExtractor,
    url: &str,
    timing: &TimingConfig,
) -> Result<String, ExtractionError> {
    let routine = danawa_title_routine(timing);
    let value = extractor.run(url, &routine).await?;
    let title: Option<String> = decode(&routine, value)?;

    title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ExtractionError::NoMatch("h3.prod_tit span.title".into()))
}

/// Images embedded in the Danawa product description
pub async fn danawa_detail_images(
    extractor: &dyn PageExtractor,
    pcode: &str,
    timing: &TimingConfig,
) -> Result<Vec<ExtractedImage>, ExtractionError> {
    let routine = danawa_detail_routine(timing);
    let url = format!("{DANAWA_PRODUCT_PAGE}{pcode}");
    let value = extractor.run(&url, &routine).await?;
    let sources: Vec<String> = decode(&routine, value)?;

    let urls = dedupe_urls(
        sources
            .iter()
            .filter(|src| is_danawa_detail_image(src))
            .filter_map(|src| resolve_image_url(&url, src)),
    );
    if urls.is_empty() {
        return Err(ExtractionError::NoMatch("danawa detail images".into()));
    }

    Ok(urls
        .into_iter()
        .map(|url| ExtractedImage {
            kind: ImageKind::Detail,
            url,
        })
        .collect())
}

/// Title plus main and detail images of a Compuzone product page
pub async fn compuzone_product(
    extractor: &dyn PageExtractor,
    url: &str,
    timing: &TimingConfig,
) -> Result<ExtractedProduct, ExtractionError> {
    let routine = compuzone_routine(timing);
    let value = extractor.run(url, &routine).await?;
    let page: CompuzonePage = decode(&routine, value)?;

    let tagged = page
        .main
        .iter()
        .map(|src| (ImageKind::Primary, src))
        .chain(page.detail.iter().map(|src| (ImageKind::Detail, src)))
        .filter_map(|(kind, src)| Some((kind, resolve_image_url(url, src)?)));

    let mut images: Vec<ExtractedImage> = Vec::new();
    for (kind, url) in tagged {
        if !images.iter().any(|img| img.url == url) {
            images.push(ExtractedImage { kind, url });
        }
    }

    let title = page
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    if title.is_none() && images.is_empty() {
        return Err(ExtractionError::NoMatch("compuzone product".into()));
    }

    Ok(ExtractedProduct { title, images })
}

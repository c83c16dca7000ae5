//! Per-site scrape pipelines
//!
//! [`ProductScraper`] is the queue's task processor. For each task it pulls
//! the title and image list out of the product page, picks the folder name,
//! and downloads images one after another. A failed image is logged and
//! counted; the remaining images are still attempted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::downloader::Downloader;
use crate::notifier::Notifier;
use crate::page_extractor::{
    ImageKind, PageExtractor, compuzone_product, danawa_detail_images, danawa_title,
};
use crate::queue::TaskProcessor;
use crate::task::{Site, Task, TaskReport};
use crate::utils::constants::{
    COMPUZONE_DETAIL_PREFIX, COMPUZONE_FALLBACK_FOLDER, COMPUZONE_FOLDER, COMPUZONE_MAIN_PREFIX,
    DANAWA_DETAIL_PREFIX, DANAWA_FOLDER, DANAWA_THUMBNAIL_COUNT, DIRECT_IMAGE_FALLBACK_FOLDER,
};
use crate::utils::errors::ScrapeError;
use crate::utils::naming::{
    danawa_thumbnail_url, pcode_from_image_url, sanitize_title, url_file_stem, with_shrink,
};
use crate::TimingConfig;

/// Thumbnail width requested from Danawa's resizer
const THUMBNAIL_WIDTH: u32 = 500;
const LARGE_WIDTH: u32 = 890;

pub struct ProductScraper {
    extractor: Arc<dyn PageExtractor>,
    downloader: Downloader,
    notifier: Notifier,
    output_dir: PathBuf,
    timing: TimingConfig,
}

impl ProductScraper {
    pub fn new(
        extractor: Arc<dyn PageExtractor>,
        downloader: Downloader,
        notifier: Notifier,
        output_dir: impl Into<PathBuf>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            extractor,
            downloader,
            notifier,
            output_dir: output_dir.into(),
            timing,
        }
    }

    /// Download one image into the report's folder, recording the outcome
    async fn save(&self, report: &mut TaskReport, url: &str, file_name: &str) {
        let dest = report.folder.join(file_name);
        let label = display_name(&dest);
        self.notifier.log(format!("Downloading {label}"));

        match self.downloader.download(url, &dest).await {
            Ok(_) => {
                self.notifier.log(format!("Saved {label}"));
                report.saved.push(dest);
            }
            Err(e) => {
                self.notifier.log(format!("Failed to download {label}: {e}"));
                report.failed += 1;
            }
        }
    }

    async fn scrape_danawa(&self, task: &Task) -> Result<TaskReport, ScrapeError> {
        let started_at = Utc::now();
        let pcode = task.id();
        self.notifier.log(format!("Processing product code {pcode}..."));

        self.notifier.log("Fetching product title...");
        let title = match danawa_title(self.extractor.as_ref(), &task.page_url(), &self.timing).await
        {
            Ok(title) => sanitize_title(&title),
            Err(e) => {
                self.notifier.log(format!("Failed to fetch product title: {e}"));
                None
            }
        };
        let folder_name = match title {
            Some(title) => {
                self.notifier.log(format!("Product title: {title}"));
                title
            }
            None => {
                self.notifier.log(format!(
                    "Could not read the product title; using pcode {pcode} as folder name."
                ));
                pcode.to_string()
            }
        };

        let folder = self.output_dir.join(DANAWA_FOLDER).join(&folder_name);
        let mut report = TaskReport::new(task.clone(), folder, started_at);

        for index in 1..=DANAWA_THUMBNAIL_COUNT {
            let url = with_shrink(&danawa_thumbnail_url(pcode, index), THUMBNAIL_WIDTH);
            let file_name = format!("image_{index}_{THUMBNAIL_WIDTH}px.jpg");
            self.save(&mut report, &url, &file_name).await;
        }

        self.notifier.log("Fetching detail images...");
        match danawa_detail_images(self.extractor.as_ref(), pcode, &self.timing).await {
            Ok(images) => {
                self.notifier.log(format!("Found {} detail images.", images.len()));
                for (n, image) in images.iter().enumerate() {
                    let file_name = format!("{DANAWA_DETAIL_PREFIX}_{}.jpg", n + 1);
                    self.save(&mut report, &image.url, &file_name).await;
                }
            }
            Err(e) => self.notifier.log(format!("No detail images found: {e}")),
        }

        self.notifier.log("All downloads finished.");
        Ok(report.finish())
    }

    async fn scrape_compuzone(&self, task: &Task) -> Result<TaskReport, ScrapeError> {
        let started_at = Utc::now();
        let url = task.page_url();
        self.notifier.log(format!("Processing Compuzone product: {url}"));
        self.notifier.log(format!(
            "Loading page ({}ms settle, then detail tab and scrolling)...",
            self.timing.compuzone_settle_ms
        ));

        let product = compuzone_product(self.extractor.as_ref(), &url, &self.timing).await?;

        let folder_name = match product.title.as_deref().and_then(sanitize_title) {
            Some(title) => {
                self.notifier.log(format!("Product title: {title}"));
                title
            }
            None => {
                self.notifier
                    .log("Could not read the product title; using the default folder name.");
                COMPUZONE_FALLBACK_FOLDER.to_string()
            }
        };

        let folder = self.output_dir.join(COMPUZONE_FOLDER).join(folder_name);
        let mut report = TaskReport::new(task.clone(), folder, started_at);
        self.notifier
            .log(format!("Downloading {} images.", product.images.len()));

        let (mut main, mut detail) = (0, 0);
        for image in &product.images {
            let file_name = match image.kind {
                ImageKind::Primary => {
                    main += 1;
                    format!("{COMPUZONE_MAIN_PREFIX}_{main}.jpg")
                }
                ImageKind::Detail => {
                    detail += 1;
                    format!("{COMPUZONE_DETAIL_PREFIX}_{detail}.jpg")
                }
            };
            self.save(&mut report, &image.url, &file_name).await;
        }

        self.notifier
            .log(format!("Main images: {main}, detail images: {detail}"));
        self.notifier.log("All downloads finished.");
        Ok(report.finish())
    }

    async fn scrape_direct_image(&self, task: &Task) -> Result<TaskReport, ScrapeError> {
        let started_at = Utc::now();
        let url = task.page_url();
        self.notifier.log(format!("Processing direct image URL: {url}"));

        let folder_name =
            pcode_from_image_url(&url).unwrap_or_else(|| DIRECT_IMAGE_FALLBACK_FOLDER.to_string());
        let folder = self.output_dir.join(DANAWA_FOLDER).join(folder_name);
        let mut report = TaskReport::new(task.clone(), folder, started_at);

        let stem = url_file_stem(&url);
        for width in [THUMBNAIL_WIDTH, LARGE_WIDTH] {
            let file_name = format!("{stem}_{width}px.jpg");
            self.save(&mut report, &with_shrink(&url, width), &file_name)
                .await;
        }

        self.notifier.log("All downloads finished.");
        Ok(report.finish())
    }
}

#[async_trait]
impl TaskProcessor for ProductScraper {
    async fn process(&self, task: &Task) -> Result<TaskReport, ScrapeError> {
        match task.site() {
            Site::Danawa => self.scrape_danawa(task).await,
            Site::Compuzone => self.scrape_compuzone(task).await,
            Site::DanawaImage => self.scrape_direct_image(task).await,
        }
    }
}

/// `<folder>/<file>` for log lines
fn display_name(path: &Path) -> String {
    let mut parts: Vec<_> = path
        .iter()
        .rev()
        .take(2)
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    parts.reverse();
    parts.join("/")
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use product_image_scraper::downloader::FetchError;
use product_image_scraper::page_extractor::{ExtractionError, ExtractionRoutine};
use product_image_scraper::queue::QueueError;
use product_image_scraper::{
    Downloader, ImageFetcher, Notifier, PageExtractor, ProductScraper, QueueCoordinator, Task,
    TimingConfig,
};

/// Answers routines per page URL and logs which pages were visited
#[derive(Default)]
struct FakePages {
    pages: HashMap<(String, &'static str), Value>,
    visited: Mutex<Vec<String>>,
}

impl FakePages {
    fn page(mut self, url: &str, routine: &'static str, value: Value) -> Self {
        self.pages.insert((url.to_string(), routine), value);
        self
    }
}

#[async_trait]
impl PageExtractor for FakePages {
    async fn run(&self, url: &str, routine: &ExtractionRoutine) -> Result<Value, ExtractionError> {
        self.visited.lock().push(url.to_string());
        self.pages
            .get(&(url.to_string(), routine.name))
            .cloned()
            .ok_or_else(|| ExtractionError::NoMatch(routine.name.to_string()))
    }
}

/// Every URL on the image CDN resolves; anything else is a 404
struct FakeCdn;

#[async_trait]
impl ImageFetcher for FakeCdn {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if url.contains("img.") {
            Ok(url.as_bytes().to_vec())
        } else {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }
}

const COMPUZONE_OK: &str = "https://www.compuzone.co.kr/product/product_detail.htm?ProductNo=1";
const COMPUZONE_BROKEN: &str = "https://www.compuzone.co.kr/product/product_detail.htm?ProductNo=2";

fn pages() -> FakePages {
    FakePages::default()
        .page(
            "https://prod.danawa.com/info/?pcode=11223344",
            "danawa_title",
            json!("Crucial P3 Plus 1TB"),
        )
        .page(
            "https://prod.danawa.com/info/?pcode=11223344",
            "danawa_detail_images",
            json!(["//img.danawa.com/prod_img/add_1/a.jpg", "https://ad.danawa.com/banner.gif"]),
        )
        .page(
            COMPUZONE_OK,
            "compuzone_product",
            json!({
                "title": "Micronics Classic II 700W",
                "main": ["https://img.compuzone.co.kr/m1.jpg"],
                "detail": ["https://img.compuzone.co.kr/d1.jpg", "https://cdn.other/d2.jpg"]
            }),
        )
}

#[tokio::test]
async fn queue_runs_products_in_order_and_survives_failures() {
    let out = tempfile::tempdir().unwrap();
    let pages = Arc::new(pages());
    let notifier = Notifier::new();
    let mut progress = notifier.subscribe();

    let scraper = ProductScraper::new(
        pages.clone(),
        Downloader::new(Arc::new(FakeCdn)),
        notifier.clone(),
        out.path(),
        TimingConfig::immediate(),
    );
    let queue = QueueCoordinator::start(Arc::new(scraper), notifier.clone());

    let danawa = queue.submit(Task::danawa("11223344", None)).unwrap();
    let broken = queue.submit(Task::compuzone(COMPUZONE_BROKEN)).unwrap();
    let compuzone = queue.submit(Task::compuzone(COMPUZONE_OK)).unwrap();
    assert!(matches!(
        queue.submit(Task::danawa("11223344", None)),
        Err(QueueError::Duplicate(_))
    ));

    let report = danawa.finished().await.unwrap();
    let folder = out.path().join("danawa_images").join("Crucial P3 Plus 1TB");
    assert_eq!(report.folder, folder);
    assert_eq!(report.saved.len(), 6);
    assert_eq!(report.failed, 0);
    assert!(folder.join("상세페이지_1.jpg").exists());

    assert!(broken.finished().await.is_err());

    let report = compuzone.finished().await.unwrap();
    let folder = out
        .path()
        .join("compuzone_images")
        .join("Micronics Classic II 700W");
    assert_eq!(
        report.saved,
        vec![folder.join("메인_1.jpg"), folder.join("상세_1.jpg")]
    );
    assert_eq!(report.failed, 1);
    assert!(!folder.join("상세_2.jpg").exists());

    queue.join().await;

    let visited = pages.visited.lock().clone();
    assert_eq!(
        visited,
        vec![
            "https://prod.danawa.com/info/?pcode=11223344".to_string(),
            "https://prod.danawa.com/info/?pcode=11223344".to_string(),
            COMPUZONE_BROKEN.to_string(),
            COMPUZONE_OK.to_string(),
        ]
    );

    let mut lines = Vec::new();
    while let Ok(line) = progress.try_recv() {
        lines.push(line);
    }
    assert!(lines.iter().any(|l| l.contains("already in the download queue")));
    assert!(lines.iter().any(|l| l.starts_with("Download error for compuzone:")));
    assert_eq!(
        lines.iter().filter(|l| *l == "All downloads finished.").count(),
        2
    );
}

#[tokio::test]
async fn closed_queue_rejects_new_products() {
    let out = tempfile::tempdir().unwrap();
    let notifier = Notifier::new();
    let scraper = ProductScraper::new(
        Arc::new(FakePages::default()),
        Downloader::new(Arc::new(FakeCdn)),
        notifier.clone(),
        out.path(),
        TimingConfig::immediate(),
    );
    let queue = QueueCoordinator::start(Arc::new(scraper), notifier);

    let direct = queue
        .submit(Task::danawa_image(
            "https://img.danawa.com/prod_998877/add_1/shot.jpg",
        ))
        .unwrap();
    queue.close();
    assert!(matches!(
        queue.submit(Task::danawa("1", None)),
        Err(QueueError::Closed(_))
    ));

    let report = direct.finished().await.unwrap();
    assert_eq!(report.saved.len(), 2);
    assert!(out
        .path()
        .join("danawa_images/998877/shot_890px.jpg")
        .exists());
    queue.join().await;
}

//! Shared constants for sites, naming, and browser identity
//!
//! Site hosts and path layouts live here so the parser, the extraction
//! routines, and the scraper agree on them.

/// Chrome user agent string for stealth mode and image fetches
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

pub const DANAWA_HOST_MARKER: &str = "danawa.com";
pub const COMPUZONE_HOST_MARKER: &str = "compuzone.co.kr";

/// Hosts serving Danawa product images directly
pub const DANAWA_IMAGE_HOSTS: [&str; 2] = ["iws.danawa.com", "img.danawa.com"];

pub const DANAWA_PRODUCT_PAGE: &str = "https://prod.danawa.com/info/?pcode=";
pub const DANAWA_IMAGE_ROOT: &str = "https://img.danawa.com/prod_img/500000";

/// Danawa always publishes five numbered thumbnails per product
pub const DANAWA_THUMBNAIL_COUNT: usize = 5;

pub const DANAWA_FOLDER: &str = "danawa_images";
pub const COMPUZONE_FOLDER: &str = "compuzone_images";
pub const COMPUZONE_FALLBACK_FOLDER: &str = "compuzone_product";
pub const DIRECT_IMAGE_FALLBACK_FOLDER: &str = "direct";

pub const DANAWA_DETAIL_PREFIX: &str = "상세페이지";
pub const COMPUZONE_MAIN_PREFIX: &str = "메인";
pub const COMPUZONE_DETAIL_PREFIX: &str = "상세";

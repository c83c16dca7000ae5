//! URL normalization and filesystem naming helpers
//!
//! Everything here is pure so it can be exercised without a browser.

use std::collections::HashSet;

use url::Url;

use super::constants::DANAWA_IMAGE_ROOT;

/// Characters that Windows and most shells refuse in a path component
const PATH_UNSAFE: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Strip path-unsafe characters from a product title.
///
/// Returns `None` when nothing usable is left, so callers fall back to
/// their default folder name.
pub fn sanitize_title(title: &str) -> Option<String> {
    let cleaned: String = title.chars().filter(|c| !PATH_UNSAFE.contains(c)).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Resolve an image source against the page it was found on.
///
/// Absolute, protocol-relative, root-relative and relative sources all
/// resolve the way the browser would. Anything that does not end up as an
/// http(s) URL (`data:` placeholders, garbage) yields `None`.
pub fn resolve_image_url(page_url: &str, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    let resolved = Url::parse(page_url).ok()?.join(src).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.into())
}

/// Danawa detail images are recognized by their storage path
pub fn is_danawa_detail_image(src: &str) -> bool {
    src.contains("add_1") || src.contains("prod_img")
}

/// Drop empty entries and repeated URLs, keeping first-seen order
pub fn dedupe_urls<I>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| !url.is_empty())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Build the canonical (unshrunk) Danawa thumbnail URL.
///
/// Danawa shards images by the last six digits of the pcode:
/// `.../{last 3}/{3 before that}/img/{pcode}_{index}.jpg`.
pub fn danawa_thumbnail_url(pcode: &str, index: usize) -> String {
    let len = pcode.len();
    let last = &pcode[len.saturating_sub(3)..];
    let middle = &pcode[len.saturating_sub(6)..len.saturating_sub(3)];
    format!("{DANAWA_IMAGE_ROOT}/{last}/{middle}/img/{pcode}_{index}.jpg")
}

/// Remove the query string (Danawa encodes resize options there)
pub fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

/// Append a `shrink` resize option to a Danawa image URL
pub fn with_shrink(url: &str, width: u32) -> String {
    format!("{}?shrink={width}", strip_query(url))
}

/// Pull the product code out of a `/prod_<digits>/` path segment
pub fn pcode_from_image_url(url: &str) -> Option<String> {
    let start = url.find("/prod_")? + "/prod_".len();
    let rest = &url[start..];
    let end = rest.find('/')?;
    let digits = &rest[..end];
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits.to_string())
    } else {
        None
    }
}

/// File stem of the last path segment, without query or extension
pub fn url_file_stem(url: &str) -> String {
    let path = strip_query(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_unsafe_characters() {
        assert_eq!(
            sanitize_title(r#"  ASUS TUF: RTX 4070 <OC> "White" 12GB/256bit | A*B?C\D  "#).as_deref(),
            Some("ASUS TUF RTX 4070 OC White 12GB256bit  ABCD")
        );
    }

    #[test]
    fn sanitize_returns_none_when_nothing_left() {
        assert_eq!(sanitize_title(" :/?* "), None);
        assert_eq!(sanitize_title(""), None);
    }

    #[test]
    fn sanitize_keeps_korean_titles() {
        assert_eq!(
            sanitize_title("삼성전자 오디세이 G5").as_deref(),
            Some("삼성전자 오디세이 G5")
        );
    }

    #[test]
    fn resolves_sources_against_their_own_page() {
        let danawa = "https://prod.danawa.com/info/?pcode=42";
        let compuzone = "https://www.compuzone.co.kr/product/product_detail.htm?ProductNo=7";

        assert_eq!(
            resolve_image_url(danawa, "//img.danawa.com/a.jpg").as_deref(),
            Some("https://img.danawa.com/a.jpg")
        );
        assert_eq!(
            resolve_image_url(danawa, "/prod_img/add_1/a.jpg").as_deref(),
            Some("https://prod.danawa.com/prod_img/add_1/a.jpg")
        );
        assert_eq!(
            resolve_image_url(danawa, "prod_img/add_1/a.jpg").as_deref(),
            Some("https://prod.danawa.com/info/prod_img/add_1/a.jpg")
        );
        assert_eq!(
            resolve_image_url(compuzone, "/img/detail/d1.jpg").as_deref(),
            Some("https://www.compuzone.co.kr/img/detail/d1.jpg")
        );
        assert_eq!(
            resolve_image_url(compuzone, "img/detail/d2.jpg").as_deref(),
            Some("https://www.compuzone.co.kr/product/img/detail/d2.jpg")
        );
        assert_eq!(
            resolve_image_url(compuzone, "https://x.example/a.jpg").as_deref(),
            Some("https://x.example/a.jpg")
        );
    }

    #[test]
    fn unusable_sources_are_dropped() {
        let page = "https://prod.danawa.com/info/?pcode=42";
        assert_eq!(resolve_image_url(page, "   "), None);
        assert_eq!(resolve_image_url(page, "data:image/gif;base64,R0lGOD"), None);
        assert_eq!(resolve_image_url("not a url", "/a.jpg"), None);
    }

    #[test]
    fn thumbnail_url_uses_pcode_shards() {
        assert_eq!(
            danawa_thumbnail_url("12345678", 1),
            "https://img.danawa.com/prod_img/500000/678/345/img/12345678_1.jpg"
        );
    }

    #[test]
    fn thumbnail_url_handles_short_pcode() {
        assert_eq!(
            danawa_thumbnail_url("12345", 2),
            "https://img.danawa.com/prod_img/500000/345/12/img/12345_2.jpg"
        );
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let urls = vec!["a".to_string(), "b".to_string(), "a".to_string(), String::new()];
        assert_eq!(dedupe_urls(urls), vec!["a", "b"]);
    }

    #[test]
    fn shrink_replaces_existing_query() {
        assert_eq!(
            with_shrink("https://img.danawa.com/x.jpg?shrink=130:130", 890),
            "https://img.danawa.com/x.jpg?shrink=890"
        );
    }

    #[test]
    fn pcode_from_image_path() {
        assert_eq!(
            pcode_from_image_url("https://img.danawa.com/prod_12345/add_1/a.jpg").as_deref(),
            Some("12345")
        );
        assert_eq!(pcode_from_image_url("https://img.danawa.com/prod_img/a.jpg"), None);
    }

    #[test]
    fn file_stem_ignores_query() {
        assert_eq!(url_file_stem("https://img.danawa.com/a/b/123_1.jpg?shrink=500"), "123_1");
    }
}

//! JavaScript evaluated inside product pages
//!
//! Every script is a self-invoking expression returning plain JSON. Sources
//! prefer `img.src`, which the browser has already resolved against the page;
//! lazy-load attributes are raw and get resolved on the Rust side, along with
//! filtering and dedup.

pub const DANAWA_TITLE: &str = r#"(() => {
    const el = document.querySelector('h3.prod_tit span.title');
    return el ? el.textContent.trim() : null;
})()"#;

/// Expands the collapsed product description, if the page has one
pub const DANAWA_EXPAND_DETAIL: &str = r#"(() => {
    const button = document.querySelector('button.btn_more, button.btn_more_detail');
    if (button) { button.click(); return true; }
    return false;
})()"#;

pub const DANAWA_DETAIL_IMAGES: &str = r#"(() => {
    const selector = '.detail_cont img, .detail_cont a img, .prod_detail img, '
        + '.prod_detail a img, .detail_cont div img, .prod_detail div img';
    return Array.from(document.querySelectorAll(selector))
        .map(img => img.src || img.dataset.src || '')
        .filter(src => src.length > 0);
})()"#;

/// Opens the detail tab and forces the lazy detail container visible
pub const COMPUZONE_OPEN_DETAIL: &str = r#"(() => {
    const labels = ['상세정보', '상세제원', '제품상세'];
    for (const el of document.querySelectorAll('a, button, li, div')) {
        const text = el.textContent || '';
        if (labels.some(label => text.includes(label))) { el.click(); break; }
    }
    const detail = document.querySelector('#pdtl_detail_img');
    if (detail) {
        detail.style.display = 'block';
        detail.style.visibility = 'visible';
    }
    return !!detail;
})()"#;

pub const SCROLL_TO_BOTTOM: &str = "(() => { window.scrollTo(0, document.body.scrollHeight); return true; })()";

pub const SCROLL_TO_TOP: &str = "(() => { window.scrollTo(0, 0); return true; })()";

pub const COMPUZONE_PRODUCT: &str = r#"(() => {
    const titleEl = document.querySelector('h2.tit_p_name');
    const main = Array.from(document.querySelectorAll('.main_img .lst li img'))
        .map(img => img.src || '')
        .filter(src => src.length > 0);
    const detailRoot = document.querySelector('#pdtl_detail_img');
    const detail = detailRoot
        ? Array.from(detailRoot.querySelectorAll('img'))
            .map(img => img.src || img.getAttribute('data-src')
                || img.getAttribute('data-original') || '')
            .filter(src => src.length > 0)
        : [];
    return {
        title: titleEl ? titleEl.textContent.trim() : null,
        main,
        detail,
    };
})()"#;

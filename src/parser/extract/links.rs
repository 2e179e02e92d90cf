use std::collections::BTreeSet;

use url::Url;

use crate::parser::html::hrefs;

const DETAIL_PAGE: &str = "cipdetail.aspx";

/// Absolute URL for `href`, rebuilt as `?y={year_id}&cipid={n}`.
/// `None` unless the link targets the `year_id` edition with a numeric cipid.
pub fn absolute_detail_url(href: &str, base: &str, year_id: &str) -> Option<String> {
    let mut url = Url::parse(base).ok()?.join(href.trim()).ok()?;

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };
    if param("y").as_deref() != Some(year_id) {
        return None;
    }
    let cipid = param("cipid").filter(|id| is_numeric_id(id))?;

    url.set_query(Some(&format!("y={year_id}&cipid={cipid}")));
    url.set_fragment(None);
    Some(url.to_string())
}

/// Canonical detail-page URL, or `None` for anything that is not a
/// `cipdetail.aspx` link of the requested edition.
pub fn normalize_detail_url(href: &str, base: &str, year_id: &str) -> Option<String> {
    if !href.to_ascii_lowercase().contains(DETAIL_PAGE) {
        return None;
    }
    absolute_detail_url(href, base, year_id)
}

/// All distinct detail-page URLs linked from a browse page, sorted.
pub fn extract_detail_urls(html: &str, base: &str, year_id: &str) -> Vec<String> {
    hrefs(html)
        .iter()
        .filter_map(|h| normalize_detail_url(h, base, year_id))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The numeric `cipid` query parameter of a detail URL.
pub fn cipid(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == "cipid")
        .map(|(_, v)| v.into_owned())
        .filter(|id| is_numeric_id(id))
}

fn is_numeric_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

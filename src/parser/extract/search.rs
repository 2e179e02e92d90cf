use std::sync::LazyLock;

use regex::Regex;

use super::links::absolute_detail_url;
use crate::cip::canonicalize;
use crate::parser::html::{hrefs, inline_text};

static GRID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<table\b[^>]*\bid\s*=\s*["'][^"']*GridView_searchresults[^"']*["'][^>]*>(.*?)</table>"#)
        .unwrap()
});
static ROW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").unwrap());
static CIPCODE_TD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<td\b[^>]*\bclass\s*=\s*["'][^"']*\bcipcode\b[^"']*["'][^>]*>(.*?)</td>"#).unwrap()
});
static TITLE_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<span\b[^>]*\bclass\s*=\s*["'][^"']*\bCIPTitle\b[^"']*["'][^>]*>(.*?)</span>"#).unwrap()
});

/// Find the detail-page link for the result row whose CIP column matches
/// `target_cip` after canonicalization. The header row is skipped.
pub fn find_detail_url(html: &str, target_cip: &str, base: &str, year_id: &str) -> Option<String> {
    let target = canonicalize(target_cip);
    if target.is_empty() {
        return None;
    }
    let grid = GRID_RE.captures(html)?;

    ROW_RE
        .captures_iter(&grid[1])
        .skip(1)
        .find_map(|row| {
            let row = &row[1];
            let code = CIPCODE_TD_RE.captures(row).map(|c| inline_text(&c[1]))?;
            let href = TITLE_SPAN_RE
                .captures(row)
                .and_then(|c| hrefs(&c[1]).into_iter().next())?;
            if canonicalize(&code) != target {
                return None;
            }
            absolute_detail_url(&href, base, year_id)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://nces.ed.gov/ipeds/cipcode/";

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/nces_search_14.html").unwrap()
    }

    #[test]
    fn matches_rollups_by_canonical_code() {
        let html = fixture();
        assert_eq!(
            find_detail_url(&html, "14", BASE, "56").as_deref(),
            Some("https://nces.ed.gov/ipeds/cipcode/cipdetail.aspx?y=56&cipid=90000")
        );
        assert_eq!(
            find_detail_url(&html, "14.0900", BASE, "56").as_deref(),
            Some("https://nces.ed.gov/ipeds/cipcode/cipdetail.aspx?y=56&cipid=90050")
        );
        assert_eq!(
            find_detail_url(&html, "14.0903", BASE, "56").as_deref(),
            Some("https://nces.ed.gov/ipeds/cipcode/cipdetail.aspx?y=56&cipid=90001")
        );
    }

    #[test]
    fn no_match() {
        let html = fixture();
        assert!(find_detail_url(&html, "99.9999", BASE, "56").is_none());
        assert!(find_detail_url(&html, "14.0903", BASE, "55").is_none());
        assert!(find_detail_url("<html><table></table></html>", "14", BASE, "56").is_none());
    }
}

use std::sync::LazyLock;

use regex::Regex;

use crate::model::NcesRecord;
use crate::parser::html::page_text;
use crate::parser::sections::{illustrative_examples, section_text, SectionLabels};

/// Detail header, 2-, 4- or 6-digit form: "Detail for CIP Code 14.0903".
static CIP_CAPTURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Detail for CIP Code\s+(\d{2}(?:\.\d{1,4})?)").unwrap());

pub const INVALID_CIPID: &str = "invalid_cipid_in_url";

/// CIP code as printed in the page header, empty when absent.
pub fn parse_cip_code(text: &str) -> String {
    CIP_CAPTURE_RE
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_default()
}

/// Parse one `cipdetail` page. Never fails: a page missing its code,
/// title or definition comes back with `parse_warning` set.
pub fn parse_detail(html: &str, url: &str, labels: &SectionLabels) -> NcesRecord {
    let text = page_text(html);

    let cip = parse_cip_code(&text);
    let title = section_text(&text, &labels.title, labels);
    let definition = section_text(&text, &labels.definition, labels);
    let action = section_text(&text, &labels.action, labels);
    let examples = illustrative_examples(&text, labels);

    let parse_warning = cip.is_empty() || title.is_empty() || definition.is_empty();

    NcesRecord {
        cip,
        title,
        definition,
        action,
        illustrative_examples: examples,
        source_url: url.to_string(),
        parse_warning,
        ..Default::default()
    }
}

/// Placeholder for a detail URL without a usable cipid. Kept in the dataset
/// so the gap stays visible.
pub fn invalid_cipid_record(url: &str) -> NcesRecord {
    NcesRecord {
        source_url: url.to_string(),
        parse_warning: true,
        error: Some(INVALID_CIPID.to_string()),
        ..Default::default()
    }
}

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::DhsRecord;
use crate::parser::html::normalize_spaces;

static CIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{2}\.\d{4})\b").unwrap());

/// Lowercase prefixes of page furniture that must never become a title.
const NOISE_PREFIXES: &[&str] = &["page ", "department of homeland", "stem designated"];

/// Shortest same-line remainder accepted as a title.
const MIN_INLINE_TITLE: usize = 3;

fn is_noise(title: &str) -> bool {
    let lower = title.to_lowercase();
    NOISE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// CIP rows from the DHS list's text layer.
///
/// The title is the rest of the line after the first 6-digit code, or the
/// next line when that remainder is too short. Repeated codes keep the first
/// non-empty title. Output is sorted by CIP.
pub fn parse_stem_list(text: &str) -> Vec<DhsRecord> {
    let lines: Vec<String> = text
        .lines()
        .map(normalize_spaces)
        .filter(|l| !l.is_empty())
        .collect();

    let mut by_cip: BTreeMap<String, String> = BTreeMap::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(m) = CIP_RE.captures(line).and_then(|c| c.get(1)) else {
            continue;
        };
        let cip = m.as_str().to_string();

        let mut title = normalize_spaces(&line[m.end()..]);
        if title.chars().count() < MIN_INLINE_TITLE {
            if let Some(next) = lines.get(i + 1) {
                title = next.clone();
            }
        }
        if is_noise(&title) {
            title.clear();
        }

        let existing = by_cip.entry(cip).or_default();
        if existing.is_empty() {
            *existing = title;
        }
    }

    by_cip
        .into_iter()
        .map(|(cip, title_from_pdf)| DhsRecord { cip, title_from_pdf })
        .collect()
}

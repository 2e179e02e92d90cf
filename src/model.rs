//! On-disk record shapes for every stage of the pipeline.

use serde::{Deserialize, Serialize};

pub const CIP_YEAR: u16 = 2020;
pub const CIP_VERSION: &str = "2020";
pub const STEM_SOURCE_DHS: &str = "DHS";

// ── NCES (definitional authority) ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NcesRecord {
    #[serde(default)]
    pub cip: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub illustrative_examples: Vec<String>,
    #[serde(default)]
    pub source_url: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub parse_warning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Raw CIP as NCES printed it, kept when `cip` was rewritten to canonical form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nces_display_cip: Option<String>,
}

impl NcesRecord {
    /// Count of non-empty {title, definition}.
    pub fn completeness(&self) -> u8 {
        u8::from(!self.title.trim().is_empty()) + u8::from(!self.definition.trim().is_empty())
    }

    pub fn is_complete(&self) -> bool {
        self.completeness() == 2
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NcesDataset {
    #[serde(default)]
    pub source: serde_json::Value,
    #[serde(default)]
    pub record_count: usize,
    #[serde(default)]
    pub records: Vec<NcesRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailUrls {
    pub count: usize,
    pub urls: Vec<String>,
}

// ── DHS (eligibility authority) ──

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhsRecord {
    #[serde(default)]
    pub cip: String,
    #[serde(default)]
    pub title_from_pdf: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DhsSource {
    pub publisher: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub pdf_file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DhsDataset {
    #[serde(default)]
    pub source: DhsSource,
    #[serde(default)]
    pub records: Vec<DhsRecord>,
    #[serde(default)]
    pub record_count: usize,
}

/// Provenance of a raw download (PDF or browse page).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchManifest {
    #[serde(default)]
    pub requested_url: String,
    #[serde(default)]
    pub final_url: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub fetched_utc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ── Overlay (reconciled) ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TitleSource {
    #[serde(rename = "NCES")]
    Nces,
    #[serde(rename = "DHS PDF (fallback)")]
    DhsFallback,
    #[serde(rename = "Unknown")]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayRecord {
    pub cip: String,
    pub cip_family: String,
    pub cip_year: u16,
    pub title: String,
    pub definition: String,
    pub action: String,
    #[serde(rename = "illustrative_examples")]
    pub illustrative_examples: Vec<String>,
    pub stem_eligible: bool,
    pub stem_source: String,
    pub nces_source_url: String,
    pub title_source: TitleSource,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub missing_in_nces_snapshot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayMeta {
    pub name: String,
    pub generated_utc: String,
    pub cip_version: String,
    pub nces_record_count: usize,
    #[serde(default)]
    pub nces_normalized_count: usize,
    pub dhs_stem_record_count: usize,
    pub overlay_record_count: usize,
    pub missing_stem_in_nces_snapshot: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DhsProvenance {
    pub publisher: String,
    pub final_url: String,
    pub requested_url: String,
    pub sha256: String,
    pub fetched_utc: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySources {
    pub nces: serde_json::Value,
    pub dhs: DhsProvenance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayDataset {
    pub meta: OverlayMeta,
    pub sources: OverlaySources,
    pub records: Vec<OverlayRecord>,
}

// ── Frontend index (public) ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub cip: String,
    pub cip_family: String,
    pub cip_year: u16,
    pub title: String,
    pub title_source: TitleSource,
    pub stem_eligible: bool,
    pub stem_source: String,
    pub has_definition: bool,
    pub has_illustrative_examples: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub generated_utc: String,
    pub source_overlay_file: String,
    pub record_count: usize,
    pub stem_true_count: usize,
    pub cip_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendIndex {
    pub meta: IndexMeta,
    pub records: Vec<IndexRecord>,
}

// ── Manifests ──

/// Integrity sidecar written next to every processed artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub file: String,
    pub sha256: String,
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_utc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stem_true_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_stem_in_nces_snapshot: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_overlay_sha256: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness_counts_title_and_definition() {
        let mut r = NcesRecord::default();
        assert_eq!(r.completeness(), 0);
        r.title = "Engineering".into();
        assert_eq!(r.completeness(), 1);
        r.definition = "   ".into();
        assert_eq!(r.completeness(), 1);
        r.definition = "A program that...".into();
        assert!(r.is_complete());
    }

    #[test]
    fn overlay_record_wire_names() {
        let r = OverlayRecord {
            cip: "27.0101".into(),
            cip_family: "27".into(),
            cip_year: CIP_YEAR,
            title: "Mathematics".into(),
            definition: String::new(),
            action: String::new(),
            illustrative_examples: vec![],
            stem_eligible: true,
            stem_source: STEM_SOURCE_DHS.into(),
            nces_source_url: String::new(),
            title_source: TitleSource::DhsFallback,
            missing_in_nces_snapshot: true,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["cipYear"], 2020);
        assert_eq!(v["stemEligible"], true);
        assert_eq!(v["titleSource"], "DHS PDF (fallback)");
        assert_eq!(v["missingInNcesSnapshot"], true);
        assert!(v.get("illustrative_examples").is_some());
    }

    #[test]
    fn orphan_flag_omitted_when_false() {
        let json = r#"{"cip":"14.0000","cipFamily":"14","cipYear":2020,"title":"Engineering",
            "definition":"d","action":"","illustrative_examples":[],"stemEligible":false,
            "stemSource":"","ncesSourceUrl":"","titleSource":"NCES"}"#;
        let r: OverlayRecord = serde_json::from_str(json).unwrap();
        assert!(!r.missing_in_nces_snapshot);
        let back = serde_json::to_value(&r).unwrap();
        assert!(back.get("missingInNcesSnapshot").is_none());
    }

    #[test]
    fn nces_record_tolerates_missing_fields() {
        let r: NcesRecord = serde_json::from_str(r#"{"cip":"14"}"#).unwrap();
        assert_eq!(r.cip, "14");
        assert!(r.illustrative_examples.is_empty());
        assert!(!r.parse_warning);
    }
}

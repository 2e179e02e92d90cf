//! Merge the NCES and DHS indexes into overlay records.

use tracing::warn;

use crate::authority::{DhsIndex, NcesIndex};
use crate::cip;
use crate::model::{OverlayRecord, TitleSource, CIP_YEAR, STEM_SOURCE_DHS};

#[derive(Debug)]
pub struct Reconciliation {
    /// Sorted by canonical CIP, one record per code.
    pub records: Vec<OverlayRecord>,
    /// DHS STEM codes with no NCES record in this snapshot.
    pub orphans: Vec<String>,
}

impl Reconciliation {
    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    pub fn stem_count(&self) -> usize {
        self.records.iter().filter(|r| r.stem_eligible).count()
    }
}

/// NCES is the base; DHS contributes the STEM flag, a fallback title, and
/// orphan records for codes NCES does not have.
pub fn reconcile(nces: &NcesIndex, dhs: &DhsIndex) -> Reconciliation {
    let mut records = Vec::with_capacity(nces.len() + dhs.stem.len());

    for (code, r) in &nces.by_cip {
        let nces_title = r.title.trim();
        let fallback = dhs.fallback_title(code);
        let (title, title_source) = match (nces_title.is_empty(), fallback) {
            (false, _) => (nces_title.to_string(), TitleSource::Nces),
            (true, Some(t)) => (t.to_string(), TitleSource::DhsFallback),
            (true, None) => (String::new(), TitleSource::Unknown),
        };
        let stem_eligible = dhs.is_stem(code);

        records.push(OverlayRecord {
            cip: code.clone(),
            cip_family: cip::family(code).to_string(),
            cip_year: CIP_YEAR,
            title,
            definition: r.definition.clone(),
            action: r.action.clone(),
            illustrative_examples: r.illustrative_examples.clone(),
            stem_eligible,
            stem_source: stem_source(stem_eligible),
            nces_source_url: r.source_url.clone(),
            title_source,
            missing_in_nces_snapshot: false,
        });
    }

    // BTreeSet iteration is already ascending.
    let orphans: Vec<String> = dhs
        .stem
        .iter()
        .filter(|c| !nces.contains(c))
        .cloned()
        .collect();

    for code in &orphans {
        let (title, title_source) = match dhs.fallback_title(code) {
            Some(t) => (t.to_string(), TitleSource::DhsFallback),
            None => (String::new(), TitleSource::Unknown),
        };
        records.push(OverlayRecord {
            cip: code.clone(),
            cip_family: cip::family(code).to_string(),
            cip_year: CIP_YEAR,
            title,
            definition: String::new(),
            action: String::new(),
            illustrative_examples: Vec::new(),
            stem_eligible: true,
            stem_source: stem_source(true),
            nces_source_url: String::new(),
            title_source,
            missing_in_nces_snapshot: true,
        });
    }

    records.sort_by(|a, b| a.cip.cmp(&b.cip));

    if !orphans.is_empty() {
        warn!(
            count = orphans.len(),
            sample = ?orphans.iter().take(10).collect::<Vec<_>>(),
            "DHS STEM codes missing from NCES snapshot"
        );
    }

    Reconciliation { records, orphans }
}

fn stem_source(eligible: bool) -> String {
    if eligible {
        STEM_SOURCE_DHS.to_string()
    } else {
        String::new()
    }
}

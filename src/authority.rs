//! Per-authority indexes keyed by canonical CIP.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::cip::canonicalize;
use crate::model::{DhsRecord, NcesDataset, NcesRecord};

/// NCES records keyed by canonical CIP, one record per code.
#[derive(Debug, Default)]
pub struct NcesIndex {
    pub by_cip: BTreeMap<String, NcesRecord>,
    /// Records whose canonical CIP differed from the raw value.
    pub normalized: usize,
}

impl NcesIndex {
    pub fn len(&self) -> usize {
        self.by_cip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_cip.is_empty()
    }

    pub fn contains(&self, cip: &str) -> bool {
        self.by_cip.contains_key(cip)
    }
}

/// Index NCES records by canonical CIP.
///
/// Records with an empty canonical CIP are dropped. On collision the record
/// with the higher completeness score wins; the earlier record wins ties.
/// Stored records carry their canonical CIP.
pub fn build_nces_index(records: &[NcesRecord]) -> NcesIndex {
    let mut index = NcesIndex::default();

    for r in records {
        let raw = r.cip.trim();
        let cip = canonicalize(raw);
        if cip.is_empty() {
            continue;
        }
        if cip != raw {
            index.normalized += 1;
        }

        let mut canon = r.clone();
        canon.cip = cip.clone();

        match index.by_cip.get(&cip) {
            Some(existing) if canon.completeness() <= existing.completeness() => {
                debug!(cip = %cip, "keeping earlier NCES record");
            }
            _ => {
                index.by_cip.insert(cip, canon);
            }
        }
    }

    index
}

/// DHS STEM membership plus the PDF title to fall back on.
#[derive(Debug, Default)]
pub struct DhsIndex {
    pub stem: BTreeSet<String>,
    pub titles: HashMap<String, String>,
}

impl DhsIndex {
    pub fn is_stem(&self, cip: &str) -> bool {
        self.stem.contains(cip)
    }

    pub fn fallback_title(&self, cip: &str) -> Option<&str> {
        self.titles.get(cip).map(String::as_str)
    }
}

/// Canonical STEM set plus the first non-empty title seen for each code.
pub fn build_dhs_index(records: &[DhsRecord]) -> DhsIndex {
    let mut index = DhsIndex::default();

    for r in records {
        let cip = canonicalize(&r.cip);
        if cip.is_empty() {
            continue;
        }
        let title = r.title_from_pdf.trim();
        if !title.is_empty() && !index.titles.contains_key(&cip) {
            index.titles.insert(cip.clone(), title.to_string());
        }
        index.stem.insert(cip);
    }

    index
}

/// Rewrite every NCES record to canonical CIP in place, keeping the raw
/// value in `nces_display_cip`, then dedup and sort. Duplicates resolve the
/// same way as in [`build_nces_index`].
///
/// Returns the number of records whose CIP changed.
pub fn normalize_nces_dataset(dataset: &mut NcesDataset) -> usize {
    let mut changed = 0;

    for r in &mut dataset.records {
        let raw = r.cip.trim().to_string();
        if raw.is_empty() {
            continue;
        }
        let canon = canonicalize(&raw);
        if !canon.is_empty() && canon != raw {
            if r.nces_display_cip.is_none() {
                r.nces_display_cip = Some(raw);
            }
            r.cip = canon;
            changed += 1;
        }
    }

    let mut dedup: BTreeMap<String, NcesRecord> = BTreeMap::new();
    for r in std::mem::take(&mut dataset.records) {
        let c = canonicalize(&r.cip);
        if c.is_empty() {
            continue;
        }
        match dedup.get(&c) {
            Some(existing) if r.completeness() <= existing.completeness() => {
                debug!(cip = %c, "dropping duplicate NCES record");
            }
            _ => {
                dedup.insert(c, r);
            }
        }
    }

    dataset.records = dedup.into_values().collect();
    dataset.record_count = dataset.records.len();
    changed
}

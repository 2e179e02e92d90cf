//! Overlay -> compact frontend index, safe to load whole in a browser.

use crate::cip;
use crate::error::{sample, PipelineError};
use crate::model::{
    FrontendIndex, IndexMeta, IndexRecord, OverlayDataset, OverlayRecord, CIP_VERSION,
};

pub const INDEX_NAME: &str = "CIP STEM Intelligence - Frontend Index";

pub fn project_record(r: &OverlayRecord, code: String) -> IndexRecord {
    IndexRecord {
        cip_family: cip::family(&code).to_string(),
        cip: code,
        cip_year: r.cip_year,
        title: r.title.trim().to_string(),
        title_source: r.title_source,
        stem_eligible: r.stem_eligible,
        stem_source: r.stem_source.clone(),
        has_definition: !r.definition.trim().is_empty(),
        has_illustrative_examples: !r.illustrative_examples.is_empty(),
    }
}

/// Project every overlay record, refusing to emit an index with a
/// non-canonical CIP or a STEM record without its source.
pub fn build_index(
    overlay: &OverlayDataset,
    source_overlay_file: &str,
    generated_utc: &str,
) -> Result<FrontendIndex, PipelineError> {
    let mut records = Vec::with_capacity(overlay.records.len());
    let mut bad_cip = Vec::new();
    let mut bad_stem_source = Vec::new();

    for r in &overlay.records {
        let code = cip::canonicalize(&r.cip);
        if !cip::is_canonical(&code) {
            bad_cip.push(r.cip.clone());
            continue;
        }
        if r.stem_eligible && r.stem_source.trim().is_empty() {
            bad_stem_source.push(code);
            continue;
        }
        records.push(project_record(r, code));
    }

    if !bad_cip.is_empty() {
        return Err(PipelineError::InvalidCipFormat {
            count: bad_cip.len(),
            sample: sample(&bad_cip),
        });
    }
    if !bad_stem_source.is_empty() {
        return Err(PipelineError::MissingStemSource {
            count: bad_stem_source.len(),
            sample: sample(&bad_stem_source),
        });
    }

    records.sort_by(|a, b| a.cip.cmp(&b.cip));
    let stem_true_count = records.iter().filter(|r| r.stem_eligible).count();
    let cip_version = if overlay.meta.cip_version.is_empty() {
        CIP_VERSION.to_string()
    } else {
        overlay.meta.cip_version.clone()
    };

    Ok(FrontendIndex {
        meta: IndexMeta {
            name: INDEX_NAME.to_string(),
            generated_utc: generated_utc.to_string(),
            source_overlay_file: source_overlay_file.to_string(),
            record_count: records.len(),
            stem_true_count,
            cip_version,
        },
        records,
    })
}

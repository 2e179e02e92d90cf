use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::artifact::{self, manifest_for, manifest_path, read_json, write_json};
use crate::authority::{build_dhs_index, build_nces_index};
use crate::config::Settings;
use crate::model::{
    DhsDataset, DhsProvenance, FetchManifest, NcesDataset, OverlayDataset, OverlayMeta,
    OverlaySources, CIP_VERSION,
};
use crate::reconcile::reconcile;

pub const OVERLAY_NAME: &str = "CIP STEM Intelligence Overlay";
pub const DHS_PUBLISHER: &str = "DHS/ICE";
const DHS_NOTE: &str = "DHS STEM Designated Degree Program List (latest pinned PDF)";

/// Index both authorities and merge them into one overlay document.
pub fn assemble(
    nces: &NcesDataset,
    dhs: &DhsDataset,
    dhs_fetch: &FetchManifest,
    generated_utc: &str,
) -> OverlayDataset {
    let nces_index = build_nces_index(&nces.records);
    let dhs_index = build_dhs_index(&dhs.records);
    let merged = reconcile(&nces_index, &dhs_index);

    OverlayDataset {
        meta: OverlayMeta {
            name: OVERLAY_NAME.to_string(),
            generated_utc: generated_utc.to_string(),
            cip_version: CIP_VERSION.to_string(),
            nces_record_count: nces_index.len(),
            nces_normalized_count: nces_index.normalized,
            dhs_stem_record_count: dhs_index.stem.len(),
            overlay_record_count: merged.records.len(),
            missing_stem_in_nces_snapshot: merged.orphan_count(),
        },
        sources: OverlaySources {
            nces: nces.source.clone(),
            dhs: DhsProvenance {
                publisher: DHS_PUBLISHER.to_string(),
                final_url: dhs_fetch.final_url.clone(),
                requested_url: dhs_fetch.requested_url.clone(),
                sha256: dhs_fetch.sha256.clone(),
                fetched_utc: dhs_fetch.fetched_utc.clone(),
                note: DHS_NOTE.to_string(),
            },
        },
        records: merged.records,
    }
}

/// Read both parsed authorities and merge them. Nothing is written.
pub fn load_overlay(settings: &Settings) -> Result<OverlayDataset> {
    let paths = &settings.paths;
    let nces: NcesDataset = read_json(&paths.nces_dataset(), "build-nces")?;
    let dhs: DhsDataset = read_json(&paths.dhs_dataset(), "parse-dhs")?;
    let dhs_fetch: FetchManifest = read_json(&paths.dhs_manifest(), "fetch-dhs")?;

    Ok(assemble(&nces, &dhs, &dhs_fetch, &Utc::now().to_rfc3339()))
}

/// Write the overlay and its manifest.
pub fn write_overlay(settings: &Settings, overlay: &OverlayDataset) -> Result<()> {
    let out = settings.paths.overlay();
    let bytes = write_json(&out, overlay)?;
    let mut manifest = manifest_for(&out, &bytes);
    manifest.generated_utc = Some(overlay.meta.generated_utc.clone());
    manifest.missing_stem_in_nces_snapshot = Some(overlay.meta.missing_stem_in_nces_snapshot);
    write_json(&manifest_path(&out), &manifest)?;

    info!(
        records = overlay.meta.overlay_record_count,
        normalized = overlay.meta.nces_normalized_count,
        orphans = overlay.meta.missing_stem_in_nces_snapshot,
        "overlay written"
    );
    println!(
        "Wrote: {} ({} records)",
        artifact::display_path(&out),
        overlay.meta.overlay_record_count
    );
    println!("SHA256: {}", manifest.sha256);
    println!(
        "Missing STEM codes in NCES snapshot: {}",
        overlay.meta.missing_stem_in_nces_snapshot
    );
    Ok(())
}

pub fn build_overlay(settings: &Settings) -> Result<OverlayDataset> {
    let overlay = load_overlay(settings)?;
    write_overlay(settings, &overlay)?;
    Ok(overlay)
}

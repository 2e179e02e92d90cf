use std::collections::BTreeSet;

use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::artifact::{display_path, manifest_for, manifest_path, read_json, write_json};
use crate::authority::normalize_nces_dataset;
use crate::cip::canonicalize;
use crate::config::Settings;
use crate::db::doc_id;
use crate::fetch::Fetcher;
use crate::model::{NcesDataset, NcesRecord, OverlayDataset};
use crate::parser::extract::links::cipid;
use crate::parser::extract::search::find_detail_url;
use crate::parser::{parse_detail, SectionLabels};

/// Failed codes quoted in the summary.
const FAILED_SAMPLE: usize = 25;

#[derive(Debug, Default)]
pub struct BackfillReport {
    /// Existing records rewritten to canonical CIP.
    pub normalized: usize,
    pub added: usize,
    /// Orphans already present once the dataset was normalized.
    pub skipped: usize,
    pub failed: Vec<String>,
}

enum Lookup {
    Found(NcesRecord),
    Failed(String),
}

/// Normalize the NCES dataset in place, then try to recover every overlay
/// orphan from the NCES search pages.
pub async fn backfill(
    settings: &Settings,
    conn: &Connection,
    fetcher: &Fetcher,
    labels: &SectionLabels,
) -> Result<BackfillReport> {
    let paths = &settings.paths;
    let overlay: OverlayDataset = read_json(&paths.overlay(), "overlay")?;
    let mut nces: NcesDataset = read_json(&paths.nces_dataset(), "build-nces")?;
    let loaded = nces.records.len();

    let mut report = BackfillReport {
        normalized: normalize_nces_dataset(&mut nces),
        ..Default::default()
    };
    if report.normalized > 0 {
        println!(
            "Normalized existing NCES records to canonical CIP: {} updated",
            report.normalized
        );
    } else {
        println!("NCES records already canonical. No normalization changes needed.");
    }

    let mut present: BTreeSet<String> =
        nces.records.iter().map(|r| canonicalize(&r.cip)).collect();
    let missing: BTreeSet<String> = overlay
        .records
        .iter()
        .filter(|r| r.missing_in_nces_snapshot)
        .map(|r| r.cip.clone())
        .collect();

    if missing.is_empty() {
        println!("No missing NCES records found. Nothing to backfill.");
        let changed = report.normalized > 0 || nces.records.len() != loaded;
        write_dataset(settings, &mut nces, changed)?;
        return Ok(report);
    }
    println!("Missing NCES records to backfill: {}", missing.len());

    for (i, code) in missing.iter().enumerate() {
        let target = canonicalize(code);
        if present.contains(&target) {
            report.skipped += 1;
            continue;
        }

        match lookup(settings, conn, fetcher, labels, code, &target).await? {
            Lookup::Found(record) => {
                present.insert(target);
                nces.records.push(record);
                report.added += 1;
            }
            Lookup::Failed(reason) => {
                warn!(cip = %code, reason = %reason, "backfill failed");
                report.failed.push(code.clone());
            }
        }

        if (i + 1) % 10 == 0 {
            info!("Backfill progress: {}/{}", i + 1, missing.len());
        }
    }

    write_dataset(settings, &mut nces, true)?;

    println!("Backfilled: {}", report.added);
    println!("Skipped (already existed in NCES by canonical CIP): {}", report.skipped);
    println!("Failed: {}", report.failed.len());
    if !report.failed.is_empty() {
        let shown: Vec<&str> = report
            .failed
            .iter()
            .take(FAILED_SAMPLE)
            .map(String::as_str)
            .collect();
        println!("Failed CIP codes (first {}): {:?}", FAILED_SAMPLE, shown);
    }
    Ok(report)
}

/// Search results -> detail page -> record, accepted only when the page is
/// for the same canonical code and carries a title and definition.
async fn lookup(
    settings: &Settings,
    conn: &Connection,
    fetcher: &Fetcher,
    labels: &SectionLabels,
    code: &str,
    target: &str,
) -> Result<Lookup> {
    let sources = &settings.sources;

    let search_url = sources.nces_search_url.replace("{cip}", code);
    let search = match fetcher.cached(conn, &doc_id::nces_search(code), &search_url).await {
        Ok(doc) => doc,
        Err(e) => return Ok(Lookup::Failed(e.to_string())),
    };
    let found = find_detail_url(
        &search.text(),
        code,
        &sources.nces_base_url,
        &sources.nces_year_id,
    );
    let Some(detail_url) = found else {
        return Ok(Lookup::Failed("no matching search result row".into()));
    };
    let Some(id) = cipid(&detail_url) else {
        return Ok(Lookup::Failed(format!("no cipid in {detail_url}")));
    };

    let detail = match fetcher.cached(conn, &doc_id::nces_detail(&id), &detail_url).await {
        Ok(doc) => doc,
        Err(e) => return Ok(Lookup::Failed(e.to_string())),
    };
    let mut record = parse_detail(&detail.text(), &detail_url, labels);

    let parsed_raw = record.cip.trim().to_string();
    if canonicalize(&parsed_raw) != target {
        return Ok(Lookup::Failed(format!("detail page is for {parsed_raw:?}")));
    }
    if !record.is_complete() {
        return Ok(Lookup::Failed("detail page missing title or definition".into()));
    }

    record.cip = target.to_string();
    record.nces_display_cip = Some(parsed_raw);
    Ok(Lookup::Found(record))
}

fn write_dataset(settings: &Settings, nces: &mut NcesDataset, changed: bool) -> Result<()> {
    if !changed {
        return Ok(());
    }
    nces.records.sort_by(|a, b| a.cip.cmp(&b.cip));
    nces.record_count = nces.records.len();

    let out = settings.paths.nces_dataset();
    let bytes = write_json(&out, &*nces)?;
    write_json(&manifest_path(&out), &manifest_for(&out, &bytes))?;
    println!("Wrote: {} ({} records)", display_path(&out), nces.record_count);
    Ok(())
}

use anyhow::{bail, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use serde_json::json;
use tracing::{info, warn};

use crate::artifact::{
    display_path, manifest_for, manifest_path, read_json, require, write_bytes, write_json,
};
use crate::config::Settings;
use crate::db::{self, doc_id};
use crate::fetch::Fetcher;
use crate::model::{DetailUrls, FetchManifest, NcesDataset, CIP_VERSION};
use crate::parser::extract::links::{cipid, extract_detail_urls};
use crate::parser::{invalid_cipid_record, parse_detail, SectionLabels};

pub const NCES_PUBLISHER: &str = "NCES (IPEDS CIP site)";
const BROWSE_NOTE: &str = "NCES CIP 2020 browse listing (y=56)";

pub fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

/// Download the CIP 2020 browse page and record where it came from.
pub async fn fetch_index(settings: &Settings, conn: &Connection, fetcher: &Fetcher) -> Result<()> {
    let paths = &settings.paths;
    let doc = fetcher
        .cached(conn, doc_id::NCES_BROWSE, &settings.sources.nces_browse_url)
        .await?;

    let html_path = paths.nces_browse_html();
    write_bytes(&html_path, &doc.body)?;
    let manifest = FetchManifest {
        requested_url: doc.url.clone(),
        final_url: doc.final_url.clone(),
        sha256: doc.sha256.clone(),
        bytes: doc.body.len() as u64,
        fetched_utc: doc.fetched_at.clone(),
        note: Some(BROWSE_NOTE.to_string()),
    };
    write_json(&paths.nces_browse_manifest(), &manifest)?;

    println!("Saved: {}", display_path(&html_path));
    println!("SHA256: {}", manifest.sha256);
    println!("Final URL: {}", manifest.final_url);
    Ok(())
}

/// Browse page -> sorted unique detail URLs, also queued in the cache DB.
pub fn extract_urls(settings: &Settings, conn: &Connection) -> Result<DetailUrls> {
    let html_path = settings.paths.nces_browse_html();
    require(&html_path, "fetch-nces-index")?;
    let html = String::from_utf8_lossy(&std::fs::read(&html_path)?).into_owned();

    let urls = extract_detail_urls(
        &html,
        &settings.sources.nces_base_url,
        &settings.sources.nces_year_id,
    );
    let doc = DetailUrls {
        count: urls.len(),
        urls,
    };

    let out = settings.paths.nces_detail_urls();
    write_json(&out, &doc)?;

    let queue: Vec<(String, Option<String>)> =
        doc.urls.iter().map(|u| (u.clone(), cipid(u))).collect();
    let queued = db::insert_detail_urls(conn, &queue)?;

    info!(urls = doc.count, queued, "detail URLs extracted");
    println!("Wrote: {} ({} URLs)", display_path(&out), doc.count);
    Ok(doc)
}

/// Fetch and parse every detail page into the NCES dataset.
pub async fn build_dataset(
    settings: &Settings,
    conn: &Connection,
    fetcher: &Fetcher,
    labels: &SectionLabels,
) -> Result<NcesDataset> {
    let paths = &settings.paths;
    let list: DetailUrls = read_json(&paths.nces_detail_urls(), "extract-nces-urls")?;
    if list.urls.is_empty() {
        bail!(
            "No NCES detail URLs in {}; re-run `cip_stem extract-nces-urls`",
            display_path(&paths.nces_detail_urls())
        );
    }

    let pb = progress_bar(list.urls.len())?;
    let mut records = Vec::with_capacity(list.urls.len());
    let mut warnings = 0usize;

    for url in &list.urls {
        let record = match cipid(url) {
            Some(id) => {
                let doc = fetcher.cached(conn, &doc_id::nces_detail(&id), url).await?;
                parse_detail(&doc.text(), url, labels)
            }
            None => {
                warn!(url = %url, "detail URL without numeric cipid");
                invalid_cipid_record(url)
            }
        };
        db::mark_visited(conn, url)?;

        if record.parse_warning {
            warnings += 1;
        }
        records.push(record);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let dataset = NcesDataset {
        source: json!({
            "publisher": NCES_PUBLISHER,
            "cip_version": CIP_VERSION,
            "browse_url": settings.sources.nces_browse_url,
            "generated_utc": Utc::now().to_rfc3339(),
            "note": "Scraped cipdetail pages referenced from the NCES CIP 2020 browse page (y=56).",
        }),
        record_count: records.len(),
        records,
    };

    let out = paths.nces_dataset();
    let bytes = write_json(&out, &dataset)?;
    let manifest = manifest_for(&out, &bytes);
    write_json(&manifest_path(&out), &manifest)?;

    if warnings > 0 {
        warn!(warnings, "detail pages parsed with missing fields");
    }
    println!("Wrote: {} ({} records)", display_path(&out), dataset.record_count);
    println!("SHA256: {}", manifest.sha256);
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchSettings;
    use crate::db::CachedDoc;

    fn settings(dir: &std::path::Path) -> Settings {
        let mut s = Settings::default();
        s.paths.raw_dir = dir.join("raw");
        s.paths.processed_dir = dir.join("processed");
        s
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    fn seed(conn: &Connection, id: &str, url: &str, fixture: &str) {
        let body = std::fs::read(format!("tests/fixtures/{fixture}")).unwrap();
        db::save_document(
            conn,
            &CachedDoc {
                doc_id: id.to_string(),
                url: url.to_string(),
                final_url: url.to_string(),
                status: 200,
                sha256: crate::artifact::sha256_hex(&body),
                body,
                fetched_at: "2026-01-01T00:00:00+00:00".into(),
            },
        )
        .unwrap();
    }

    #[test]
    fn extract_writes_list_and_queue() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let conn = memory_db();
        std::fs::create_dir_all(s.paths.nces_raw()).unwrap();
        std::fs::copy("tests/fixtures/nces_browse.html", s.paths.nces_browse_html()).unwrap();

        let doc = extract_urls(&s, &conn).unwrap();
        assert_eq!(doc.count, 4);
        let back: DetailUrls = read_json(&s.paths.nces_detail_urls(), "extract-nces-urls").unwrap();
        assert_eq!(back.urls, doc.urls);
        assert_eq!(db::get_stats(&conn).unwrap().unvisited, 4);
    }

    #[test]
    fn extract_without_browse_page_names_stage() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_urls(&settings(dir.path()), &memory_db()).unwrap_err();
        assert!(err.to_string().contains("cip_stem fetch-nces-index"));
    }

    #[tokio::test]
    async fn build_from_cached_pages() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let conn = memory_db();

        let good = "https://nces.ed.gov/ipeds/cipcode/cipdetail.aspx?y=56&cipid=90001";
        let family = "https://nces.ed.gov/ipeds/cipcode/cipdetail.aspx?y=56&cipid=90000";
        let bad = "https://nces.ed.gov/ipeds/cipcode/cipdetail.aspx?y=56&cipid=x";
        seed(&conn, &doc_id::nces_detail("90001"), good, "nces_detail_140903.html");
        seed(&conn, &doc_id::nces_detail("90000"), family, "nces_detail_270000.html");
        write_json(
            &s.paths.nces_detail_urls(),
            &DetailUrls {
                count: 3,
                urls: vec![good.into(), family.into(), bad.into()],
            },
        )
        .unwrap();

        let fetcher = Fetcher::new(&FetchSettings::default()).unwrap();
        let ds = build_dataset(&s, &conn, &fetcher, &SectionLabels::default())
            .await
            .unwrap();

        assert_eq!(ds.record_count, 3);
        assert_eq!(ds.records[0].cip, "14.0903");
        assert_eq!(ds.records[1].cip, "27");
        assert_eq!(ds.records[2].error.as_deref(), Some("invalid_cipid_in_url"));
        assert_eq!(ds.source["publisher"], NCES_PUBLISHER);
        assert!(manifest_path(&s.paths.nces_dataset()).exists());
    }

    #[tokio::test]
    async fn empty_url_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        write_json(&s.paths.nces_detail_urls(), &DetailUrls { count: 0, urls: Vec::new() }).unwrap();

        let fetcher = Fetcher::new(&FetchSettings::default()).unwrap();
        let res = build_dataset(&s, &memory_db(), &fetcher, &SectionLabels::default()).await;
        assert!(res.is_err());
    }
}

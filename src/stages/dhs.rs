use std::fs;
use std::process::Command;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::artifact::{display_path, require, sha256_file, write_bytes, write_json};
use crate::config::Settings;
use crate::db::{self, doc_id};
use crate::error::PipelineError;
use crate::fetch::Fetcher;
use crate::model::{DhsDataset, DhsSource, FetchManifest};
use crate::parser::extract::dhs::parse_stem_list;

use super::overlay::DHS_PUBLISHER;

const LIST_KIND: &str = "stem_designated_degree_program_list";

/// Download the DHS STEM list PDF. `refresh` drops the cached copy first.
pub async fn fetch_pdf(
    settings: &Settings,
    conn: &Connection,
    fetcher: &Fetcher,
    refresh: bool,
) -> Result<FetchManifest> {
    let paths = &settings.paths;
    if refresh {
        db::clear_documents(conn, Some(doc_id::DHS_PDF))?;
    }
    let doc = fetcher
        .cached(conn, doc_id::DHS_PDF, &settings.sources.dhs_pdf_url)
        .await?;

    let pdf_path = paths.dhs_pdf();
    let unchanged = pdf_path.exists() && sha256_file(&pdf_path)? == doc.sha256;
    write_bytes(&pdf_path, &doc.body)?;

    // The text layer belongs to the previous PDF.
    let text_path = paths.dhs_text();
    if !unchanged && text_path.exists() {
        fs::remove_file(&text_path)
            .with_context(|| format!("Failed to remove {}", text_path.display()))?;
    }

    let manifest = FetchManifest {
        requested_url: doc.url.clone(),
        final_url: doc.final_url.clone(),
        sha256: doc.sha256.clone(),
        bytes: doc.body.len() as u64,
        fetched_utc: doc.fetched_at.clone(),
        note: None,
    };
    write_json(&paths.dhs_manifest(), &manifest)?;

    println!("Saved: {}", display_path(&pdf_path));
    println!("SHA256: {}", manifest.sha256);
    println!("Final URL: {}", manifest.final_url);
    Ok(manifest)
}

/// Text layer of the DHS PDF. A `.txt` next to the PDF is used as-is;
/// otherwise the configured extractor runs and its output is kept there.
pub fn pdf_text(settings: &Settings) -> Result<String> {
    let paths = &settings.paths;
    let text_path = paths.dhs_text();
    if text_path.exists() {
        debug!(path = %text_path.display(), "using extracted PDF text");
        return fs::read_to_string(&text_path)
            .with_context(|| format!("Failed to read {}", text_path.display()));
    }

    let pdf_path = paths.dhs_pdf();
    require(&pdf_path, "fetch-dhs")?;

    let pdf_arg = pdf_path.to_string_lossy().into_owned();
    let argv: Vec<String> = settings
        .sources
        .pdf_text_command
        .iter()
        .map(|a| a.replace("{pdf}", &pdf_arg))
        .collect();
    let Some((program, args)) = argv.split_first() else {
        return Err(PipelineError::PdfText {
            path: pdf_path,
            reason: "no PDF text command configured".into(),
        }
        .into());
    };

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| PipelineError::PdfText {
            path: pdf_path.clone(),
            reason: format!("{program}: {e}"),
        })?;
    if !output.status.success() {
        return Err(PipelineError::PdfText {
            path: pdf_path,
            reason: format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
        .into());
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    write_bytes(&text_path, text.as_bytes())?;
    Ok(text)
}

pub fn parse(settings: &Settings) -> Result<DhsDataset> {
    let text = pdf_text(settings)?;
    let records = parse_stem_list(&text);

    let dataset = DhsDataset {
        source: DhsSource {
            publisher: DHS_PUBLISHER.to_string(),
            kind: LIST_KIND.to_string(),
            pdf_file: display_path(&settings.paths.dhs_pdf()),
        },
        record_count: records.len(),
        records,
    };

    let out = settings.paths.dhs_dataset();
    write_json(&out, &dataset)?;

    let untitled = dataset
        .records
        .iter()
        .filter(|r| r.title_from_pdf.is_empty())
        .count();
    info!(records = dataset.record_count, untitled, "DHS list parsed");
    println!("Wrote: {} ({} records)", display_path(&out), dataset.record_count);
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(dir: &std::path::Path) -> Settings {
        let mut s = Settings::default();
        s.paths.raw_dir = dir.join("raw");
        s.paths.processed_dir = dir.join("processed");
        s
    }

    #[test]
    fn parse_from_extracted_text() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        fs::create_dir_all(s.paths.dhs_raw()).unwrap();
        fs::copy("tests/fixtures/dhs_stem_list.txt", s.paths.dhs_text()).unwrap();

        let ds = parse(&s).unwrap();
        assert_eq!(ds.record_count, 7);
        assert_eq!(ds.source.kind, LIST_KIND);

        let v: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(s.paths.dhs_dataset()).unwrap()).unwrap();
        assert_eq!(v["source"]["type"], LIST_KIND);
        assert_eq!(v["source"]["publisher"], "DHS/ICE");
        assert_eq!(v["records"][0]["cip"], "01.0308");
    }

    #[test]
    fn missing_pdf_names_fetch_stage() {
        let dir = tempfile::tempdir().unwrap();
        let err = pdf_text(&settings(dir.path())).unwrap_err();
        assert!(err.to_string().contains("cip_stem fetch-dhs"));
    }

    #[test]
    fn extractor_failure_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        write_bytes(&s.paths.dhs_pdf(), b"%PDF-1.4").unwrap();
        s.sources.pdf_text_command = vec!["cip-stem-no-such-extractor".into(), "{pdf}".into()];

        let err = pdf_text(&s).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::PdfText { .. })
        ));
    }
}

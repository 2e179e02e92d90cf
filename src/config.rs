//! Runtime settings: built-in defaults, then an optional `cip_stem.toml`,
//! then `CIP_*` environment variables (`__` separates nested keys, e.g.
//! `CIP_THRESHOLDS__MIN_STEM_ELIGIBLE=120`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "cip_stem.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: Paths,
    pub sources: Sources,
    pub fetch: FetchSettings,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub publish_dir: PathBuf,
    pub cache_db: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Paths {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            publish_dir: PathBuf::from("docs/data/processed"),
            cache_db: PathBuf::from("data/raw/cache.sqlite"),
        }
    }
}

impl Paths {
    pub fn nces_raw(&self) -> PathBuf {
        self.raw_dir.join("nces")
    }

    pub fn dhs_raw(&self) -> PathBuf {
        self.raw_dir.join("dhs")
    }

    pub fn nces_browse_html(&self) -> PathBuf {
        self.nces_raw().join("nces_cip2020_browse.html")
    }

    pub fn nces_browse_manifest(&self) -> PathBuf {
        self.nces_raw().join("nces_cip2020_browse.manifest.json")
    }

    pub fn nces_detail_urls(&self) -> PathBuf {
        self.nces_raw().join("nces_cip2020_detail_urls.json")
    }

    pub fn dhs_pdf(&self) -> PathBuf {
        self.dhs_raw().join("stem-list-latest.pdf")
    }

    /// Text layer of the DHS PDF. Used as-is when present.
    pub fn dhs_text(&self) -> PathBuf {
        self.dhs_raw().join("stem-list-latest.txt")
    }

    pub fn dhs_manifest(&self) -> PathBuf {
        self.dhs_raw().join("stem-list-latest.manifest.json")
    }

    pub fn nces_dataset(&self) -> PathBuf {
        self.processed_dir.join("nces_cip2020.json")
    }

    pub fn dhs_dataset(&self) -> PathBuf {
        self.processed_dir.join("stem_dhs_latest.json")
    }

    pub fn overlay(&self) -> PathBuf {
        self.processed_dir.join("cip_stem_overlay_latest.json")
    }

    pub fn index(&self) -> PathBuf {
        self.processed_dir.join("cip_stem_index.json")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Sources {
    pub nces_base_url: String,
    pub nces_browse_url: String,
    /// `{cip}` is replaced with the code being searched.
    pub nces_search_url: String,
    /// CIP edition id used by the NCES site (`y=56` is CIP 2020).
    pub nces_year_id: String,
    pub dhs_pdf_url: String,
    /// Command that prints the PDF's text layer to stdout. `{pdf}` is
    /// replaced with the PDF path.
    pub pdf_text_command: Vec<String>,
}

impl Default for Sources {
    fn default() -> Self {
        Sources {
            nces_base_url: "https://nces.ed.gov/ipeds/cipcode/".into(),
            nces_browse_url: "https://nces.ed.gov/ipeds/cipcode/browse.aspx?y=56".into(),
            nces_search_url: "https://nces.ed.gov/ipeds/cipcode/searchresults.aspx?y=56&aw={cip}&sw=1,2,3&ct=1,2,3&ca=1,2,5,3,4".into(),
            nces_year_id: "56".into(),
            dhs_pdf_url: "https://www.ice.gov/doclib/sevis/pdf/stemList2024.pdf".into(),
            pdf_text_command: vec![
                "pdftotext".into(),
                "-layout".into(),
                "{pdf}".into(),
                "-".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub throttle_ms: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            user_agent: "CIP-STEM-INTELLIGENCE (open-source) - educational use".into(),
            timeout_secs: 60,
            throttle_ms: 100,
            max_retries: 3,
            base_backoff_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_nces_records: usize,
    pub max_nces_incomplete: usize,
    pub min_dhs_records: usize,
    pub min_overlay_records: usize,
    pub min_stem_eligible: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            min_nces_records: 1,
            max_nces_incomplete: 50,
            min_dhs_records: 1,
            min_overlay_records: 1,
            min_stem_eligible: 100,
        }
    }
}

/// Load settings. An explicit `path` must exist; the default file is optional.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let file = match path {
        Some(p) => File::from(p).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let settings = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("CIP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("Failed to read configuration")?
        .try_deserialize::<Settings>()
        .context("Invalid configuration")?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_layout() {
        let s = Settings::default();
        assert_eq!(
            s.paths.overlay(),
            PathBuf::from("data/processed/cip_stem_overlay_latest.json")
        );
        assert_eq!(s.paths.index(), PathBuf::from("data/processed/cip_stem_index.json"));
        assert_eq!(s.thresholds.min_stem_eligible, 100);
        assert_eq!(s.thresholds.max_nces_incomplete, 50);
        assert!(s.sources.nces_search_url.contains("{cip}"));
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cip_stem.toml");
        std::fs::write(
            &path,
            "[thresholds]\nmin_stem_eligible = 5\n\n[paths]\nprocessed_dir = \"out\"\n",
        )
        .unwrap();

        let s = load(Some(&path)).unwrap();
        assert_eq!(s.thresholds.min_stem_eligible, 5);
        assert_eq!(s.thresholds.max_nces_incomplete, 50);
        assert_eq!(s.paths.index(), PathBuf::from("out/cip_stem_index.json"));
        assert_eq!(s.paths.raw_dir, PathBuf::from("data/raw"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(load(Some(Path::new("/nonexistent/cip_stem.toml"))).is_err());
    }
}

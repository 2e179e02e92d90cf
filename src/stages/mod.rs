//! Pipeline stages. Each reads complete artifacts from disk and writes
//! complete artifacts back; only the fetch stages touch the network.

pub mod backfill;
pub mod check;
pub mod dhs;
pub mod nces;
pub mod overlay;
pub mod publish;

use anyhow::Result;

use crate::config::Settings;

/// Offline rebuild from already-parsed sources: overlay, validation,
/// frontend index, publish. Stops at the first failing stage. The overlay is
/// checked before it is written, so a rejected merge leaves the previous one
/// in place.
pub fn run_offline(settings: &Settings) -> Result<()> {
    let merged = overlay::load_overlay(settings)?;
    check::check_overlay(settings, &merged)?;
    overlay::write_overlay(settings, &merged)?;
    publish::build_frontend_index(settings)?;
    publish::publish(settings)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::write_json;
    use crate::error::PipelineError;
    use crate::model::{DhsDataset, DhsRecord, FetchManifest, NcesDataset, NcesRecord};

    fn settings(dir: &std::path::Path, min_stem: usize) -> Settings {
        let mut s = Settings::default();
        s.paths.raw_dir = dir.join("raw");
        s.paths.processed_dir = dir.join("processed");
        s.paths.publish_dir = dir.join("docs");
        s.thresholds.min_stem_eligible = min_stem;
        s
    }

    fn seed_sources(s: &Settings) {
        let nces = NcesDataset {
            records: vec![NcesRecord {
                cip: "14".into(),
                title: "Engineering".into(),
                definition: "Instructional programs that prepare individuals...".into(),
                ..Default::default()
            }],
            record_count: 1,
            ..Default::default()
        };
        let dhs = DhsDataset {
            records: vec![
                DhsRecord {
                    cip: "14.0000".into(),
                    title_from_pdf: "Engineering, General".into(),
                },
                DhsRecord {
                    cip: "27.0101".into(),
                    title_from_pdf: "Mathematics".into(),
                },
            ],
            record_count: 2,
            ..Default::default()
        };
        write_json(&s.paths.nces_dataset(), &nces).unwrap();
        write_json(&s.paths.dhs_dataset(), &dhs).unwrap();
        write_json(&s.paths.dhs_manifest(), &FetchManifest::default()).unwrap();
    }

    #[test]
    fn rejected_merge_keeps_previous_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path(), 2);
        seed_sources(&s);
        run_offline(&s).unwrap();
        let before = std::fs::read(s.paths.overlay()).unwrap();

        let strict = settings(dir.path(), 100);
        assert!(run_offline(&strict).is_err());
        assert_eq!(std::fs::read(strict.paths.overlay()).unwrap(), before);
    }

    #[test]
    fn end_to_end_publishes_index() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path(), 2);
        seed_sources(&s);

        run_offline(&s).unwrap();

        let index: crate::model::FrontendIndex =
            crate::artifact::read_json(&s.paths.publish_dir.join("cip_stem_index.json"), "publish")
                .unwrap();
        let cips: Vec<&str> = index.records.iter().map(|r| r.cip.as_str()).collect();
        assert_eq!(cips, vec!["14.0000", "27.0101"]);
        assert_eq!(index.meta.stem_true_count, 2);
        assert!(index.records.iter().all(|r| r.stem_source == "DHS"));
        assert!(!index.records[1].has_definition);
    }

    #[test]
    fn stem_threshold_stops_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path(), 100);
        seed_sources(&s);

        let err = run_offline(&s).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::BelowThreshold { count: 2, min: 100, .. })
        ));
        assert!(!s.paths.overlay().exists());
        assert!(!s.paths.index().exists());
    }
}

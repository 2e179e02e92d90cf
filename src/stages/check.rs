use anyhow::Result;

use crate::artifact::read_json;
use crate::config::Settings;
use crate::model::{DhsDataset, NcesDataset, OverlayDataset};
use crate::validate::{validate, CipRecord, Rules, ValidationReport};

fn check<R: CipRecord>(records: &[R], rules: &Rules) -> Result<ValidationReport> {
    let report = validate(records, rules);
    report.print(rules);
    report.ensure(rules)?;
    Ok(report)
}

pub fn validate_nces(settings: &Settings) -> Result<ValidationReport> {
    let dataset: NcesDataset = read_json(&settings.paths.nces_dataset(), "build-nces")?;
    check(&dataset.records, &Rules::nces(&settings.thresholds))
}

pub fn validate_dhs(settings: &Settings) -> Result<ValidationReport> {
    let dataset: DhsDataset = read_json(&settings.paths.dhs_dataset(), "parse-dhs")?;
    check(&dataset.records, &Rules::dhs(&settings.thresholds))
}

pub fn validate_overlay(settings: &Settings) -> Result<ValidationReport> {
    let overlay: OverlayDataset = read_json(&settings.paths.overlay(), "overlay")?;
    check_overlay(settings, &overlay)
}

/// Overlay rules against a dataset that may not be on disk yet.
pub fn check_overlay(settings: &Settings, overlay: &OverlayDataset) -> Result<ValidationReport> {
    check(&overlay.records, &Rules::overlay(&settings.thresholds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::write_json;
    use crate::error::PipelineError;
    use crate::model::DhsRecord;

    #[test]
    fn dhs_dataset_with_rollup_code_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Settings::default();
        s.paths.processed_dir = dir.path().to_path_buf();

        let dataset = DhsDataset {
            records: vec![
                DhsRecord {
                    cip: "14.0903".into(),
                    title_from_pdf: String::new(),
                },
                DhsRecord {
                    cip: "14.09".into(),
                    title_from_pdf: String::new(),
                },
            ],
            record_count: 2,
            ..Default::default()
        };
        write_json(&s.paths.dhs_dataset(), &dataset).unwrap();

        let err = validate_dhs(&s).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidCipFormat { count: 1, .. })
        ));
    }

    #[test]
    fn empty_nces_dataset_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = Settings::default();
        s.paths.processed_dir = dir.path().to_path_buf();
        write_json(&s.paths.nces_dataset(), &NcesDataset::default()).unwrap();

        let err = validate_nces(&s).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::BelowThreshold { count: 0, .. })
        ));
    }
}

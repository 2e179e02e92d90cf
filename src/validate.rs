//! Dataset validation rules shared by every stage.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::cip;
use crate::config::Thresholds;
use crate::error::{sample, PipelineError};
use crate::model::{DhsRecord, NcesRecord, OverlayRecord};

/// Uniform view over records from any stage.
pub trait CipRecord {
    fn cip(&self) -> &str;

    fn stem_eligible(&self) -> bool {
        false
    }

    fn stem_source(&self) -> &str {
        ""
    }

    fn is_orphan(&self) -> bool {
        false
    }

    /// Missing title or definition.
    fn is_incomplete(&self) -> bool {
        false
    }

    fn parse_warning(&self) -> bool {
        false
    }
}

impl CipRecord for NcesRecord {
    fn cip(&self) -> &str {
        &self.cip
    }

    fn is_incomplete(&self) -> bool {
        !self.is_complete()
    }

    fn parse_warning(&self) -> bool {
        self.parse_warning
    }
}

impl CipRecord for DhsRecord {
    fn cip(&self) -> &str {
        &self.cip
    }
}

impl CipRecord for OverlayRecord {
    fn cip(&self) -> &str {
        &self.cip
    }

    fn stem_eligible(&self) -> bool {
        self.stem_eligible
    }

    fn stem_source(&self) -> &str {
        &self.stem_source
    }

    fn is_orphan(&self) -> bool {
        self.missing_in_nces_snapshot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipFormat {
    /// `FF.SSDD` only.
    Canonical,
    /// `FF`, `FF.SS` or `FF.SSDD`, as NCES prints them.
    AnyLevel,
}

#[derive(Debug, Clone)]
pub struct Rules {
    pub name: &'static str,
    pub format: CipFormat,
    pub min_records: usize,
    pub min_stem_eligible: Option<usize>,
    pub require_unique: bool,
    pub require_stem_source: bool,
    pub max_incomplete: Option<usize>,
}

impl Rules {
    pub fn nces(t: &Thresholds) -> Self {
        Rules {
            name: "NCES CIP 2020",
            format: CipFormat::AnyLevel,
            min_records: t.min_nces_records,
            min_stem_eligible: None,
            require_unique: false,
            require_stem_source: false,
            max_incomplete: Some(t.max_nces_incomplete),
        }
    }

    pub fn dhs(t: &Thresholds) -> Self {
        Rules {
            name: "DHS STEM list",
            format: CipFormat::Canonical,
            min_records: t.min_dhs_records,
            min_stem_eligible: None,
            require_unique: true,
            require_stem_source: false,
            max_incomplete: None,
        }
    }

    pub fn overlay(t: &Thresholds) -> Self {
        Rules {
            name: "Overlay",
            format: CipFormat::Canonical,
            min_records: t.min_overlay_records,
            min_stem_eligible: Some(t.min_stem_eligible),
            require_unique: true,
            require_stem_source: true,
            max_incomplete: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub total: usize,
    pub stem_eligible: usize,
    pub bad_format: Vec<String>,
    pub duplicates: Vec<String>,
    pub missing_stem_source: Vec<String>,
    pub orphans: usize,
    pub incomplete: usize,
    pub parse_warnings: usize,
}

/// Collect findings. Nothing here fails; see [`ValidationReport::ensure`].
pub fn validate<R: CipRecord>(records: &[R], rules: &Rules) -> ValidationReport {
    let mut report = ValidationReport {
        total: records.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();

    for r in records {
        let code = r.cip().trim();
        let well_formed = match rules.format {
            CipFormat::Canonical => cip::is_canonical(code),
            CipFormat::AnyLevel => cip::is_cip_shaped(code),
        };
        if !well_formed {
            report.bad_format.push(code.to_string());
        }
        if !seen.insert(code) {
            report.duplicates.push(code.to_string());
        }
        if r.stem_eligible() {
            report.stem_eligible += 1;
            if r.stem_source().trim().is_empty() {
                report.missing_stem_source.push(code.to_string());
            }
        }
        if r.is_orphan() {
            report.orphans += 1;
        }
        if r.is_incomplete() {
            report.incomplete += 1;
        }
        if r.parse_warning() {
            report.parse_warnings += 1;
        }
    }

    report
}

impl ValidationReport {
    /// Turn fatal findings into an error. Orphans and parse warnings are
    /// reported only.
    pub fn ensure(&self, rules: &Rules) -> Result<(), PipelineError> {
        if self.total == 0 || self.total < rules.min_records {
            return Err(PipelineError::BelowThreshold {
                what: "record count",
                count: self.total,
                min: rules.min_records.max(1),
            });
        }
        if !self.bad_format.is_empty() {
            return Err(PipelineError::InvalidCipFormat {
                count: self.bad_format.len(),
                sample: sample(&self.bad_format),
            });
        }
        if rules.require_unique && !self.duplicates.is_empty() {
            return Err(PipelineError::DuplicateCip {
                count: self.duplicates.len(),
                sample: sample(&self.duplicates),
            });
        }
        if rules.require_stem_source && !self.missing_stem_source.is_empty() {
            return Err(PipelineError::MissingStemSource {
                count: self.missing_stem_source.len(),
                sample: sample(&self.missing_stem_source),
            });
        }
        if let Some(max) = rules.max_incomplete {
            if self.incomplete > max {
                return Err(PipelineError::TooManyIncomplete {
                    count: self.incomplete,
                    max,
                });
            }
        }
        if let Some(min) = rules.min_stem_eligible {
            if self.stem_eligible < min {
                return Err(PipelineError::BelowThreshold {
                    what: "STEM-eligible count",
                    count: self.stem_eligible,
                    min,
                });
            }
        }
        Ok(())
    }

    pub fn print(&self, rules: &Rules) {
        println!("{} validation summary", rules.name);
        println!("- Total records: {}", self.total);
        println!("- Bad CIP format: {}", self.bad_format.len());
        if rules.require_unique {
            println!("- Duplicate CIP codes: {}", self.duplicates.len());
        }
        if rules.require_stem_source || rules.min_stem_eligible.is_some() {
            println!("- STEM-eligible (true): {}", self.stem_eligible);
            println!("- STEM codes missing in NCES snapshot: {}", self.orphans);
        }
        if rules.max_incomplete.is_some() {
            println!("- Missing title/definition: {}", self.incomplete);
            println!("- Parse warnings flagged: {}", self.parse_warnings);
        }

        info!(
            dataset = rules.name,
            total = self.total,
            bad_format = self.bad_format.len(),
            duplicates = self.duplicates.len(),
            stem_eligible = self.stem_eligible,
            orphans = self.orphans,
            "validation summary"
        );
        if self.orphans > 0 {
            warn!(
                orphans = self.orphans,
                "some DHS STEM codes are missing from the NCES snapshot; run `cip_stem backfill`"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TitleSource, CIP_YEAR};

    fn thresholds() -> Thresholds {
        Thresholds {
            min_stem_eligible: 2,
            ..Thresholds::default()
        }
    }

    fn overlay(cip: &str, eligible: bool, source: &str) -> OverlayRecord {
        OverlayRecord {
            cip: cip.into(),
            cip_family: cip.split('.').next().unwrap_or("").into(),
            cip_year: CIP_YEAR,
            title: "t".into(),
            definition: "d".into(),
            action: String::new(),
            illustrative_examples: vec![],
            stem_eligible: eligible,
            stem_source: source.into(),
            nces_source_url: String::new(),
            title_source: TitleSource::Nces,
            missing_in_nces_snapshot: false,
        }
    }

    #[test]
    fn rollup_code_is_a_format_violation() {
        let rules = Rules::overlay(&thresholds());
        let records = vec![overlay("14.09", true, "DHS"), overlay("27.0101", true, "DHS")];
        let report = validate(&records, &rules);
        assert_eq!(report.bad_format, vec!["14.09"]);
        assert!(matches!(
            report.ensure(&rules),
            Err(PipelineError::InvalidCipFormat { count: 1, .. })
        ));
    }

    #[test]
    fn empty_dataset_is_a_cardinality_error() {
        let rules = Rules::overlay(&thresholds());
        let records: Vec<OverlayRecord> = vec![];
        let report = validate(&records, &rules);
        assert!(matches!(
            report.ensure(&rules),
            Err(PipelineError::BelowThreshold { count: 0, .. })
        ));
    }

    #[test]
    fn low_stem_count_is_fatal() {
        let rules = Rules::overlay(&thresholds());
        let records = vec![overlay("14.0900", true, "DHS"), overlay("52.0201", false, "")];
        let err = validate(&records, &rules).ensure(&rules).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::BelowThreshold { what: "STEM-eligible count", count: 1, min: 2 }
        ));
    }

    #[test]
    fn eligible_without_source_is_fatal() {
        let rules = Rules::overlay(&thresholds());
        let records = vec![overlay("14.0900", true, ""), overlay("27.0101", true, "DHS")];
        let err = validate(&records, &rules).ensure(&rules).unwrap_err();
        assert!(matches!(err, PipelineError::MissingStemSource { count: 1, .. }));
    }

    #[test]
    fn duplicates_are_fatal() {
        let rules = Rules::overlay(&thresholds());
        let records = vec![
            overlay("14.0900", true, "DHS"),
            overlay("14.0900", true, "DHS"),
            overlay("27.0101", true, "DHS"),
        ];
        let err = validate(&records, &rules).ensure(&rules).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateCip { count: 1, .. }));
    }

    #[test]
    fn orphans_reported_not_fatal() {
        let rules = Rules::overlay(&thresholds());
        let mut orphan = overlay("27.0101", true, "DHS");
        orphan.missing_in_nces_snapshot = true;
        let records = vec![overlay("14.0900", true, "DHS"), orphan];
        let report = validate(&records, &rules);
        assert_eq!(report.orphans, 1);
        assert!(report.ensure(&rules).is_ok());
    }

    #[test]
    fn nces_accepts_rollups_but_caps_incomplete() {
        let t = Thresholds {
            max_nces_incomplete: 1,
            ..Thresholds::default()
        };
        let rules = Rules::nces(&t);
        let full = |cip: &str| NcesRecord {
            cip: cip.into(),
            title: "t".into(),
            definition: "d".into(),
            ..Default::default()
        };
        let mut records = vec![full("14"), full("14.09"), full("14.0903")];
        assert!(validate(&records, &rules).ensure(&rules).is_ok());

        records.push(NcesRecord {
            cip: "26.0101".into(),
            parse_warning: true,
            ..Default::default()
        });
        records.push(NcesRecord {
            cip: "26.0102".into(),
            title: "t".into(),
            ..Default::default()
        });
        let report = validate(&records, &rules);
        assert_eq!(report.parse_warnings, 1);
        assert!(matches!(
            report.ensure(&rules),
            Err(PipelineError::TooManyIncomplete { count: 2, max: 1 })
        ));
    }

    #[test]
    fn dhs_requires_canonical_unique_codes() {
        let rules = Rules::dhs(&Thresholds::default());
        let rec = |cip: &str| DhsRecord {
            cip: cip.into(),
            title_from_pdf: String::new(),
        };
        assert!(validate(&[rec("14.0903"), rec("27.0101")], &rules).ensure(&rules).is_ok());
        let dup = validate(&[rec("14.0903"), rec("14.0903")], &rules);
        assert!(matches!(dup.ensure(&rules), Err(PipelineError::DuplicateCip { .. })));
        let bad = validate(&[rec("14.09")], &rules);
        assert!(matches!(bad.ensure(&rules), Err(PipelineError::InvalidCipFormat { .. })));
    }
}

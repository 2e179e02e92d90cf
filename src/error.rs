use std::path::PathBuf;

use thiserror::Error;

/// Fatal pipeline conditions. Anything here aborts the run before an
/// artifact is written.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing input {path}: run `cip_stem {stage}` first")]
    MissingInput { path: PathBuf, stage: &'static str },

    #[error("invalid CIP format: count={count} sample={sample:?}")]
    InvalidCipFormat { count: usize, sample: Vec<String> },

    #[error("duplicate CIP codes: count={count} sample={sample:?}")]
    DuplicateCip { count: usize, sample: Vec<String> },

    #[error("STEM-eligible records missing stemSource: count={count} sample={sample:?}")]
    MissingStemSource { count: usize, sample: Vec<String> },

    #[error("{what} is suspiciously low: {count} < {min}")]
    BelowThreshold {
        what: &'static str,
        count: usize,
        min: usize,
    },

    #[error("too many records missing title/definition: {count} > {max}")]
    TooManyIncomplete { count: usize, max: usize },

    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("PDF text extraction failed for {path}: {reason}")]
    PdfText { path: PathBuf, reason: String },
}

/// Number of offending identifiers quoted in an error message.
pub const SAMPLE_LEN: usize = 20;

pub fn sample(items: &[String]) -> Vec<String> {
    items.iter().take(SAMPLE_LEN).cloned().collect()
}

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod config;
pub mod error;
pub mod extract;
pub mod flat_snapshot;
#[cfg(feature = "remote")]
pub mod remote;
pub mod report;
pub mod schema;
pub mod share;
pub mod synth;

pub use error::{AnalyzerError, Result};

/// Benchmark log grammar a record was extracted with.
#[derive(
    Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Current format with per-thread and GPU timing blocks.
    #[default]
    Primary,
    /// Older format: FPS statistics and frame thresholds only.
    Legacy,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Primary => "primary",
            LogFormat::Legacy => "legacy",
        }
    }
}

/// Extract and aggregate one log's text.
///
/// Unlike [`extract::extract`], a log without any benchmark record is an
/// error here: this is the entry point used when the caller needs something
/// to show.
pub fn analyze_log(text: &str) -> Result<aggregate::Analysis> {
    analyze_log_with(&extract::Extractor::default(), text)
}

pub fn analyze_log_with(
    extractor: &extract::Extractor,
    text: &str,
) -> Result<aggregate::Analysis> {
    let extraction = extractor.extract(text)?;
    if extraction.is_empty() {
        return Err(AnalyzerError::NoBenchmarkData);
    }
    Ok(aggregate::Analysis::from_extraction(extraction))
}

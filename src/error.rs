//! Error types for log analysis and snapshot sharing.

use crate::LogFormat;

pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Analyzer errors.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// Neither log grammar matched a single benchmark record.
    #[error("no benchmark data found")]
    NoBenchmarkData,

    /// A matched record carried a non-numeric token where a number belongs.
    #[error("malformed number in {format} record: field `{field}` = {token:?}")]
    MalformedNumber {
        field: &'static str,
        token: String,
        format: &'static str,
    },

    /// Reading a log file or snapshot from disk failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Shared snapshot is unknown or has expired.
    #[error("shared benchmark not found: {id}")]
    RemoteNotFound { id: String },

    /// Remote host or sharing service unreachable.
    #[error("network error: {message}")]
    Network { message: String },

    /// Share link without a benchmark identifier.
    #[error("invalid share url: {reason}")]
    InvalidShareUrl { reason: String },

    /// Identifier with the wrong shape.
    #[error("invalid snapshot id: {0:?}")]
    InvalidSnapshotId(String),

    /// Snapshot payload over the store limit.
    #[error("snapshot payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Snapshot JSON could not be encoded or decoded.
    #[error("snapshot encoding: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl AnalyzerError {
    pub(crate) fn malformed(format: LogFormat, field: &'static str, token: &str) -> Self {
        Self::MalformedNumber {
            field,
            token: token.to_string(),
            format: format.as_str(),
        }
    }

    /// Message shown to the user at the CLI boundary.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoBenchmarkData => {
                "No benchmark data found in the file. Make sure it has the correct format."
                    .to_string()
            }
            Self::MalformedNumber { .. } => {
                "Error processing the file. Make sure it has the correct format.".to_string()
            }
            Self::Io(e) => format!("Error reading the file. Please try again. ({e})"),
            Self::RemoteNotFound { .. }
            | Self::InvalidShareUrl { .. }
            | Self::InvalidSnapshotId(_)
            | Self::Snapshot(_) => format!("Failed to load shared benchmark: {self}"),
            Self::Network { message } => format!("Network error: {message}"),
            Self::PayloadTooLarge { .. } => format!("Failed to share benchmark: {self}"),
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoBenchmarkData | Self::MalformedNumber { .. } => 2,
            Self::Io(_) => 3,
            Self::RemoteNotFound { .. }
            | Self::InvalidShareUrl { .. }
            | Self::InvalidSnapshotId(_)
            | Self::Snapshot(_) => 4,
            Self::Network { .. } | Self::PayloadTooLarge { .. } => 5,
        }
    }
}

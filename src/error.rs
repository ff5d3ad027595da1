use thiserror::Error;

/// Failures surfaced by the reader and the derivation engine.
///
/// Lookup misses (unknown region, unknown date label) are not errors; they
/// come back as `None` or as a missing key.
#[derive(Debug, Error)]
pub enum TableError {
    /// The origin could not be opened or read.
    #[error("source unavailable: {origin}: {source}")]
    SourceUnavailable {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    /// The content was read but lacks the minimum expected shape.
    #[error("malformed table {origin}: {reason}")]
    MalformedTable { origin: String, reason: String },

    /// A window or delta asked for more history than the table holds.
    #[error("requested {requested} value columns but only {available} available")]
    InsufficientColumns { requested: usize, available: usize },

    #[error("window length must be at least 1")]
    EmptyWindow,

    /// Raised only under `DuplicatePolicy::Reject`.
    #[error("identifier '{identifier}' appears in more than one row")]
    DuplicateIdentifier { identifier: String },
}

impl TableError {
    pub(crate) fn malformed(origin: &str, reason: impl Into<String>) -> Self {
        TableError::MalformedTable {
            origin: origin.to_string(),
            reason: reason.into(),
        }
    }
}

pub type TableResult<T> = std::result::Result<T, TableError>;

//! # Errors
//!
//! Every failure in the selection core is fatal. There is no warning path:
//! a partially recovered round could report a top-N that is not the true top-N.

use crate::model::ItemId;
use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Debug)]
pub enum ExtractError {
    /// Invalid run configuration (empty source list, zero capacity, bad CLI value).
    Config(String),
    /// Eager input validation found a score vector too short for the source list.
    ExtractionIndexOutOfRange {
        id: ItemId,
        index: usize,
        len: usize,
    },
    /// Eager input validation found the same item id twice.
    DuplicateItem { id: ItemId },
    /// A record reached a local selector without an entry at the extraction index.
    MalformedRecord {
        partition: usize,
        id: ItemId,
        index: usize,
        len: usize,
    },
    /// A record carried a NaN score at the extraction index.
    NonFiniteScore {
        partition: usize,
        id: ItemId,
        index: usize,
    },
    /// The merge stage received a group that does not hold exactly one candidate.
    DuplicateCandidate { id: ItemId, count: usize },
    /// A round failed; the driver aborted the remaining sequence.
    RoundFailed {
        iteration_index: usize,
        source_id: u32,
        cause: Box<ExtractError>,
    },
    Io {
        context: String,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

impl ExtractError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Configuration errors are raised before any data is processed.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ExtractError::Config(_) | ExtractError::ExtractionIndexOutOfRange { .. }
        )
    }

    /// Strip any `RoundFailed` wrappers.
    pub fn root_cause(&self) -> &ExtractError {
        match self {
            ExtractError::RoundFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Config(message) => write!(f, "configuration error: {}", message),
            ExtractError::ExtractionIndexOutOfRange { id, index, len } => write!(
                f,
                "configuration error: item {} has {} scores, extraction index {} is out of range",
                id, len, index
            ),
            ExtractError::DuplicateItem { id } => {
                write!(f, "item id {} appears more than once in the input", id)
            }
            ExtractError::MalformedRecord {
                partition,
                id,
                index,
                len,
            } => write!(
                f,
                "malformed record in partition {}: item {} has {} scores, no entry at index {}",
                partition, id, len, index
            ),
            ExtractError::NonFiniteScore {
                partition,
                id,
                index,
            } => write!(
                f,
                "malformed record in partition {}: item {} has a NaN score at index {}",
                partition, id, index
            ),
            ExtractError::DuplicateCandidate { id, count } => write!(
                f,
                "merge invariant violated: item {} delivered {} candidates, expected exactly one",
                id, count
            ),
            ExtractError::RoundFailed {
                iteration_index,
                source_id,
                cause,
            } => write!(
                f,
                "round {} (source {}) failed: {}",
                iteration_index, source_id, cause
            ),
            ExtractError::Io { context, source } => write!(f, "{}: {}", context, source),
            ExtractError::Parse { path, line, source } => {
                write!(f, "{}:{}: {}", path.display(), line, source)
            }
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::RoundFailed { cause, .. } => Some(cause.as_ref()),
            ExtractError::Io { source, .. } => Some(source),
            ExtractError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

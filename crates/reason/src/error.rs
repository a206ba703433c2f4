use detect::OccurrenceId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonError {
    #[error("invalid reasoner configuration: {0}")]
    InvalidConfig(String),
    /// An author tag at the insertion point names a different entry.
    /// Never resolved automatically.
    #[error("conflicting tag `{existing}` at line {line} for `{entry}` ({occurrence})")]
    ConflictingTag {
        occurrence: OccurrenceId,
        entry: String,
        existing: String,
        offset: usize,
        line: usize,
    },
}

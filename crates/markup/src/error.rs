use thiserror::Error;

/// Errors produced while parsing LaTeX structure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// The source cannot be given a consistent tree. Fatal for that document only.
    #[error("malformed structure at line {line} (byte {offset}): {reason}")]
    MalformedStructure {
        offset: usize,
        line: usize,
        reason: String,
    },
    #[error("invalid skip registry: {0}")]
    InvalidConfig(String),
}

impl MarkupError {
    /// Byte offset the error points at, when it refers to a location.
    pub fn offset(&self) -> Option<usize> {
        match self {
            MarkupError::MalformedStructure { offset, .. } => Some(*offset),
            MarkupError::InvalidConfig(_) => None,
        }
    }
}

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectError {
    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),
    #[error("cannot build pattern for term `{term}`: {message}")]
    Pattern { term: String, message: String },
}

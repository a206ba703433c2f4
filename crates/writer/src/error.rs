use markup::MarkupError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriterError {
    #[error("invalid writer configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Markup(#[from] MarkupError),
}

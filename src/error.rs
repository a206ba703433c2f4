use assist::ProviderError;
use detect::DetectError;
use lexicon::LexiconError;
use markup::MarkupError;
use reason::ReasonError;
use thiserror::Error;
use writer::WriterError;

use crate::config::ConfigLoadError;

/// Anything that stops a pipeline operation as a whole.
///
/// Document-scoped failures (a malformed chapter) do not surface here; they
/// are recorded per document and in the audit report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration failure: {0}")]
    Config(#[from] ConfigLoadError),
    #[error("markup failure: {0}")]
    Markup(#[from] MarkupError),
    #[error("lexicon failure: {0}")]
    Lexicon(#[from] LexiconError),
    #[error("detection failure: {0}")]
    Detect(#[from] DetectError),
    #[error("reasoning failure: {0}")]
    Reason(#[from] ReasonError),
    #[error("writer failure: {0}")]
    Writer(#[from] WriterError),
    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),
    #[error("cannot access `{path}`: {message}")]
    Io { path: String, message: String },
    #[error("cannot encode report: {0}")]
    Encode(String),
}

/// Why one document produced no output. The rest of the corpus proceeds.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DocumentFailure {
    #[error(transparent)]
    Markup(#[from] MarkupError),
    #[error(transparent)]
    Writer(#[from] WriterError),
}

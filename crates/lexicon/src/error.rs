use markup::IndexType;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexiconError {
    #[error("failed to read or write lexicon {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse lexicon YAML: {0}")]
    Parse(String),
    #[error("entry #{index} has an empty label")]
    EmptyLabel { index: usize },
    #[error("duplicate {index_type} label `{label}`")]
    DuplicateLabel { index_type: IndexType, label: String },
    /// A phrase maps to more than one label of the same type. Never resolved
    /// automatically; the occurrence is excluded and reported.
    #[error("`{phrase}` is ambiguous between {index_type} entries {labels:?}")]
    AmbiguousSynonym {
        phrase: String,
        index_type: IndexType,
        labels: Vec<String>,
    },
    #[error("no lexicon entry `{0}`")]
    UnknownEntry(String),
}

use thiserror::Error;

/// Failures talking to a review provider. Batch-scoped: the items of a
/// failed batch fall back to non-LLM behaviour and are reported unresolved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("invalid assist configuration: {0}")]
    InvalidConfig(String),
    #[error("missing credential: set {0}")]
    MissingCredential(String),
    #[error("HTTP request failed: {0}")]
    Transport(String),
    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider command failed: {0}")]
    Command(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("cannot access `{path}`: {message}")]
    Io { path: String, message: String },
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::Command(_) => true,
            ProviderError::Status { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            ProviderError::InvalidResponse(_) => true,
            ProviderError::InvalidConfig(_)
            | ProviderError::MissingCredential(_)
            | ProviderError::Io { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        let status = |status| ProviderError::Status {
            status,
            body: String::new(),
        };
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!ProviderError::MissingCredential("OPENAI_API_KEY".into()).is_retryable());
    }
}

//! YAML configuration for the whole pipeline.
//!
//! Every stage reads its own section; missing sections and fields take
//! their defaults, so an empty file with only a version is valid.
//!
//! ## Example
//!
//! ```yaml
//! version: "1.0"
//! name: "phonology handbook"
//!
//! corpus:
//!   extensions: ["tex"]
//!   include_hidden: false
//!
//! markup:
//!   skip_environments: ["tikzpicture", "tabular"]
//!   skip_macros: ["cite", "ref", "label"]
//!   unknown_macros: opaque
//!
//! detect:
//!   min_term_chars: 3
//!   name_heuristics: true
//!
//! reason:
//!   ranges: true
//!   discussion_gap: 3
//!   range_scope: section
//!
//! writer:
//!   mode: assist
//!   command_set: langsci
//!   safe_auto_insert: 0.8
//!
//! assist:
//!   provider: anthropic
//!   max_concurrency: 4
//!   retry:
//!     max_retries: 3
//!     base_delay: 500
//! ```

use std::fs;
use std::path::Path;

use assist::AssistConfig;
use detect::DetectConfig;
use markup::SkipRegistry;
use reason::ReasonConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use writer::WriterConfig;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Which files of a directory tree make up the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// File extensions, without the dot.
    pub extensions: Vec<String>,
    /// Descend into directories whose name starts with a dot.
    pub include_hidden: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["tex".into()],
            include_hidden: false,
        }
    }
}

impl CorpusConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigLoadError::Validation(
                "corpus.extensions must name at least one extension".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for a tagging run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IndexerConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub corpus: CorpusConfig,

    /// Skip-region registry for the parser and classifier
    #[serde(default)]
    pub markup: SkipRegistry,

    #[serde(default)]
    pub detect: DetectConfig,

    #[serde(default)]
    pub reason: ReasonConfig,

    #[serde(default)]
    pub writer: WriterConfig,

    #[serde(default)]
    pub assist: AssistConfig,
}

impl IndexerConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: IndexerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigLoadError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check the version and every stage section.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        let stage = |section: &str, message: String| {
            ConfigLoadError::Validation(format!("{section}: {message}"))
        };
        self.corpus.validate()?;
        self.markup
            .validate()
            .map_err(|e| stage("markup", e.to_string()))?;
        self.detect
            .validate()
            .map_err(|e| stage("detect", e.to_string()))?;
        self.reason
            .validate()
            .map_err(|e| stage("reason", e.to_string()))?;
        self.writer
            .validate()
            .map_err(|e| stage("writer", e.to_string()))?;
        self.assist
            .validate()
            .map_err(|e| stage("assist", e.to_string()))?;
        Ok(())
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            corpus: CorpusConfig::default(),
            markup: SkipRegistry::default(),
            detect: DetectConfig::default(),
            reason: ReasonConfig::default(),
            writer: WriterConfig::default(),
            assist: AssistConfig::default(),
        }
    }
}

use std::fmt;
use std::str::FromStr;

use markup::CommandSet;
use serde::{Deserialize, Serialize};

use crate::error::WriterError;

/// How much of a plan is committed to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Report only; the source is never changed.
    #[default]
    Guide,
    /// Commit confident, lexicon-backed tags; defer the rest.
    Assist,
    /// Commit everything planned.
    Auto,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Guide => "guide",
            Mode::Assist => "assist",
            Mode::Auto => "auto",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guide" => Ok(Mode::Guide),
            "assist" => Ok(Mode::Assist),
            "auto" => Ok(Mode::Auto),
            other => Err(format!("unknown mode `{other}` (expected guide, assist or auto)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Configuration schema version.
    pub version: u32,
    pub mode: Mode,
    /// Macro family for inserted tags.
    pub command_set: CommandSet,
    /// Minimum confidence for a commit in assist mode.
    pub safe_auto_insert: f32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            version: 1,
            mode: Mode::Guide,
            command_set: CommandSet::Typed,
            safe_auto_insert: 0.8,
        }
    }
}

impl WriterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_command_set(mut self, commands: CommandSet) -> Self {
        self.command_set = commands;
        self
    }

    pub fn with_safe_auto_insert(mut self, threshold: f32) -> Self {
        self.safe_auto_insert = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), WriterError> {
        if self.version == 0 {
            return Err(WriterError::InvalidConfig("version must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.safe_auto_insert) {
            return Err(WriterError::InvalidConfig(format!(
                "safe_auto_insert must be in [0, 1], got {}",
                self.safe_auto_insert
            )));
        }
        Ok(())
    }
}

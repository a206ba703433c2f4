use serde::{Deserialize, Serialize};

use crate::error::DetectError;

const DEFAULT_STOPWORDS: &[&str] = &[
    "A", "An", "And", "As", "At", "But", "By", "Chapter", "Figure", "For", "From", "If", "In",
    "It", "Its", "Of", "On", "Our", "Section", "Since", "So", "Table", "That", "The", "Then",
    "These", "This", "Those", "Thus", "To", "We", "When", "While", "With",
];

/// Candidate detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Configuration schema version.
    pub version: u32,
    /// Lexicon strings shorter than this (in characters) are never searched.
    pub min_term_chars: usize,
    /// Propose capitalised multi-word sequences as names.
    pub name_heuristics: bool,
    /// Propose affix and reconstruction shapes as lexical items.
    pub lexical_heuristics: bool,
    pub name_confidence: f32,
    pub lexical_confidence: f32,
    /// Upper bound for any heuristic confidence. Must stay below the writer's
    /// auto-insert threshold so heuristics never commit in assist mode.
    pub heuristic_cap: f32,
    /// Longest capitalised sequence still treated as a name.
    pub max_name_words: usize,
    /// Function words dropped from the start of a capitalised sequence.
    pub stopwords: Vec<String>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            version: 1,
            min_term_chars: 3,
            name_heuristics: true,
            lexical_heuristics: true,
            name_confidence: 0.4,
            lexical_confidence: 0.35,
            heuristic_cap: 0.75,
            max_name_words: 4,
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl DetectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_term_chars(mut self, chars: usize) -> Self {
        self.min_term_chars = chars;
        self
    }

    /// Turn both heuristic families on or off.
    pub fn with_heuristics(mut self, enabled: bool) -> Self {
        self.name_heuristics = enabled;
        self.lexical_heuristics = enabled;
        self
    }

    pub fn with_heuristic_cap(mut self, cap: f32) -> Self {
        self.heuristic_cap = cap;
        self
    }

    pub fn validate(&self) -> Result<(), DetectError> {
        if self.version == 0 {
            return Err(DetectError::InvalidConfig("version must be at least 1".into()));
        }
        if self.min_term_chars == 0 {
            return Err(DetectError::InvalidConfig(
                "min_term_chars must be at least 1".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.heuristic_cap) {
            return Err(DetectError::InvalidConfig(format!(
                "heuristic_cap must be in [0, 1), got {}",
                self.heuristic_cap
            )));
        }
        for (name, value) in [
            ("name_confidence", self.name_confidence),
            ("lexical_confidence", self.lexical_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DetectError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.max_name_words < 2 {
            return Err(DetectError::InvalidConfig(
                "max_name_words must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

use markup::SectionLevel;
use serde::{Deserialize, Serialize};

use crate::error::ReasonError;

/// Range and cross-reference planning settings.
///
/// Ranges are formed per entry, per document and per scope at
/// `range_scope` depth. Two consecutive occurrences belong to the same
/// cluster when their paragraph indexes differ by less than
/// `discussion_gap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonConfig {
    /// Configuration schema version.
    pub version: u32,
    /// Form page ranges at all. When off every occurrence is tagged directly.
    pub ranges: bool,
    /// Paragraph distance at which a discussion is considered interrupted.
    pub discussion_gap: u32,
    /// Smallest cluster that becomes a range.
    pub min_range_size: usize,
    /// Occurrences per paragraph spanned, below which a cluster stays
    /// a set of standalone tags.
    pub min_density: f32,
    /// Sectioning level a range never crosses. Also the scope for see-also tags.
    pub range_scope: SectionLevel,
}

impl Default for ReasonConfig {
    fn default() -> Self {
        Self {
            version: 1,
            ranges: true,
            discussion_gap: 3,
            min_range_size: 2,
            min_density: 0.2,
            range_scope: SectionLevel::Section,
        }
    }
}

impl ReasonConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ranges(mut self, enabled: bool) -> Self {
        self.ranges = enabled;
        self
    }

    pub fn with_discussion_gap(mut self, paragraphs: u32) -> Self {
        self.discussion_gap = paragraphs;
        self
    }

    pub fn with_min_range_size(mut self, size: usize) -> Self {
        self.min_range_size = size;
        self
    }

    pub fn with_min_density(mut self, density: f32) -> Self {
        self.min_density = density;
        self
    }

    pub fn with_range_scope(mut self, level: SectionLevel) -> Self {
        self.range_scope = level;
        self
    }

    pub fn validate(&self) -> Result<(), ReasonError> {
        if self.version == 0 {
            return Err(ReasonError::InvalidConfig("version must be at least 1".into()));
        }
        if self.discussion_gap == 0 {
            return Err(ReasonError::InvalidConfig(
                "discussion_gap must be at least 1 paragraph".into(),
            ));
        }
        if self.min_range_size < 2 {
            return Err(ReasonError::InvalidConfig(format!(
                "min_range_size must be at least 2, got {}",
                self.min_range_size
            )));
        }
        if !(0.0..=1.0).contains(&self.min_density) {
            return Err(ReasonError::InvalidConfig(format!(
                "min_density must be in [0, 1], got {}",
                self.min_density
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(ReasonConfig::default().validate().is_ok());
    }

    #[test]
    fn single_member_ranges_are_rejected() {
        let cfg = ReasonConfig::new().with_min_range_size(1);
        assert!(matches!(cfg.validate(), Err(ReasonError::InvalidConfig(_))));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: ReasonConfig = serde_json::from_str(r#"{"discussion_gap": 5}"#).unwrap();
        assert_eq!(cfg.discussion_gap, 5);
        assert_eq!(cfg.range_scope, SectionLevel::Section);
    }
}

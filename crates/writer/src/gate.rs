//! Mode gating: which planned tags are committed.

use reason::PlannedTag;
use serde::{Deserialize, Serialize};

use crate::config::{Mode, WriterConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Commit,
    /// Guide mode: reported for the author to insert.
    Suggest,
    /// Assist mode: not confident or not lexicon-backed enough.
    Defer,
}

/// Verdict for one planned tag. Range members carry their group's
/// confidence and origin, so both ends of a pair always agree.
pub fn gate(tag: &PlannedTag, config: &WriterConfig) -> Verdict {
    match config.mode {
        Mode::Guide => Verdict::Suggest,
        Mode::Auto => Verdict::Commit,
        Mode::Assist => {
            if tag.confidence >= config.safe_auto_insert && tag.origin.is_curated() {
                Verdict::Commit
            } else {
                Verdict::Defer
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detect::OccurrenceId;
    use lexicon::{EntryKey, Origin};
    use markup::{IndexKey, IndexType, RangeMark, Tag};
    use reason::PlanRule;

    fn planned(confidence: f32, origin: Origin) -> PlannedTag {
        PlannedTag {
            doc: 0,
            offset: 0,
            tag: Tag::direct(IndexType::Subject, IndexKey::plain("x"), RangeMark::Single),
            occurrence: OccurrenceId { doc: 0, seq: 0 },
            entry: EntryKey::new(IndexType::Subject, "x"),
            rule: PlanRule::Direct,
            confidence,
            origin,
            group: None,
        }
    }

    #[test]
    fn assist_commits_only_confident_curated_tags() {
        let cfg = WriterConfig::new().with_mode(Mode::Assist);
        assert_eq!(gate(&planned(1.0, Origin::LexiconExact), &cfg), Verdict::Commit);
        assert_eq!(gate(&planned(0.9, Origin::LexiconSynonym), &cfg), Verdict::Commit);
        assert_eq!(gate(&planned(0.9, Origin::LlmSuggested), &cfg), Verdict::Defer);
        assert_eq!(gate(&planned(0.75, Origin::LexiconExact), &cfg), Verdict::Defer);
        assert_eq!(gate(&planned(0.4, Origin::Heuristic), &cfg), Verdict::Defer);
    }

    #[test]
    fn guide_and_auto_ignore_confidence() {
        let low = planned(0.1, Origin::Heuristic);
        assert_eq!(gate(&low, &WriterConfig::new()), Verdict::Suggest);
        assert_eq!(
            gate(&low, &WriterConfig::new().with_mode(Mode::Auto)),
            Verdict::Commit
        );
    }
}

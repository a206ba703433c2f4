//! The two-phase tagging pipeline.
//!
//! Phase 1 analyzes every document in parallel against one lexicon version
//! and freezes the result. Phase 2 reasons over the frozen snapshot of the
//! whole corpus in a single pass, then writes each document.

mod phase1;
mod phase2;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use assist::JudgeReport;
use detect::OccurrenceId;
use lexicon::{fold, Lexicon};
use markup::TagArgument;
use reason::TagPlan;
use tracing::debug;

use crate::audit::AuditReport;
use crate::config::IndexerConfig;
use crate::corpus::SourceDoc;
use crate::error::PipelineError;

pub use self::phase1::{run_phase1, AnalyzedDocument, DocumentState, Phase1Snapshot};
pub use self::phase2::{run_phase2, DocumentOutput};

/// Everything one tagging run produced.
#[derive(Debug)]
pub struct TagRun {
    pub snapshot: Arc<Phase1Snapshot>,
    pub plan: TagPlan,
    pub documents: Vec<DocumentOutput>,
    pub audit: AuditReport,
}

impl TagRun {
    /// Documents whose text changed, with their new text.
    pub fn changed(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.documents
            .iter()
            .filter_map(|d| d.changed_text().map(|text| (d.path.as_path(), text)))
    }
}

/// Occurrences a reviewer asked to drop.
///
/// A dropped tag suppresses the occurrences of its entry on the same line
/// of the same file. Matching by line rather than byte span keeps the
/// suppression valid after the dropped tag has been removed from the source.
pub fn suppressed_by_judgment(
    snapshot: &Phase1Snapshot,
    report: &JudgeReport,
) -> BTreeSet<OccurrenceId> {
    let dropped: BTreeSet<(&str, usize, markup::IndexType, String)> = report
        .dropped()
        .into_iter()
        .map(|item| {
            let key = TagArgument::parse(&item.term).key;
            let label = fold(key.visible_text(), item.index_type);
            (item.file.as_str(), item.line, item.index_type, label)
        })
        .collect();
    if dropped.is_empty() {
        return BTreeSet::new();
    }

    let mut out = BTreeSet::new();
    for state in &snapshot.documents {
        let Some(analyzed) = state.analyzed() else {
            continue;
        };
        for occurrence in &analyzed.analysis.occurrences {
            let index_type = occurrence.entry.index_type;
            let probe = (
                state.name.as_str(),
                occurrence.line,
                index_type,
                fold(&occurrence.entry.label, index_type),
            );
            if dropped.contains(&probe) {
                out.insert(occurrence.id);
            }
        }
    }
    debug!(suppressed = out.len(), "judgment applied to plan");
    out
}

/// Run both phases over `sources` and build the audit report.
pub fn tag_corpus(
    sources: &[SourceDoc],
    lexicon: &Lexicon,
    config: &IndexerConfig,
    judgment: Option<&JudgeReport>,
) -> Result<TagRun, PipelineError> {
    let snapshot = run_phase1(sources, lexicon, config)?;
    let suppressed = judgment
        .map(|report| suppressed_by_judgment(&snapshot, report))
        .unwrap_or_default();
    let (plan, documents) = run_phase2(&snapshot, sources, config, &suppressed)?;
    let audit = AuditReport::build(&snapshot, &plan, &documents, config.writer.mode);
    Ok(TagRun {
        snapshot,
        plan,
        documents,
        audit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assist::{collect_judge_items, Judgment};
    use lexicon::{IndexType, LexiconEntry};
    use writer::Mode;

    #[test]
    fn dropped_tags_suppress_their_line_only() {
        let src = "A morpheme\\sindex{morpheme} here.\nAnother morpheme there.\n";
        let sources = vec![SourceDoc::new("ch.tex", src)];
        let lexicon =
            Lexicon::from_entries(vec![LexiconEntry::new("morpheme", IndexType::Subject)])
                .unwrap();
        let mut config = IndexerConfig::default();
        config.writer.mode = Mode::Auto;
        config.reason.ranges = false;

        let items = collect_judge_items("ch.tex", src, &config.markup, 40).unwrap();
        assert_eq!(items.len(), 1);
        let report = JudgeReport {
            decisions: vec![Judgment {
                key: items[0].key(),
                keep: false,
                reason: "too generic".into(),
            }],
            items,
            ..JudgeReport::default()
        };

        let snapshot = run_phase1(&sources, &lexicon, &config).unwrap();
        let suppressed = suppressed_by_judgment(&snapshot, &report);
        let lines: Vec<usize> = suppressed
            .iter()
            .filter_map(|id| snapshot.occurrence(*id))
            .map(|o| o.line)
            .collect();
        assert_eq!(lines, vec![1]);

        let run = tag_corpus(&sources, &lexicon, &config, Some(&report)).unwrap();
        assert_eq!(run.audit.records_with_action("suppressed").count(), 1);
    }

    #[test]
    fn changed_lists_only_written_documents() {
        let lexicon =
            Lexicon::from_entries(vec![LexiconEntry::new("clitic", IndexType::Subject)])
                .unwrap();
        let sources = vec![
            SourceDoc::new("a.tex", "A clitic.\n"),
            SourceDoc::new("b.tex", "Nothing here.\n"),
        ];
        let mut config = IndexerConfig::default();
        config.writer.mode = Mode::Auto;
        let run = tag_corpus(&sources, &lexicon, &config, None).unwrap();
        let changed: Vec<(&Path, &str)> = run.changed().collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].0, Path::new("a.tex"));
        assert_eq!(changed[0].1, "A clitic\\sindex{clitic}.\n");
    }
}

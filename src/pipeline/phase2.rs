//! Phase 2: one corpus-wide reasoning pass, then per-document writing.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

use detect::OccurrenceId;
use rayon::prelude::*;
use reason::{Reasoner, TagPlan};
use tracing::{info, info_span, warn};
use writer::{write_document, WriteOutcome};

use crate::config::IndexerConfig;
use crate::corpus::SourceDoc;
use crate::error::{DocumentFailure, PipelineError};
use crate::metrics::MetricsSpan;
use crate::pipeline::phase1::Phase1Snapshot;

/// The written form of one document, or why there is none.
#[derive(Debug, Clone)]
pub struct DocumentOutput {
    pub doc: u32,
    pub path: PathBuf,
    pub result: Result<WriteOutcome, DocumentFailure>,
}

impl DocumentOutput {
    /// New text when at least one tag was committed.
    pub fn changed_text(&self) -> Option<&str> {
        match &self.result {
            Ok(outcome) if outcome.changed() => Some(&outcome.text),
            _ => None,
        }
    }
}

/// Plan the corpus and write every document that parsed.
///
/// `sources` must be the slice Phase 1 ran over.
pub fn run_phase2(
    snapshot: &Phase1Snapshot,
    sources: &[SourceDoc],
    config: &IndexerConfig,
    suppressed: &BTreeSet<OccurrenceId>,
) -> Result<(TagPlan, Vec<DocumentOutput>), PipelineError> {
    let span = info_span!(
        "phase2",
        documents = sources.len(),
        mode = config.writer.mode.as_str()
    );
    let _guard = span.enter();
    let started = Instant::now();

    config.writer.validate()?;
    let reasoner = Reasoner::new(config.reason.clone())?;

    let metrics = MetricsSpan::start();
    let plan = reasoner.plan(&snapshot.lexicon, &snapshot.facts(), suppressed);
    if let Some(span) = metrics {
        span.record_reason(plan.tags.len());
    }

    let outputs: Vec<DocumentOutput> = snapshot
        .documents
        .par_iter()
        .zip(sources.par_iter())
        .map(|(state, source)| {
            let result = match &state.result {
                Err(err) => Err(DocumentFailure::from(err.clone())),
                Ok(analyzed) => {
                    let metrics = MetricsSpan::start();
                    let written = write_document(
                        &source.text,
                        &analyzed.regions,
                        plan.tags_for(state.doc),
                        &config.writer,
                    );
                    if let Some(span) = metrics {
                        let result = written.as_ref().map(|o| o.inserted).map_err(|e| e.clone());
                        span.record_write(result);
                    }
                    if let Err(err) = &written {
                        warn!(document = %state.name, error = %err, "document not written");
                    }
                    written.map_err(DocumentFailure::from)
                }
            };
            DocumentOutput {
                doc: state.doc,
                path: source.path.clone(),
                result,
            }
        })
        .collect();

    info!(
        planned = plan.tags.len(),
        decisions = plan.decisions.len(),
        conflicts = plan.conflicts.len(),
        changed = outputs.iter().filter(|o| o.changed_text().is_some()).count(),
        elapsed_micros = started.elapsed().as_micros() as u64,
        "phase 2 complete"
    );
    Ok((plan, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::phase1::run_phase1;
    use lexicon::{IndexType, Lexicon, LexiconEntry};
    use writer::Mode;

    fn auto() -> IndexerConfig {
        let mut config = IndexerConfig::default();
        config.writer.mode = Mode::Auto;
        config
    }

    #[test]
    fn failed_documents_carry_their_markup_error() {
        let lexicon =
            Lexicon::from_entries(vec![LexiconEntry::new("morpheme", IndexType::Subject)])
                .unwrap();
        let sources = vec![
            SourceDoc::new("a.tex", "A morpheme here.\n"),
            SourceDoc::new("b.tex", "broken { morpheme\n"),
        ];
        let config = auto();
        let snapshot = run_phase1(&sources, &lexicon, &config).unwrap();
        let (plan, outputs) = run_phase2(&snapshot, &sources, &config, &BTreeSet::new()).unwrap();

        assert_eq!(plan.tags.len(), 1);
        assert_eq!(
            outputs[0].changed_text(),
            Some("A morpheme\\sindex{morpheme} here.\n")
        );
        assert!(matches!(outputs[1].result, Err(DocumentFailure::Markup(_))));
    }

    #[test]
    fn suppressed_occurrences_are_not_written() {
        let lexicon =
            Lexicon::from_entries(vec![LexiconEntry::new("morpheme", IndexType::Subject)])
                .unwrap();
        let sources = vec![SourceDoc::new("a.tex", "A morpheme here.\n")];
        let config = auto();
        let snapshot = run_phase1(&sources, &lexicon, &config).unwrap();
        let suppressed: BTreeSet<OccurrenceId> = snapshot.occurrences().map(|o| o.id).collect();
        let (plan, outputs) = run_phase2(&snapshot, &sources, &config, &suppressed).unwrap();
        assert!(plan.tags.is_empty());
        assert_eq!(outputs[0].changed_text(), None);
    }
}

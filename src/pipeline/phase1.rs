//! Phase 1: per-document parse, classify, detect and normalize.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use detect::{Detector, DocumentAnalysis, Occurrence, OccurrenceId};
use lexicon::{EntryKey, Lexicon, LexiconEntry};
use markup::{classify, parse, MarkupError, Outline, Regions};
use rayon::prelude::*;
use reason::DocumentFacts;
use tracing::{info, info_span, warn};

use crate::config::IndexerConfig;
use crate::corpus::SourceDoc;
use crate::error::PipelineError;
use crate::metrics::MetricsSpan;

/// A document that parsed, with everything detection learned about it.
#[derive(Debug, Clone)]
pub struct AnalyzedDocument {
    pub regions: Regions,
    pub outline: Outline,
    pub analysis: DocumentAnalysis,
}

#[derive(Debug, Clone)]
pub struct DocumentState {
    pub doc: u32,
    pub name: String,
    pub result: Result<AnalyzedDocument, MarkupError>,
}

impl DocumentState {
    pub fn analyzed(&self) -> Option<&AnalyzedDocument> {
        self.result.as_ref().ok()
    }
}

/// The frozen result of Phase 1 for a whole corpus.
///
/// `lexicon` is the version detection ran against plus every synthesized
/// entry; Phase 2 must plan against exactly this version.
#[derive(Debug)]
pub struct Phase1Snapshot {
    pub lexicon: Lexicon,
    pub documents: Vec<DocumentState>,
    /// New entries from heuristic candidates, corpus order, one per key.
    pub synthesized: Vec<LexiconEntry>,
}

impl Phase1Snapshot {
    pub fn occurrences(&self) -> impl Iterator<Item = &Occurrence> {
        self.documents
            .iter()
            .filter_map(DocumentState::analyzed)
            .flat_map(|d| d.analysis.occurrences.iter())
    }

    pub fn occurrence(&self, id: OccurrenceId) -> Option<&Occurrence> {
        self.documents
            .get(id.doc as usize)?
            .analyzed()?
            .analysis
            .occurrences
            .get(id.seq as usize)
    }

    /// Planning input for every document that parsed.
    pub fn facts(&self) -> Vec<DocumentFacts<'_>> {
        self.documents
            .iter()
            .filter_map(|state| {
                state.analyzed().map(|d| DocumentFacts {
                    doc: state.doc,
                    occurrences: &d.analysis.occurrences,
                    existing_tags: &d.analysis.existing_tags,
                })
            })
            .collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&DocumentState, &MarkupError)> {
        self.documents
            .iter()
            .filter_map(|state| state.result.as_ref().err().map(|e| (state, e)))
    }
}

fn analyze_document(
    doc_index: u32,
    source: &SourceDoc,
    detector: &Detector,
    lexicon: &Lexicon,
    config: &IndexerConfig,
) -> Result<AnalyzedDocument, MarkupError> {
    let metrics = MetricsSpan::start();
    let parsed = parse(&source.text, &config.markup).map(|doc| {
        let regions = classify(&doc);
        let outline = Outline::build(&doc);
        (doc, regions, outline)
    });
    let (doc, regions, outline) = match parsed {
        Ok(parsed) => {
            if let Some(span) = metrics {
                span.record_parse(Ok(()));
            }
            parsed
        }
        Err(err) => {
            if let Some(span) = metrics {
                span.record_parse(Err(err.clone()));
            }
            return Err(err);
        }
    };

    let metrics = MetricsSpan::start();
    let analysis = detector.analyze(doc_index, &doc, &regions, &outline, lexicon);
    if let Some(span) = metrics {
        span.record_detect(analysis.occurrences.len());
    }
    Ok(AnalyzedDocument {
        regions,
        outline,
        analysis,
    })
}

/// Analyze every document in parallel against one lexicon version.
///
/// A malformed document is kept as a failed entry and skipped by every
/// later stage; only configuration problems fail the phase.
pub fn run_phase1(
    sources: &[SourceDoc],
    lexicon: &Lexicon,
    config: &IndexerConfig,
) -> Result<Arc<Phase1Snapshot>, PipelineError> {
    let span = info_span!("phase1", documents = sources.len(), lexicon = lexicon.version());
    let _guard = span.enter();
    let started = Instant::now();

    config.markup.validate()?;
    let detector = Detector::new(lexicon, config.detect.clone())?;

    let documents: Vec<DocumentState> = sources
        .par_iter()
        .enumerate()
        .map(|(i, source)| {
            let doc = i as u32;
            let result = analyze_document(doc, source, &detector, lexicon, config);
            if let Err(err) = &result {
                warn!(document = %source.name(), error = %err, "document left untouched");
            }
            DocumentState {
                doc,
                name: source.name(),
                result,
            }
        })
        .collect();

    let mut seen: BTreeSet<EntryKey> = BTreeSet::new();
    let synthesized: Vec<LexiconEntry> = documents
        .iter()
        .filter_map(DocumentState::analyzed)
        .flat_map(|d| d.analysis.synthesized.iter())
        .filter(|entry| seen.insert(entry.key()))
        .cloned()
        .collect();
    let lexicon = lexicon.with_synthesized(&synthesized)?;

    let snapshot = Phase1Snapshot {
        lexicon,
        documents,
        synthesized,
    };
    info!(
        occurrences = snapshot.occurrences().count(),
        failed = snapshot.failed().count(),
        synthesized = snapshot.synthesized.len(),
        elapsed_micros = started.elapsed().as_micros() as u64,
        "phase 1 complete"
    );
    Ok(Arc::new(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexicon::IndexType;

    fn lexicon() -> Lexicon {
        Lexicon::from_entries(vec![LexiconEntry::new("vowel harmony", IndexType::Subject)])
            .unwrap()
    }

    #[test]
    fn malformed_documents_are_isolated() {
        let sources = vec![
            SourceDoc::new("a.tex", "Vowel harmony is common.\n"),
            SourceDoc::new("b.tex", "\\begin{itemize}\nvowel harmony\n"),
            SourceDoc::new("c.tex", "More vowel harmony.\n"),
        ];
        let snapshot = run_phase1(&sources, &lexicon(), &IndexerConfig::default()).unwrap();
        assert_eq!(snapshot.documents.len(), 3);
        let failed: Vec<&str> = snapshot.failed().map(|(s, _)| s.name.as_str()).collect();
        assert_eq!(failed, vec!["b.tex"]);
        assert_eq!(snapshot.occurrences().count(), 2);
        assert_eq!(snapshot.facts().len(), 2);
    }

    #[test]
    fn occurrence_lookup_by_id() {
        let sources = vec![SourceDoc::new("a.tex", "vowel harmony and vowel harmony\n")];
        let snapshot = run_phase1(&sources, &lexicon(), &IndexerConfig::default()).unwrap();
        let id = OccurrenceId { doc: 0, seq: 1 };
        let occurrence = snapshot.occurrence(id).unwrap();
        assert_eq!(occurrence.id, id);
        assert!(snapshot.occurrence(OccurrenceId { doc: 4, seq: 0 }).is_none());
    }

    #[test]
    fn synthesized_entries_join_the_snapshot_lexicon() {
        let sources = vec![SourceDoc::new(
            "a.tex",
            "We follow Noam Chomsky here. Later Noam Chomsky again.\n",
        )];
        let base = lexicon();
        let snapshot = run_phase1(&sources, &base, &IndexerConfig::default()).unwrap();
        assert!(!snapshot.synthesized.is_empty());
        for entry in &snapshot.synthesized {
            assert!(snapshot.lexicon.get(&entry.key()).is_some());
            assert!(base.get(&entry.key()).is_none());
        }
    }
}

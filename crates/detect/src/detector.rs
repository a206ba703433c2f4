//! Candidate detection and per-document analysis.

use std::collections::BTreeSet;
use std::time::Instant;

use lexicon::{Lexicon, LexiconError, Normalizer};
use markup::{DirectiveKind, Document, Outline, Regions, Span};
use tracing::{debug, info_span};

use crate::config::DetectConfig;
use crate::error::DetectError;
use crate::heuristics;
use crate::matcher::TermMatcher;
use crate::occurrence::{
    Candidate, CandidateSource, DetectionNote, DocumentAnalysis, NoteKind, Occurrence,
    OccurrenceId,
};

/// Greedy overlap resolution: longest span wins, then leftmost, then `rank`.
fn resolve_overlaps<T>(mut items: Vec<(Span, usize, T)>, taken: &mut Vec<Span>) -> Vec<(Span, T)> {
    items.sort_by(|a, b| {
        b.0.len()
            .cmp(&a.0.len())
            .then(a.0.start.cmp(&b.0.start))
            .then(a.1.cmp(&b.1))
    });
    let mut accepted = Vec::new();
    for (span, _, item) in items {
        if taken.iter().any(|t| t.overlaps(&span)) {
            continue;
        }
        taken.push(span);
        accepted.push((span, item));
    }
    accepted
}

/// Finds candidates in taggable text and resolves them against a lexicon.
///
/// A detector is built for one lexicon version; pass the same version to
/// [`Detector::analyze`].
#[derive(Debug)]
pub struct Detector {
    config: DetectConfig,
    matcher: TermMatcher,
}

impl Detector {
    pub fn new(lexicon: &Lexicon, config: DetectConfig) -> Result<Self, DetectError> {
        config.validate()?;
        let matcher = TermMatcher::new(lexicon, config.min_term_chars)?;
        Ok(Self { config, matcher })
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Candidates in document order. Lexicon hits are resolved first;
    /// heuristics only fill gaps no lexicon hit touches.
    pub fn candidates(&self, source: &str, regions: &Regions) -> Vec<Candidate> {
        let mut out = Vec::new();
        for run in &regions.taggable {
            let mut taken = Vec::new();
            let hits = self
                .matcher
                .find_all(source, run.span)
                .into_iter()
                .map(|hit| (hit.span, hit.priority, hit))
                .collect();
            for (span, hit) in resolve_overlaps(hits, &mut taken) {
                out.push(Candidate {
                    phrase: span.slice(source).to_owned(),
                    span,
                    insert_at: run.hoist.unwrap_or(span.end),
                    index_type: hit.term.index_type,
                    source: CandidateSource::Lexicon(hit.term.kind),
                    confidence: 1.0,
                });
            }

            let mut guesses = Vec::new();
            if self.config.name_heuristics {
                guesses.extend(heuristics::names(source, run.span, &self.config));
            }
            if self.config.lexical_heuristics {
                guesses.extend(heuristics::lexical_items(source, run.span, &self.config));
            }
            let guesses = guesses
                .into_iter()
                .enumerate()
                .map(|(i, g)| (g.span, i, g))
                .collect();
            for (span, guess) in resolve_overlaps(guesses, &mut taken) {
                out.push(Candidate {
                    phrase: span.slice(source).to_owned(),
                    span,
                    insert_at: run.hoist.unwrap_or(span.end),
                    index_type: guess.index_type,
                    source: CandidateSource::Heuristic,
                    confidence: guess.confidence,
                });
            }
        }
        out.sort_by_key(|c| (c.span.start, c.span.end));
        out
    }

    /// Detect, normalize and locate every candidate of one document.
    pub fn analyze(
        &self,
        doc_index: u32,
        doc: &Document,
        regions: &Regions,
        outline: &Outline,
        lexicon: &Lexicon,
    ) -> DocumentAnalysis {
        let span = info_span!("detect", doc = doc_index);
        let _guard = span.enter();
        let started = Instant::now();

        let source = doc.source();
        let line_of_directive = |kind: DirectiveKind| -> BTreeSet<usize> {
            regions
                .directives
                .iter()
                .filter(|d| d.kind == kind)
                .map(|d| outline.line_of(d.span.start))
                .collect()
        };
        let skip_lines = line_of_directive(DirectiveKind::Skip);
        let standalone_lines = line_of_directive(DirectiveKind::Standalone);
        let normalizer = Normalizer::new(lexicon);

        let mut occurrences = Vec::new();
        let mut notes = Vec::new();
        let mut synthesized = Vec::new();
        let mut seen_synthesized = BTreeSet::new();

        for candidate in self.candidates(source, regions) {
            let (line, column) = outline.line_col(candidate.span.start);
            if skip_lines.contains(&line) {
                notes.push(DetectionNote {
                    phrase: candidate.phrase,
                    span: candidate.span,
                    line,
                    column,
                    kind: NoteKind::SkipDirective,
                });
                continue;
            }
            let resolution = match normalizer.resolve(&candidate.phrase, candidate.index_type) {
                Ok(resolution) => resolution,
                Err(LexiconError::AmbiguousSynonym {
                    index_type, labels, ..
                }) => {
                    debug!(phrase = %candidate.phrase, ?labels, "ambiguous phrase");
                    notes.push(DetectionNote {
                        phrase: candidate.phrase,
                        span: candidate.span,
                        line,
                        column,
                        kind: NoteKind::Ambiguous { index_type, labels },
                    });
                    continue;
                }
                Err(other) => {
                    debug!(phrase = %candidate.phrase, error = %other, "unresolvable phrase");
                    continue;
                }
            };

            let confidence = match resolution.synthesized {
                Some(entry) => {
                    if seen_synthesized.insert(entry.key()) {
                        synthesized.push(entry);
                    }
                    candidate.confidence
                }
                None => resolution.confidence,
            };

            occurrences.push(Occurrence {
                id: OccurrenceId {
                    doc: doc_index,
                    seq: occurrences.len() as u32,
                },
                entry: resolution.key,
                phrase: candidate.phrase,
                span: candidate.span,
                insert_at: candidate.insert_at,
                scope: outline.scope_of(candidate.span.start),
                paragraph: outline.paragraph_of(candidate.span.start),
                line,
                column,
                confidence,
                origin: resolution.origin,
                standalone: standalone_lines.contains(&line),
                attached: regions
                    .tag_chain_at(source, candidate.insert_at)
                    .into_iter()
                    .cloned()
                    .collect(),
            });
        }

        debug!(
            occurrences = occurrences.len(),
            notes = notes.len(),
            synthesized = synthesized.len(),
            elapsed_micros = started.elapsed().as_micros() as u64,
            "document analyzed"
        );

        DocumentAnalysis {
            doc: doc_index,
            occurrences,
            notes,
            synthesized,
            existing_tags: regions.existing_tags.clone(),
        }
    }
}

use std::fmt;

use lexicon::{EntryKey, IndexType, LexiconEntry, Origin, TermKind};
use markup::{ExistingTag, ScopePath, Span};
use serde::{Deserialize, Serialize};

/// Stable identity of an occurrence: document index plus ordinal within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OccurrenceId {
    pub doc: u32,
    pub seq: u32,
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.doc, self.seq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateSource {
    Lexicon(TermKind),
    Heuristic,
}

/// A phrase proposed for indexing, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub phrase: String,
    pub span: Span,
    /// Where a tag for this phrase goes: after the phrase, or after the
    /// enclosing transparent macro.
    pub insert_at: usize,
    pub index_type: IndexType,
    pub source: CandidateSource,
    /// Detector confidence. Only meaningful for heuristic candidates.
    pub confidence: f32,
}

/// A phrase attributed to a canonical entry at a concrete position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: OccurrenceId,
    pub entry: EntryKey,
    pub phrase: String,
    pub span: Span,
    pub insert_at: usize,
    pub scope: ScopePath,
    pub paragraph: u32,
    pub line: usize,
    pub column: usize,
    pub confidence: f32,
    pub origin: Origin,
    /// Set by a `% texindex: standalone` directive on the line.
    pub standalone: bool,
    /// Existing tags chained at the insertion point.
    pub attached: Vec<ExistingTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NoteKind {
    /// Phrase maps to several entries of one type; left untagged.
    Ambiguous {
        index_type: IndexType,
        labels: Vec<String>,
    },
    /// Line carries `% texindex: skip`.
    SkipDirective,
}

/// A candidate that did not become an occurrence, kept for the audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionNote {
    pub phrase: String,
    pub span: Span,
    pub line: usize,
    pub column: usize,
    pub kind: NoteKind,
}

/// Everything Phase 1 learned about one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub doc: u32,
    pub occurrences: Vec<Occurrence>,
    pub notes: Vec<DetectionNote>,
    /// New entries created for heuristic candidates, first occurrence order.
    pub synthesized: Vec<LexiconEntry>,
    pub existing_tags: Vec<ExistingTag>,
}

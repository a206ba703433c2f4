//! texindex candidate detection.
//!
//! Scans the taggable runs of a classified document for lexicon terms
//! (longest match first, word-bounded, whitespace-tolerant), fills the gaps
//! with low-confidence heuristics for names and lexical items, and resolves
//! every candidate through the lexicon normalizer into an [`Occurrence`].
//!
//! Detection is a pure function of the document, its regions and one
//! lexicon version, so documents can be analyzed in parallel.

mod config;
mod detector;
mod error;
mod heuristics;
mod matcher;
mod occurrence;

pub use crate::config::DetectConfig;
pub use crate::detector::Detector;
pub use crate::error::DetectError;
pub use crate::heuristics::{lexical_items, names, HeuristicHit};
pub use crate::matcher::{TermHit, TermMatcher};
pub use crate::occurrence::{
    Candidate, CandidateSource, DetectionNote, DocumentAnalysis, NoteKind, Occurrence,
    OccurrenceId,
};

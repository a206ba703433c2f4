//! texindex lexicon layer.
//!
//! The lexicon is the author's controlled vocabulary: canonical labels per
//! index type, their synonyms, display and sort forms, hierarchy paths and
//! cross-references. It is loaded once from YAML and treated as an explicit,
//! versioned value; every amendment produces a new version.
//!
//! ## What lives here
//!
//! - [`LexiconEntry`] and [`Lexicon`] with YAML load/save
//! - [`Normalizer`]: phrase + provisional type to a canonical entry
//! - [`Lexicon::with_synthesized`] and [`Lexicon::promote`] for entries
//!   created from heuristic candidates
//! - [`Lexicon::apply_suggestions`] for reviewer-proposed changes

mod entry;
mod error;
mod normalize;
mod store;
mod update;

pub use crate::entry::{EntryKey, EntrySource, LexiconEntry, Origin};
pub use crate::error::LexiconError;
pub use crate::normalize::{canonical_form, fold, Normalizer, Resolution};
pub use crate::store::{Lexicon, Promotion, SynonymConflict, Term, TermKind};
pub use crate::update::{
    AppliedChange, LexiconUpdate, SkippedChange, SuggestedChange, SuggestionOutcome,
};

pub use markup::IndexType;

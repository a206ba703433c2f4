//! Phrase normalization: map a detected phrase to its canonical entry.

use markup::IndexType;
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::entry::{EntryKey, EntrySource, LexiconEntry, Origin};
use crate::error::LexiconError;
use crate::store::Lexicon;

/// Comparison key for a phrase: NFC, whitespace collapsed, and lower-cased
/// unless the index type is case-sensitive.
pub fn fold(phrase: &str, index_type: IndexType) -> String {
    let collapsed = phrase
        .nfc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if index_type.is_case_sensitive() {
        collapsed
    } else {
        collapsed.to_lowercase()
    }
}

fn is_acronym_like(word: &str) -> bool {
    word.chars().filter(|c| c.is_uppercase()).count() >= 2
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn decapitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Canonical spelling for a new entry built from `phrase`.
///
/// Subjects are lower-cased except acronyms and capitalised words after the
/// first (proper forms); names are title-cased; lexical items are kept as written.
pub fn canonical_form(phrase: &str, index_type: IndexType) -> String {
    let words: Vec<String> = phrase.nfc().collect::<String>()
        .split_whitespace()
        .map(str::to_owned)
        .collect();
    match index_type {
        IndexType::Lexical => words.join(" "),
        IndexType::Name => words
            .iter()
            .map(|w| capitalize(w))
            .collect::<Vec<_>>()
            .join(" "),
        IndexType::Subject => words
            .iter()
            .enumerate()
            .map(|(i, w)| {
                if is_acronym_like(w) || (i > 0 && w.chars().next().is_some_and(char::is_uppercase))
                {
                    w.clone()
                } else {
                    decapitalize(w)
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Outcome of resolving one phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub key: EntryKey,
    pub origin: Origin,
    /// 1.0 exact label, 0.95 case variant of the label, 0.9 synonym.
    /// Heuristic resolutions carry 0.0; the detector assigns their score.
    pub confidence: f32,
    /// New entry to add to the in-run lexicon when nothing matched.
    pub synthesized: Option<LexiconEntry>,
}

/// Resolves phrases against one lexicon version.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'l> {
    lexicon: &'l Lexicon,
}

impl<'l> Normalizer<'l> {
    pub fn new(lexicon: &'l Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn lexicon(&self) -> &'l Lexicon {
        self.lexicon
    }

    /// Resolve `phrase` for the provisional `index_type`.
    ///
    /// Fails with [`LexiconError::AmbiguousSynonym`] when the phrase names more
    /// than one entry of that type.
    pub fn resolve(&self, phrase: &str, index_type: IndexType) -> Result<Resolution, LexiconError> {
        let label = self.lexicon.label_match(phrase, index_type);
        let synonyms = self.lexicon.synonym_matches(phrase, index_type);

        let mut claimants: Vec<&LexiconEntry> = label.into_iter().collect();
        for entry in &synonyms {
            if !claimants.iter().any(|c| c.label == entry.label) {
                claimants.push(entry);
            }
        }
        if claimants.len() > 1 {
            return Err(LexiconError::AmbiguousSynonym {
                phrase: phrase.to_owned(),
                index_type,
                labels: claimants.iter().map(|e| e.label.clone()).collect(),
            });
        }

        if let Some(entry) = label {
            let collapsed = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
            let confidence = if collapsed == entry.label { 1.0 } else { 0.95 };
            return Ok(Resolution {
                key: entry.key(),
                origin: Origin::LexiconExact,
                confidence,
                synthesized: None,
            });
        }

        if let Some(entry) = synonyms.first() {
            let folded = fold(phrase, index_type);
            let curated = entry
                .synonyms
                .iter()
                .any(|s| fold(s, index_type) == folded);
            let origin = if curated {
                Origin::LexiconSynonym
            } else {
                Origin::LlmSuggested
            };
            return Ok(Resolution {
                key: entry.key(),
                origin,
                confidence: 0.9,
                synthesized: None,
            });
        }

        let label = canonical_form(phrase, index_type);
        debug!(phrase, %index_type, label = %label, "synthesizing entry");
        let entry = LexiconEntry::new(label, index_type).with_source(EntrySource::Synthesized);
        Ok(Resolution {
            key: entry.key(),
            origin: Origin::Heuristic,
            confidence: 0.0,
            synthesized: Some(entry),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Lexicon {
        let mut suggested = LexiconEntry::new("vowel harmony", IndexType::Subject);
        suggested.suggested_synonyms.push("harmony system".into());
        Lexicon::from_entries(vec![
            LexiconEntry::new("finite difference method", IndexType::Subject)
                .with_synonyms(["FD method"]),
            LexiconEntry::new("Chomsky, Noam", IndexType::Name).with_synonyms(["Chomsky"]),
            suggested,
            LexiconEntry::new("phoneme", IndexType::Subject).with_synonyms(["segment"]),
            LexiconEntry::new("morpheme", IndexType::Subject).with_synonyms(["segment"]),
        ])
        .unwrap()
    }

    #[test]
    fn label_matches_are_exact_or_case_variant() {
        let lex = lexicon();
        let norm = Normalizer::new(&lex);
        let exact = norm
            .resolve("finite difference method", IndexType::Subject)
            .unwrap();
        assert_eq!(exact.origin, Origin::LexiconExact);
        assert_eq!(exact.confidence, 1.0);
        let variant = norm
            .resolve("Finite  difference\nmethod", IndexType::Subject)
            .unwrap();
        assert_eq!(variant.key, exact.key);
        assert_eq!(variant.confidence, 0.95);
    }

    #[test]
    fn synonyms_map_to_canonical_label() {
        let lex = lexicon();
        let norm = Normalizer::new(&lex);
        let res = norm.resolve("FD method", IndexType::Subject).unwrap();
        assert_eq!(res.key.label, "finite difference method");
        assert_eq!(res.origin, Origin::LexiconSynonym);
        let suggested = norm.resolve("harmony system", IndexType::Subject).unwrap();
        assert_eq!(suggested.origin, Origin::LlmSuggested);
    }

    #[test]
    fn names_are_case_sensitive() {
        let lex = lexicon();
        let norm = Normalizer::new(&lex);
        assert_eq!(
            norm.resolve("Chomsky", IndexType::Name).unwrap().origin,
            Origin::LexiconSynonym
        );
        let res = norm.resolve("chomsky", IndexType::Name).unwrap();
        assert_eq!(res.origin, Origin::Heuristic);
    }

    #[test]
    fn ambiguous_synonym_is_an_error() {
        let lex = lexicon();
        let err = Normalizer::new(&lex)
            .resolve("segment", IndexType::Subject)
            .unwrap_err();
        assert_eq!(
            err,
            LexiconError::AmbiguousSynonym {
                phrase: "segment".into(),
                index_type: IndexType::Subject,
                labels: vec!["phoneme".into(), "morpheme".into()],
            }
        );
    }

    #[test]
    fn synthesized_entries_get_canonical_casing() {
        let lex = lexicon();
        let norm = Normalizer::new(&lex);
        let res = norm.resolve("noam  chomsky", IndexType::Name).unwrap();
        assert_eq!(res.key.label, "Noam Chomsky");
        assert_eq!(
            res.synthesized.map(|e| e.source),
            Some(EntrySource::Synthesized)
        );
        assert_eq!(canonical_form("Vowel NASA Harmony", IndexType::Subject), "vowel NASA Harmony");
        assert_eq!(canonical_form("*bʰer-", IndexType::Lexical), "*bʰer-");
    }

    #[test]
    fn fold_normalizes_unicode() {
        assert_eq!(
            fold("Cafe\u{301}", IndexType::Subject),
            fold("café", IndexType::Subject)
        );
    }
}

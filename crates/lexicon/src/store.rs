//! The versioned lexicon and its YAML persistence.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use markup::IndexType;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entry::{EntryKey, EntrySource, LexiconEntry};
use crate::error::LexiconError;
use crate::normalize::fold;

/// Kind of lexicon string a term came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TermKind {
    Label,
    Synonym,
    SuggestedSynonym,
}

/// A searchable lexicon string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub text: String,
    pub index_type: IndexType,
    pub kind: TermKind,
}

/// One folded phrase claimed by several entries of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymConflict {
    pub index_type: IndexType,
    pub phrase: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LexiconFile {
    #[serde(default = "default_version")]
    version: u64,
    #[serde(default)]
    entries: Vec<LexiconEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    rules: BTreeMap<String, serde_yaml::Value>,
}

fn default_version() -> u64 {
    1
}

/// Result of promoting synthesized entries.
#[derive(Debug, Clone)]
pub struct Promotion {
    pub lexicon: Lexicon,
    pub promoted: Vec<EntryKey>,
}

/// Versioned, immutable lexicon.
///
/// Every amendment (`with_synthesized`, `promote`, `apply_suggestions`)
/// returns a new value with `version + 1`; nothing is changed in place.
#[derive(Debug, Clone)]
pub struct Lexicon {
    version: u64,
    entries: Vec<LexiconEntry>,
    rules: BTreeMap<String, serde_yaml::Value>,
    labels: HashMap<(IndexType, String), usize>,
    synonyms: HashMap<(IndexType, String), Vec<usize>>,
    conflicts: Vec<SynonymConflict>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::empty()
    }
}

impl Lexicon {
    pub fn empty() -> Self {
        Self {
            version: 1,
            entries: Vec::new(),
            rules: BTreeMap::new(),
            labels: HashMap::new(),
            synonyms: HashMap::new(),
            conflicts: Vec::new(),
        }
    }

    pub fn from_entries(entries: Vec<LexiconEntry>) -> Result<Self, LexiconError> {
        Self::build(1, entries, BTreeMap::new())
    }

    fn build(
        version: u64,
        entries: Vec<LexiconEntry>,
        rules: BTreeMap<String, serde_yaml::Value>,
    ) -> Result<Self, LexiconError> {
        let mut labels = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            if entry.label.trim().is_empty() {
                return Err(LexiconError::EmptyLabel { index });
            }
            let folded = fold(&entry.label, entry.index_type);
            if labels.insert((entry.index_type, folded), index).is_some() {
                return Err(LexiconError::DuplicateLabel {
                    index_type: entry.index_type,
                    label: entry.label.clone(),
                });
            }
        }

        let mut synonyms: HashMap<(IndexType, String), Vec<usize>> = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            let all = entry.synonyms.iter().chain(&entry.suggested_synonyms);
            for synonym in all {
                if synonym.trim().is_empty() {
                    continue;
                }
                let slot = synonyms
                    .entry((entry.index_type, fold(synonym, entry.index_type)))
                    .or_default();
                if !slot.contains(&index) {
                    slot.push(index);
                }
            }
        }

        let mut conflicts = Vec::new();
        let mut keys: Vec<&(IndexType, String)> = synonyms.keys().collect();
        keys.sort();
        for key in keys {
            let mut claimants: BTreeSet<usize> = synonyms[key].iter().copied().collect();
            if let Some(&label_owner) = labels.get(key) {
                claimants.insert(label_owner);
            }
            if claimants.len() > 1 {
                conflicts.push(SynonymConflict {
                    index_type: key.0,
                    phrase: key.1.clone(),
                    labels: claimants
                        .iter()
                        .map(|&i| entries[i].label.clone())
                        .collect(),
                });
            }
        }
        for conflict in &conflicts {
            warn!(
                phrase = %conflict.phrase,
                index_type = %conflict.index_type,
                labels = ?conflict.labels,
                "lexicon phrase maps to several entries"
            );
        }

        Ok(Self {
            version,
            entries,
            rules,
            labels,
            synonyms,
            conflicts,
        })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, LexiconError> {
        let file: LexiconFile =
            serde_yaml::from_str(yaml).map_err(|e| LexiconError::Parse(e.to_string()))?;
        Self::build(file.version, file.entries, file.rules)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LexiconError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| LexiconError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let lexicon = Self::from_yaml(&content)?;
        info!(
            path = %path.display(),
            entries = lexicon.len(),
            version = lexicon.version,
            "lexicon loaded"
        );
        Ok(lexicon)
    }

    /// YAML for the persisted part of the lexicon. Synthesized entries that
    /// were never promoted are left out.
    pub fn to_yaml(&self) -> Result<String, LexiconError> {
        let file = LexiconFile {
            version: self.version,
            entries: self
                .entries
                .iter()
                .filter(|e| e.source != EntrySource::Synthesized)
                .cloned()
                .collect(),
            rules: self.rules.clone(),
        };
        serde_yaml::to_string(&file).map_err(|e| LexiconError::Parse(e.to_string()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), LexiconError> {
        let path = path.as_ref();
        let yaml = self.to_yaml()?;
        fs::write(path, yaml).map_err(|e| LexiconError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn entries(&self) -> &[LexiconEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rules(&self) -> &BTreeMap<String, serde_yaml::Value> {
        &self.rules
    }

    pub fn rule(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.rules.get(key)
    }

    pub fn conflicts(&self) -> &[SynonymConflict] {
        &self.conflicts
    }

    pub fn get(&self, key: &EntryKey) -> Option<&LexiconEntry> {
        self.labels
            .get(&(key.index_type, fold(&key.label, key.index_type)))
            .map(|&i| &self.entries[i])
    }

    /// Entry whose label folds to `phrase`.
    pub(crate) fn label_match(&self, phrase: &str, index_type: IndexType) -> Option<&LexiconEntry> {
        self.labels
            .get(&(index_type, fold(phrase, index_type)))
            .map(|&i| &self.entries[i])
    }

    /// Entries listing `phrase` as a synonym.
    pub(crate) fn synonym_matches(&self, phrase: &str, index_type: IndexType) -> Vec<&LexiconEntry> {
        self.synonyms
            .get(&(index_type, fold(phrase, index_type)))
            .map(|indices| indices.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    /// Every label and synonym the detector should search for, longest first.
    pub fn terms(&self) -> Vec<Term> {
        let mut seen = BTreeSet::new();
        let mut terms = Vec::new();
        for entry in &self.entries {
            let strings = std::iter::once((&entry.label, TermKind::Label))
                .chain(entry.synonyms.iter().map(|s| (s, TermKind::Synonym)))
                .chain(
                    entry
                        .suggested_synonyms
                        .iter()
                        .map(|s| (s, TermKind::SuggestedSynonym)),
                );
            for (text, kind) in strings {
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if text.is_empty() {
                    continue;
                }
                if seen.insert((entry.index_type, fold(&text, entry.index_type), kind)) {
                    terms.push(Term {
                        text,
                        index_type: entry.index_type,
                        kind,
                    });
                }
            }
        }
        terms.sort_by(|a, b| {
            b.text
                .chars()
                .count()
                .cmp(&a.text.chars().count())
                .then_with(|| a.index_type.cmp(&b.index_type))
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| a.text.cmp(&b.text))
        });
        terms
    }

    /// New version including `entries` whose key is not already present.
    /// Existing entries are never overwritten.
    pub fn with_synthesized(&self, entries: &[LexiconEntry]) -> Result<Lexicon, LexiconError> {
        let mut merged = self.entries.clone();
        let mut known: BTreeSet<(IndexType, String)> = self
            .entries
            .iter()
            .map(|e| (e.index_type, fold(&e.label, e.index_type)))
            .collect();
        for entry in entries {
            if known.insert((entry.index_type, fold(&entry.label, entry.index_type))) {
                merged.push(entry.clone().with_source(EntrySource::Synthesized));
            }
        }
        Self::build(self.version + 1, merged, self.rules.clone())
    }

    /// Mark synthesized entries as promoted so `save` persists them.
    /// `selection` limits promotion to the given keys; `None` promotes all.
    pub fn promote(&self, selection: Option<&[EntryKey]>) -> Result<Promotion, LexiconError> {
        let mut entries = self.entries.clone();
        let mut promoted = Vec::new();
        for entry in &mut entries {
            if entry.source != EntrySource::Synthesized {
                continue;
            }
            let key = entry.key();
            if selection.is_some_and(|keys| !keys.contains(&key)) {
                continue;
            }
            entry.source = EntrySource::Promoted;
            promoted.push(key);
        }
        info!(promoted = promoted.len(), "synthesized entries promoted");
        Ok(Promotion {
            lexicon: Self::build(self.version + 1, entries, self.rules.clone())?,
            promoted,
        })
    }

    pub(crate) fn rebuild(&self, entries: Vec<LexiconEntry>) -> Result<Lexicon, LexiconError> {
        Self::build(self.version + 1, entries, self.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const YAML: &str = r#"
version: 3
entries:
  - label: finite difference method
    type: subject
    synonyms: [FD method]
  - label: FDM
    see: finite difference method
  - label: Chomsky, Noam
    type: name
    synonyms: [Chomsky]
rules:
  prefer_ranges: true
"#;

    #[test]
    fn loads_yaml_with_rules() {
        let lex = Lexicon::from_yaml(YAML).unwrap();
        assert_eq!(lex.version(), 3);
        assert_eq!(lex.len(), 3);
        assert!(lex.rule("prefer_ranges").is_some());
        assert!(lex
            .get(&EntryKey::new(IndexType::Subject, "Finite Difference Method"))
            .is_some());
        assert!(lex.conflicts().is_empty());
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let err = Lexicon::from_entries(vec![
            LexiconEntry::new("grammar", IndexType::Subject),
            LexiconEntry::new("Grammar", IndexType::Subject),
        ])
        .unwrap_err();
        assert!(matches!(err, LexiconError::DuplicateLabel { .. }));
        assert!(Lexicon::from_entries(vec![
            LexiconEntry::new("Grammar", IndexType::Subject),
            LexiconEntry::new("Grammar", IndexType::Name),
        ])
        .is_ok());
    }

    #[test]
    fn shared_synonym_is_a_recorded_conflict() {
        let lex = Lexicon::from_entries(vec![
            LexiconEntry::new("phoneme", IndexType::Subject).with_synonyms(["segment"]),
            LexiconEntry::new("morpheme", IndexType::Subject).with_synonyms(["segment"]),
        ])
        .unwrap();
        assert_eq!(lex.conflicts().len(), 1);
        assert_eq!(lex.conflicts()[0].labels, vec!["phoneme", "morpheme"]);
    }

    #[test]
    fn terms_are_longest_first() {
        let lex = Lexicon::from_yaml(YAML).unwrap();
        let terms = lex.terms();
        assert_eq!(terms[0].text, "finite difference method");
        let lens: Vec<usize> = terms.iter().map(|t| t.text.chars().count()).collect();
        assert!(lens.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn synthesized_entries_need_promotion_to_persist() {
        let lex = Lexicon::from_yaml(YAML).unwrap();
        let amended = lex
            .with_synthesized(&[
                LexiconEntry::new("Noam Chomsky", IndexType::Name),
                LexiconEntry::new("FDM", IndexType::Subject),
            ])
            .unwrap();
        assert_eq!(amended.version(), 4);
        assert_eq!(amended.len(), 4);
        assert!(!amended.to_yaml().unwrap().contains("Noam Chomsky"));

        let promotion = amended.promote(None).unwrap();
        assert_eq!(
            promotion.promoted,
            vec![EntryKey::new(IndexType::Name, "Noam Chomsky")]
        );

        let dir = tempdir().unwrap();
        let path = dir.path().join("lexicon.yaml");
        promotion.lexicon.save(&path).unwrap();
        let reloaded = Lexicon::from_file(&path).unwrap();
        assert_eq!(reloaded.version(), 5);
        let entry = reloaded
            .get(&EntryKey::new(IndexType::Name, "Noam Chomsky"))
            .unwrap();
        assert_eq!(entry.source, EntrySource::Promoted);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Lexicon::from_file("/nonexistent/lexicon.yaml").unwrap_err();
        assert!(matches!(err, LexiconError::Io { .. }));
    }
}

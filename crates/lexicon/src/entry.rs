//! Lexicon entry model.

use std::fmt;

use markup::{IndexKey, IndexType, KeySegment};
use serde::{Deserialize, Deserializer, Serialize};

/// Where an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    /// Written by the author.
    #[default]
    Curated,
    /// Created during a run from a heuristic candidate. Not persisted.
    Synthesized,
    /// Proposed by an external reviewer and applied on request.
    Suggested,
    /// Synthesized, then explicitly promoted into the lexicon file.
    Promoted,
}

/// How an occurrence was attributed to its entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    Heuristic,
    LlmSuggested,
    LexiconSynonym,
    LexiconExact,
}

impl Origin {
    /// Origins backed by author-curated lexicon data.
    pub fn is_curated(self) -> bool {
        matches!(self, Origin::LexiconExact | Origin::LexiconSynonym)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Heuristic => "heuristic",
            Origin::LlmSuggested => "llm-suggested",
            Origin::LexiconSynonym => "lexicon-synonym",
            Origin::LexiconExact => "lexicon-exact",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an entry: label is unique per index type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    pub index_type: IndexType,
    pub label: String,
}

impl EntryKey {
    pub fn new(index_type: IndexType, label: impl Into<String>) -> Self {
        Self {
            index_type,
            label: label.into(),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index_type, self.label)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<OneOrMany>::deserialize(deserializer)?;
    Ok(match value {
        None => Vec::new(),
        Some(OneOrMany::One(s)) if s.trim().is_empty() => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_curated(source: &EntrySource) -> bool {
    *source == EntrySource::Curated
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconEntry {
    #[serde(alias = "term")]
    pub label: String,
    #[serde(rename = "type", default)]
    pub index_type: IndexType,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    /// Synonyms added from reviewer suggestions; matches on them carry the
    /// `llm-suggested` origin.
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub suggested_synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    /// Parent path, root first. The entry itself is the leaf.
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub hierarchy: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub see: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub see_also: Vec<String>,
    /// Every occurrence gets its own direct tag; no range or cross-ref treatment.
    #[serde(default, skip_serializing_if = "is_false")]
    pub standalone: bool,
    #[serde(default, skip_serializing_if = "is_curated")]
    pub source: EntrySource,
}

impl LexiconEntry {
    pub fn new(label: impl Into<String>, index_type: IndexType) -> Self {
        Self {
            label: label.into(),
            index_type,
            synonyms: Vec::new(),
            suggested_synonyms: Vec::new(),
            display: None,
            sort_key: None,
            hierarchy: Vec::new(),
            see: Vec::new(),
            see_also: Vec::new(),
            standalone: false,
            source: EntrySource::Curated,
        }
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms.extend(synonyms.into_iter().map(Into::into));
        self
    }

    pub fn with_hierarchy<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hierarchy = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_see(mut self, target: impl Into<String>) -> Self {
        self.see.push(target.into());
        self
    }

    pub fn with_see_also(mut self, target: impl Into<String>) -> Self {
        self.see_also.push(target.into());
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    pub fn with_standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn with_source(mut self, source: EntrySource) -> Self {
        self.source = source;
        self
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.index_type, self.label.clone())
    }

    /// The makeindex key this entry is filed under.
    pub fn index_key(&self) -> IndexKey {
        let leaf = match (&self.sort_key, &self.display) {
            (Some(sort), Some(display)) => KeySegment::sorted(sort.clone(), display.clone()),
            (None, Some(display)) => KeySegment::sorted(self.label.clone(), display.clone()),
            (Some(sort), None) => KeySegment::sorted(sort.clone(), self.label.clone()),
            (None, None) => KeySegment::plain(self.label.clone()),
        };
        IndexKey::from_path(&self.hierarchy, leaf)
    }

    /// `see` targets joined into one cross-reference target, if any.
    pub fn see_target(&self) -> Option<String> {
        if self.see.is_empty() {
            None
        } else {
            Some(self.see.join(", "))
        }
    }
}

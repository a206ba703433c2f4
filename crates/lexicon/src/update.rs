//! Applying reviewer suggestions to a lexicon, with a before/after diff.

use markup::IndexType;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entry::{EntryKey, EntrySource, LexiconEntry};
use crate::error::LexiconError;
use crate::normalize::fold;
use crate::store::Lexicon;

/// Field changes proposed for one entry. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub see: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub see_also: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub index_type: Option<IndexType>,
}

impl LexiconUpdate {
    pub fn is_empty(&self) -> bool {
        *self == LexiconUpdate::default()
    }
}

/// A suggestion addressed to an existing entry, or to a new one when
/// `target` is `None` (then `canonical` names it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedChange {
    pub target: Option<EntryKey>,
    pub update: LexiconUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedChange {
    pub before: Option<LexiconEntry>,
    pub after: LexiconEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedChange {
    pub change: SuggestedChange,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct SuggestionOutcome {
    pub lexicon: Lexicon,
    pub applied: Vec<AppliedChange>,
    pub skipped: Vec<SkippedChange>,
}

fn merge_sorted(target: &mut Vec<String>, extra: impl IntoIterator<Item = String>) {
    for item in extra {
        let item = item.trim().to_owned();
        if !item.is_empty() && !target.contains(&item) {
            target.push(item);
        }
    }
    target.sort();
}

fn apply_update(entry: &mut LexiconEntry, update: &LexiconUpdate) {
    if let Some(canonical) = update.canonical.as_deref().map(str::trim) {
        if !canonical.is_empty() && canonical != entry.label {
            let old = std::mem::replace(&mut entry.label, canonical.to_owned());
            entry.synonyms.retain(|s| s != canonical);
            merge_sorted(&mut entry.synonyms, [old]);
        }
    }
    if let Some(display) = update.display.as_ref().filter(|d| !d.trim().is_empty()) {
        entry.display = Some(display.clone());
    }
    if let Some(hierarchy) = update.hierarchy.as_ref().filter(|h| !h.is_empty()) {
        entry.hierarchy = hierarchy.clone();
    }
    if !update.synonyms.is_empty() {
        let index_type = entry.index_type;
        let known: Vec<String> = std::iter::once(&entry.label)
            .chain(&entry.synonyms)
            .map(|s| fold(s, index_type))
            .collect();
        let fresh = update
            .synonyms
            .iter()
            .filter(|s| !known.contains(&fold(s, index_type)))
            .cloned();
        merge_sorted(&mut entry.suggested_synonyms, fresh);
    }
    if !update.see.is_empty() {
        entry.see = update.see.clone();
    }
    if !update.see_also.is_empty() {
        entry.see_also = update.see_also.clone();
    }
    if let Some(index_type) = update.index_type {
        entry.index_type = index_type;
    }
}

impl Lexicon {
    /// Apply suggestions to a new lexicon version.
    ///
    /// A renamed entry keeps its old label as a synonym; suggested synonyms are
    /// recorded separately from curated ones. Changes that would collide with
    /// another entry's label, or target an unknown entry, are skipped.
    pub fn apply_suggestions(
        &self,
        changes: &[SuggestedChange],
    ) -> Result<SuggestionOutcome, LexiconError> {
        let mut entries = self.entries().to_vec();
        let mut applied = Vec::new();
        let mut skipped = Vec::new();

        let label_taken = |entries: &[LexiconEntry], candidate: &LexiconEntry, skip: Option<usize>| {
            entries.iter().enumerate().any(|(i, e)| {
                Some(i) != skip
                    && e.index_type == candidate.index_type
                    && fold(&e.label, e.index_type) == fold(&candidate.label, candidate.index_type)
            })
        };

        for change in changes {
            if change.update.is_empty() {
                continue;
            }
            match &change.target {
                Some(key) => {
                    let Some(idx) = entries.iter().position(|e| {
                        e.index_type == key.index_type
                            && fold(&e.label, e.index_type) == fold(&key.label, key.index_type)
                    }) else {
                        skipped.push(SkippedChange {
                            change: change.clone(),
                            reason: LexiconError::UnknownEntry(key.to_string()).to_string(),
                        });
                        continue;
                    };
                    let before = entries[idx].clone();
                    let mut after = before.clone();
                    apply_update(&mut after, &change.update);
                    if after == before {
                        continue;
                    }
                    if label_taken(entries.as_slice(), &after, Some(idx)) {
                        skipped.push(SkippedChange {
                            change: change.clone(),
                            reason: format!("label `{}` already exists", after.label),
                        });
                        continue;
                    }
                    entries[idx] = after.clone();
                    applied.push(AppliedChange {
                        before: Some(before),
                        after,
                    });
                }
                None => {
                    let Some(label) = change
                        .update
                        .canonical
                        .as_deref()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                    else {
                        skipped.push(SkippedChange {
                            change: change.clone(),
                            reason: "new entry without a canonical label".into(),
                        });
                        continue;
                    };
                    let mut entry = LexiconEntry::new(
                        label,
                        change.update.index_type.unwrap_or_default(),
                    )
                    .with_source(EntrySource::Suggested);
                    apply_update(&mut entry, &change.update);
                    if label_taken(entries.as_slice(), &entry, None) {
                        skipped.push(SkippedChange {
                            change: change.clone(),
                            reason: format!("label `{}` already exists", entry.label),
                        });
                        continue;
                    }
                    entries.push(entry.clone());
                    applied.push(AppliedChange {
                        before: None,
                        after: entry,
                    });
                }
            }
        }

        for skip in &skipped {
            warn!(reason = %skip.reason, "suggestion skipped");
        }
        let lexicon = self.rebuild(entries)?;
        info!(
            applied = applied.len(),
            skipped = skipped.len(),
            version = lexicon.version(),
            "suggestions applied"
        );
        Ok(SuggestionOutcome {
            lexicon,
            applied,
            skipped,
        })
    }
}

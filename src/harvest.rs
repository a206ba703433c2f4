//! Reading back the index tags already present in a corpus: a lexicon
//! built from them, and a per-file census.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use lexicon::{fold, EntryKey, IndexType, Lexicon, LexiconEntry};
use markup::{classify, parse, ExistingTag, MarkupError, Relation, SkipRegistry};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::corpus::SourceDoc;
use crate::error::PipelineError;

#[derive(Debug)]
pub struct Harvest {
    pub lexicon: Lexicon,
    /// Documents that could not be parsed, by name.
    pub failed: Vec<(String, MarkupError)>,
}

fn existing_tags(
    sources: &[SourceDoc],
    registry: &SkipRegistry,
) -> Vec<(String, Result<Vec<ExistingTag>, MarkupError>)> {
    sources
        .par_iter()
        .map(|source| {
            let tags = parse(&source.text, registry).map(|doc| classify(&doc).existing_tags);
            if let Err(err) = &tags {
                warn!(document = %source.name(), error = %err, "skipped while harvesting");
            }
            (source.name(), tags)
        })
        .collect()
}

fn merge(entry: &mut LexiconEntry, tag: &ExistingTag) {
    let push = |list: &mut Vec<String>, target: &str| {
        let target = target.trim();
        if !target.is_empty() && !list.iter().any(|t| t == target) {
            list.push(target.to_owned());
        }
    };
    match &tag.argument.relation {
        Relation::See(target) => push(&mut entry.see, target),
        Relation::SeeAlso(target) => push(&mut entry.see_also, target),
        _ => {}
    }
}

/// Build a lexicon from the tags found in `sources`.
///
/// One entry per index type and folded leaf label, first occurrence wins
/// for label, sort key and hierarchy; cross-references of later tags are
/// merged in.
pub fn harvest_lexicon(
    sources: &[SourceDoc],
    registry: &SkipRegistry,
) -> Result<Harvest, PipelineError> {
    let mut failed = Vec::new();
    let mut order: Vec<(IndexType, String)> = Vec::new();
    let mut entries: BTreeMap<(IndexType, String), LexiconEntry> = BTreeMap::new();

    for (name, tags) in existing_tags(sources, registry) {
        let tags = match tags {
            Ok(tags) => tags,
            Err(err) => {
                failed.push((name, err));
                continue;
            }
        };
        for tag in tags {
            let Some(leaf) = tag.argument.key.leaf() else {
                continue;
            };
            let label = leaf.display.trim();
            if label.is_empty() {
                continue;
            }
            let id = (tag.index_type, fold(label, tag.index_type));
            let entry = entries.entry(id.clone()).or_insert_with(|| {
                order.push(id.clone());
                let segments = &tag.argument.key.segments;
                let mut entry = LexiconEntry::new(label, tag.index_type).with_hierarchy(
                    segments[..segments.len() - 1]
                        .iter()
                        .map(|s| s.display.trim().to_owned()),
                );
                if let Some(sort) = leaf.sort.as_deref().filter(|s| !s.is_empty()) {
                    entry = entry.with_sort_key(sort);
                }
                entry
            });
            merge(entry, &tag);
        }
    }

    let ordered: Vec<LexiconEntry> = order
        .iter()
        .filter_map(|id| entries.remove(id))
        .collect();
    info!(entries = ordered.len(), failed = failed.len(), "lexicon harvested");
    Ok(Harvest {
        lexicon: Lexicon::from_entries(ordered)?,
        failed,
    })
}

/// Existing tags of one document, counted by index type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileCensus {
    pub file: String,
    pub tags: usize,
    pub by_type: BTreeMap<IndexType, BTreeSet<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagCensus {
    pub files: Vec<FileCensus>,
    pub failed: Vec<String>,
    pub total_tags: usize,
    pub unique_entries: usize,
}

/// Count the tags already in a corpus.
pub fn tag_census(sources: &[SourceDoc], registry: &SkipRegistry) -> TagCensus {
    let mut census = TagCensus::default();
    let mut unique: BTreeSet<EntryKey> = BTreeSet::new();
    for (name, tags) in existing_tags(sources, registry) {
        let Ok(tags) = tags else {
            census.failed.push(name);
            continue;
        };
        if tags.is_empty() {
            continue;
        }
        let mut file = FileCensus {
            file: name,
            tags: tags.len(),
            by_type: BTreeMap::new(),
        };
        for tag in &tags {
            let label = tag.argument.key.render();
            unique.insert(EntryKey::new(tag.index_type, label.clone()));
            file.by_type.entry(tag.index_type).or_default().insert(label);
        }
        census.total_tags += file.tags;
        census.files.push(file);
    }
    census.unique_entries = unique.len();
    census
}

impl TagCensus {
    /// Text summary listing the first `limit` entries of each type per file.
    pub fn render_text(&self, limit: usize) -> String {
        let mut out = String::new();
        for file in &self.files {
            let _ = writeln!(out, "{} ({} tags)", file.file, file.tags);
            for (index_type, labels) in &file.by_type {
                let shown: Vec<&str> = labels.iter().take(limit).map(String::as_str).collect();
                let _ = write!(out, "  {index_type}: {}", shown.join(", "));
                if labels.len() > limit {
                    let _ = write!(out, " (+{} more)", labels.len() - limit);
                }
                out.push('\n');
            }
        }
        for name in &self.failed {
            let _ = writeln!(out, "{name}: not parsed");
        }
        let _ = writeln!(
            out,
            "total tags: {}, unique entries: {}",
            self.total_tags, self.unique_entries
        );
        out
    }
}

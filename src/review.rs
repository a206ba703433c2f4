//! Applying reviewer output: dropped tags out of the corpus, accepted
//! suggestions into a new lexicon version.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use assist::{JudgeReport, SuggestionReport};
use lexicon::{Lexicon, LexiconEntry, SuggestionOutcome};
use tracing::{info, warn};
use writer::{remove_tags, RemovalOutcome, TagRemoval};

use crate::corpus::SourceDoc;
use crate::error::PipelineError;

/// Removals per file for every tag the report drops.
pub fn judgment_removals(report: &JudgeReport) -> BTreeMap<String, Vec<TagRemoval>> {
    let mut out: BTreeMap<String, Vec<TagRemoval>> = BTreeMap::new();
    for item in report.dropped() {
        out.entry(item.file.clone()).or_default().push(TagRemoval {
            start: item.span.start,
            end: item.span.end,
            text: item.tag.clone(),
            line: item.line,
        });
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct JudgmentApplied {
    pub path: PathBuf,
    pub outcome: RemovalOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JudgmentSummary {
    pub documents: Vec<JudgmentApplied>,
    /// Files named by the report that are not part of the corpus.
    pub unknown_files: Vec<String>,
}

impl JudgmentSummary {
    pub fn removed(&self) -> usize {
        self.documents.iter().map(|d| d.outcome.removed).sum()
    }

    pub fn missing(&self) -> usize {
        self.documents.iter().map(|d| d.outcome.missing.len()).sum()
    }
}

/// Remove every dropped tag from the documents it belongs to.
///
/// Report files are matched against [`SourceDoc::name`], so the corpus must
/// be loaded from the same root the judgment run used.
pub fn apply_judgment(sources: &[SourceDoc], report: &JudgeReport) -> JudgmentSummary {
    let mut removals = judgment_removals(report);
    let mut summary = JudgmentSummary::default();
    for source in sources {
        let Some(list) = removals.remove(&source.name()) else {
            continue;
        };
        let outcome = remove_tags(&source.text, &list);
        if !outcome.missing.is_empty() {
            warn!(
                document = %source.name(),
                missing = outcome.missing.len(),
                "dropped tags no longer found"
            );
        }
        summary.documents.push(JudgmentApplied {
            path: source.path.clone(),
            outcome,
        });
    }
    summary.unknown_files = removals.into_keys().collect();
    info!(
        removed = summary.removed(),
        missing = summary.missing(),
        unknown_files = summary.unknown_files.len(),
        "judgment applied"
    );
    summary
}

/// Apply the suggestions of a report to a new lexicon version.
pub fn apply_report(
    lexicon: &Lexicon,
    report: &SuggestionReport,
) -> Result<SuggestionOutcome, PipelineError> {
    let outcome = lexicon.apply_suggestions(&report.changes())?;
    info!(
        applied = outcome.applied.len(),
        skipped = outcome.skipped.len(),
        version = outcome.lexicon.version(),
        "suggestions applied"
    );
    Ok(outcome)
}

fn describe(entry: &LexiconEntry) -> String {
    let mut out = format!("{} [{}]", entry.label, entry.index_type);
    let lists = [
        ("synonyms", &entry.synonyms),
        ("suggested", &entry.suggested_synonyms),
        ("hierarchy", &entry.hierarchy),
        ("see", &entry.see),
        ("see also", &entry.see_also),
    ];
    for (name, list) in lists {
        if !list.is_empty() {
            let _ = write!(out, " {name}: {}", list.join(" / "));
        }
    }
    if let Some(display) = &entry.display {
        let _ = write!(out, " display: {display}");
    }
    out
}

/// Before/after listing of an applied report.
pub fn render_suggestion_diff(outcome: &SuggestionOutcome) -> String {
    let mut out = String::new();
    for change in &outcome.applied {
        match &change.before {
            Some(before) => {
                let _ = writeln!(out, "- {}", describe(before));
            }
            None => {
                let _ = writeln!(out, "- (new entry)");
            }
        }
        let _ = writeln!(out, "+ {}", describe(&change.after));
    }
    for skipped in &outcome.skipped {
        let target = skipped
            .change
            .target
            .as_ref()
            .map_or_else(|| "(new entry)".to_owned(), ToString::to_string);
        let _ = writeln!(out, "! skipped {target}: {}", skipped.reason);
    }
    out
}

//! Audit reporting: one record per decision the pipeline made.
//!
//! Records are grouped by document in corpus order and sorted by offset
//! within a document, so two runs over the same input produce identical
//! reports.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use detect::{NoteKind, Occurrence};
use reason::{DecisionKind, TagPlan};
use serde::{Deserialize, Serialize};
use writer::{Mode, WriteAction};

use crate::error::{DocumentFailure, PipelineError};
use crate::pipeline::{DocumentOutput, Phase1Snapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    /// `inserted`, `suggested`, `deferred`, `already-present`, `rejected`,
    /// a reasoning decision such as `range-interior`, a detection note
    /// (`ambiguous`, `skip-directive`), or `failed`.
    pub action: String,
    pub phrase: String,
    pub label: String,
    /// Planning rule or tag relation, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub documents: usize,
    pub failed: usize,
    pub changed: usize,
    pub planned: usize,
    pub conflicts: usize,
    pub synthesized: usize,
    /// Record count per action.
    pub actions: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub mode: Mode,
    pub lexicon_version: u64,
    pub summary: AuditSummary,
    pub records: Vec<AuditRecord>,
}

struct Located<'a> {
    file: &'a str,
    outline: &'a markup::Outline,
}

impl Located<'_> {
    fn record(&self, offset: usize, action: &str) -> AuditRecord {
        let (line, column) = self.outline.line_col(offset);
        AuditRecord {
            file: self.file.to_owned(),
            line,
            column,
            offset,
            action: action.to_owned(),
            phrase: String::new(),
            label: String::new(),
            relation: None,
            tag: None,
            reason: String::new(),
            confidence: None,
            origin: None,
        }
    }

    fn for_occurrence(&self, occurrence: &Occurrence, action: &str) -> AuditRecord {
        AuditRecord {
            phrase: occurrence.phrase.clone(),
            label: occurrence.entry.label.clone(),
            confidence: Some(occurrence.confidence),
            origin: Some(occurrence.origin.as_str().to_owned()),
            ..self.record(occurrence.insert_at, action)
        }
    }
}

fn decision_reason(kind: &DecisionKind) -> String {
    match kind {
        DecisionKind::Suppressed => "dropped by reviewer judgment".into(),
        DecisionKind::SamePoint => "entry already tagged at this point".into(),
        DecisionKind::Redirected { target } => format!("see {target} is tagged elsewhere"),
        DecisionKind::SeeAlreadyPresent { target } => {
            format!("a see {target} tag already exists in the corpus")
        }
        DecisionKind::RangeInterior { group } => format!("inside range group {group}"),
        DecisionKind::CoveredByExistingRange => "inside an existing range of the entry".into(),
        DecisionKind::Conflict { existing } => format!("conflicts with existing tag {existing}"),
    }
}

impl AuditReport {
    /// Collect every write record, decision, detection note and failure of
    /// a run.
    pub fn build(
        snapshot: &Phase1Snapshot,
        plan: &TagPlan,
        outputs: &[DocumentOutput],
        mode: Mode,
    ) -> AuditReport {
        let mut records = Vec::new();
        for state in &snapshot.documents {
            let analyzed = match &state.result {
                Ok(analyzed) => analyzed,
                Err(err) => {
                    let line = match err {
                        markup::MarkupError::MalformedStructure { line, .. } => *line,
                        markup::MarkupError::InvalidConfig(_) => 0,
                    };
                    records.push(AuditRecord {
                        file: state.name.clone(),
                        line,
                        column: 0,
                        offset: err.offset().unwrap_or(0),
                        action: "failed".into(),
                        phrase: String::new(),
                        label: String::new(),
                        relation: None,
                        tag: None,
                        reason: err.to_string(),
                        confidence: None,
                        origin: None,
                    });
                    continue;
                }
            };
            let at = Located {
                file: &state.name,
                outline: &analyzed.outline,
            };
            let mut doc_records = Vec::new();

            let output = outputs.iter().find(|o| o.doc == state.doc);
            match output.map(|o| &o.result) {
                Some(Ok(outcome)) => {
                    for written in &outcome.records {
                        let occurrence = snapshot.occurrence(written.occurrence);
                        let reason = match &written.action {
                            WriteAction::Rejected(reason) => reason.clone(),
                            _ => String::new(),
                        };
                        doc_records.push(AuditRecord {
                            phrase: occurrence.map(|o| o.phrase.clone()).unwrap_or_default(),
                            label: occurrence.map(|o| o.entry.label.clone()).unwrap_or_default(),
                            relation: Some(written.rule.as_str().to_owned()),
                            tag: Some(written.rendered.clone()),
                            reason,
                            confidence: Some(written.confidence),
                            origin: Some(written.origin.as_str().to_owned()),
                            ..at.record(written.offset, written.action.as_str())
                        });
                    }
                }
                Some(Err(DocumentFailure::Writer(err))) => {
                    doc_records.push(AuditRecord {
                        reason: err.to_string(),
                        ..at.record(0, "failed")
                    });
                }
                Some(Err(DocumentFailure::Markup(_))) | None => {}
            }

            for decision in plan.decisions_for(state.doc) {
                if let Some(occurrence) = snapshot.occurrence(decision.occurrence) {
                    doc_records.push(AuditRecord {
                        reason: decision_reason(&decision.kind),
                        ..at.for_occurrence(occurrence, decision.kind.as_str())
                    });
                }
            }

            for note in &analyzed.analysis.notes {
                let (action, label, reason) = match &note.kind {
                    NoteKind::Ambiguous { index_type, labels } => (
                        "ambiguous",
                        String::new(),
                        format!("{index_type} phrase maps to {}", labels.join(", ")),
                    ),
                    NoteKind::SkipDirective => {
                        ("skip-directive", String::new(), "line marked skip".to_owned())
                    }
                };
                doc_records.push(AuditRecord {
                    line: note.line,
                    column: note.column,
                    phrase: note.phrase.clone(),
                    label,
                    reason,
                    ..at.record(note.span.start, action)
                });
            }

            doc_records.sort_by(|a, b| a.offset.cmp(&b.offset));
            records.extend(doc_records);
        }

        let mut actions: BTreeMap<String, usize> = BTreeMap::new();
        for record in &records {
            *actions.entry(record.action.clone()).or_default() += 1;
        }
        let summary = AuditSummary {
            documents: snapshot.documents.len(),
            failed: outputs.iter().filter(|o| o.result.is_err()).count(),
            changed: outputs.iter().filter(|o| o.changed_text().is_some()).count(),
            planned: plan.tags.len(),
            conflicts: plan.conflicts.len(),
            synthesized: snapshot.synthesized.len(),
            actions,
        };

        AuditReport {
            mode,
            lexicon_version: snapshot.lexicon.version(),
            summary,
            records,
        }
    }

    pub fn to_json(&self) -> Result<String, PipelineError> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Encode(e.to_string()))
    }

    pub fn records_with_action<'a>(
        &'a self,
        action: &'a str,
    ) -> impl Iterator<Item = &'a AuditRecord> {
        self.records.iter().filter(move |r| r.action == action)
    }

    /// Human-readable report, one line per record.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let s = &self.summary;
        let _ = writeln!(
            out,
            "mode {} | lexicon v{} | {} documents, {} failed, {} changed \
             | {} planned, {} conflicts, {} synthesized",
            self.mode.as_str(),
            self.lexicon_version,
            s.documents,
            s.failed,
            s.changed,
            s.planned,
            s.conflicts,
            s.synthesized
        );
        for (action, count) in &s.actions {
            let _ = writeln!(out, "  {action}: {count}");
        }
        for r in &self.records {
            let _ = write!(out, "{}:{}:{}: {}", r.file, r.line, r.column, r.action);
            if let Some(tag) = &r.tag {
                let _ = write!(out, " {tag}");
            } else if !r.label.is_empty() {
                let _ = write!(out, " [{}]", r.label);
            }
            if !r.phrase.is_empty() {
                let _ = write!(out, " \"{}\"", r.phrase);
            }
            if let Some(confidence) = r.confidence {
                let _ = write!(out, " ({confidence:.2})");
            }
            if !r.reason.is_empty() {
                let _ = write!(out, " - {}", r.reason);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexerConfig;
    use crate::corpus::SourceDoc;
    use crate::pipeline::{run_phase1, run_phase2};
    use lexicon::{IndexType, Lexicon, LexiconEntry};
    use std::collections::BTreeSet;

    fn report(sources: &[SourceDoc], mode: Mode) -> AuditReport {
        let lexicon = Lexicon::from_entries(vec![
            LexiconEntry::new("morpheme", IndexType::Subject),
            LexiconEntry::new("clitic", IndexType::Subject),
        ])
        .unwrap();
        let mut config = IndexerConfig::default();
        config.writer.mode = mode;
        let snapshot = run_phase1(sources, &lexicon, &config).unwrap();
        let (plan, outputs) = run_phase2(&snapshot, sources, &config, &BTreeSet::new()).unwrap();
        AuditReport::build(&snapshot, &plan, &outputs, mode)
    }

    #[test]
    fn guide_mode_records_suggestions_with_locations() {
        let sources = vec![SourceDoc::new("ch1.tex", "Intro.\nA morpheme here.\n")];
        let report = report(&sources, Mode::Guide);
        let suggested: Vec<&AuditRecord> = report.records_with_action("suggested").collect();
        assert_eq!(suggested.len(), 1);
        let record = suggested[0];
        assert_eq!(record.file, "ch1.tex");
        assert_eq!(record.line, 2);
        assert_eq!(record.phrase, "morpheme");
        assert_eq!(record.tag.as_deref(), Some("\\sindex{morpheme}"));
        assert_eq!(report.summary.changed, 0);
    }

    #[test]
    fn failures_and_skip_directives_are_reported() {
        let sources = vec![
            SourceDoc::new("a.tex", "A clitic here. % texindex: skip\n"),
            SourceDoc::new("b.tex", "\\begin{quote}\nmorpheme\n"),
        ];
        let report = report(&sources, Mode::Auto);
        assert_eq!(report.records_with_action("skip-directive").count(), 1);
        let failed: Vec<&AuditRecord> = report.records_with_action("failed").collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].file, "b.tex");
        assert_eq!(report.summary.failed, 1);
    }

    #[test]
    fn records_are_ordered_and_reproducible() {
        let sources = vec![
            SourceDoc::new("a.tex", "clitic then morpheme then clitic.\n"),
            SourceDoc::new("b.tex", "morpheme.\n"),
        ];
        let first = report(&sources, Mode::Auto);
        let second = report(&sources, Mode::Auto);
        assert_eq!(first, second);
        let files: Vec<&str> = first.records.iter().map(|r| r.file.as_str()).collect();
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);
        let a_offsets: Vec<usize> = first
            .records
            .iter()
            .filter(|r| r.file == "a.tex")
            .map(|r| r.offset)
            .collect();
        assert!(a_offsets.windows(2).all(|w| w[0] <= w[1]));
        assert!(first.render_text().contains("a.tex:1:"));
        assert!(first.to_json().unwrap().contains("\"lexicon_version\""));
    }
}

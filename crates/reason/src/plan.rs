//! The output of reasoning: every tag to insert and why the rest are not.

use std::collections::BTreeMap;

use detect::{Occurrence, OccurrenceId};
use lexicon::{EntryKey, Origin};
use markup::{CrossRelation, ExistingTag, ScopePath, Tag};
use serde::{Deserialize, Serialize};

use crate::error::ReasonError;

/// What one document contributes to planning. Occurrences must be in
/// offset order.
#[derive(Debug, Clone, Copy)]
pub struct DocumentFacts<'a> {
    pub doc: u32,
    pub occurrences: &'a [Occurrence],
    pub existing_tags: &'a [ExistingTag],
}

/// Which rule produced a planned tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanRule {
    Direct,
    /// Entry flag or inline directive.
    Standalone,
    RangeOpen,
    RangeClose,
    See,
    SeeAlso,
}

impl PlanRule {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanRule::Direct => "direct",
            PlanRule::Standalone => "standalone",
            PlanRule::RangeOpen => "range-open",
            PlanRule::RangeClose => "range-close",
            PlanRule::See => "see",
            PlanRule::SeeAlso => "see-also",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTag {
    pub doc: u32,
    pub offset: usize,
    pub tag: Tag,
    pub occurrence: OccurrenceId,
    pub entry: EntryKey,
    pub rule: PlanRule,
    /// Occurrence confidence, or the minimum over a range group.
    pub confidence: f32,
    /// Occurrence origin, or the weakest over a range group.
    pub origin: Origin,
    /// Range group the tag belongs to. Gating treats a group as one unit.
    pub group: Option<u32>,
}

/// Occurrences of one entry judged a sustained discussion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeGroup {
    pub id: u32,
    pub entry: EntryKey,
    pub doc: u32,
    pub scope: ScopePath,
    pub members: Vec<OccurrenceId>,
    pub first_paragraph: u32,
    pub last_paragraph: u32,
    /// Members per paragraph spanned.
    pub density: f32,
    pub confidence: f32,
    pub origin: Origin,
}

impl RangeGroup {
    pub fn open(&self) -> Option<OccurrenceId> {
        self.members.first().copied()
    }

    pub fn close(&self) -> Option<OccurrenceId> {
        self.members.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CrossRefEdge {
    pub source: EntryKey,
    pub target: String,
    pub relation: CrossRelation,
}

/// Why an occurrence received no tag of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DecisionKind {
    /// Reviewer dropped the occurrence.
    Suppressed,
    /// Another occurrence of the entry already tags the same point.
    SamePoint,
    /// A `see` source whose first occurrence was tagged elsewhere.
    Redirected { target: String },
    /// A `see` tag for this entry already exists in the corpus.
    SeeAlreadyPresent { target: String },
    RangeInterior { group: u32 },
    /// Lies inside an open/close pair already in the source.
    CoveredByExistingRange,
    Conflict { existing: String },
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Suppressed => "suppressed",
            DecisionKind::SamePoint => "same-point",
            DecisionKind::Redirected { .. } => "redirected",
            DecisionKind::SeeAlreadyPresent { .. } => "see-already-present",
            DecisionKind::RangeInterior { .. } => "range-interior",
            DecisionKind::CoveredByExistingRange => "covered-by-existing-range",
            DecisionKind::Conflict { .. } => "conflict",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub occurrence: OccurrenceId,
    pub entry: EntryKey,
    pub kind: DecisionKind,
}

/// Complete reasoning result for a corpus.
///
/// `tags` is ordered by document, offset and then placement; tags sharing
/// an offset are written in that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagPlan {
    pub tags: Vec<PlannedTag>,
    pub decisions: Vec<Decision>,
    pub groups: Vec<RangeGroup>,
    pub edges: Vec<CrossRefEdge>,
    pub conflicts: Vec<ReasonError>,
}

impl TagPlan {
    pub fn tags_for(&self, doc: u32) -> impl Iterator<Item = &PlannedTag> {
        let start = self.tags.partition_point(|t| t.doc < doc);
        self.tags[start..].iter().take_while(move |t| t.doc == doc)
    }

    pub fn decisions_for(&self, doc: u32) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().filter(move |d| d.occurrence.doc == doc)
    }

    /// Tags grouped by the occurrence they were planned for.
    pub fn tags_by_occurrence(&self) -> BTreeMap<OccurrenceId, Vec<&PlannedTag>> {
        let mut out: BTreeMap<OccurrenceId, Vec<&PlannedTag>> = BTreeMap::new();
        for tag in &self.tags {
            out.entry(tag.occurrence).or_default().push(tag);
        }
        out
    }

    pub fn group(&self, id: u32) -> Option<&RangeGroup> {
        self.groups.iter().find(|g| g.id == id)
    }
}

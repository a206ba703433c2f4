//! Corpus-wide tag planning.
//!
//! The reasoner is a single pass over every occurrence of the corpus in
//! file order. It needs the whole corpus at once: `see` tags go on the first
//! occurrence anywhere, and ranges need every member of a cluster.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use detect::{Occurrence, OccurrenceId};
use lexicon::{EntryKey, Lexicon, LexiconEntry, Origin};
use markup::{
    CrossRelation, ExistingTag, IndexKey, IndexType, RangeMark, Relation, ScopePath, Tag,
};
use tracing::{debug, info, info_span, warn};

use crate::config::ReasonConfig;
use crate::error::ReasonError;
use crate::plan::{
    CrossRefEdge, Decision, DecisionKind, DocumentFacts, PlanRule, PlannedTag, RangeGroup,
    TagPlan,
};

/// Index type plus whitespace-normalized key: what makes two tags the same entry.
type KeyId = (IndexType, IndexKey);

fn key_id(index_type: IndexType, key: &IndexKey) -> KeyId {
    (index_type, key.normalized())
}

/// Open/close pairs already in the source, per document and key, as
/// inclusive byte intervals. An unpaired open runs to the end of the document.
fn existing_ranges(documents: &[DocumentFacts<'_>]) -> BTreeMap<(u32, KeyId), Vec<(usize, usize)>> {
    let mut out: BTreeMap<(u32, KeyId), Vec<(usize, usize)>> = BTreeMap::new();
    for facts in documents {
        let mut open: BTreeMap<KeyId, Vec<usize>> = BTreeMap::new();
        for tag in facts.existing_tags {
            let id = key_id(tag.index_type, &tag.argument.key);
            match tag.argument.relation {
                Relation::RangeOpen => open.entry(id).or_default().push(tag.span.start),
                Relation::RangeClose => {
                    if let Some(start) = open.get_mut(&id).and_then(Vec::pop) {
                        out.entry((facts.doc, id))
                            .or_default()
                            .push((start, tag.span.end));
                    }
                }
                _ => {}
            }
        }
        for (id, starts) in open {
            for start in starts {
                out.entry((facts.doc, id.clone()))
                    .or_default()
                    .push((start, usize::MAX));
            }
        }
    }
    out
}

/// An attached author tag that names something other than this occurrence
/// and other than anything else planned at the same point.
fn conflicting_tag<'o>(
    occ: &'o Occurrence,
    entry: &LexiconEntry,
    at_point: Option<&BTreeSet<KeyId>>,
) -> Option<&'o ExistingTag> {
    let own = key_id(entry.index_type, &entry.index_key());
    let is_see_source = !entry.see.is_empty();
    occ.attached
        .iter()
        .filter(|tag| tag.index_type == entry.index_type)
        .find(|tag| {
            let id = key_id(tag.index_type, &tag.argument.key);
            if id == own {
                // A see source never carries a page reference of its own.
                is_see_source && !tag.argument.relation.is_cross_reference()
            } else {
                !at_point.is_some_and(|keys| keys.contains(&id))
            }
        })
}

#[derive(Default)]
struct PlanBuilder {
    tags: Vec<PlannedTag>,
    decisions: Vec<Decision>,
    groups: Vec<RangeGroup>,
    conflicts: Vec<ReasonError>,
}

impl PlanBuilder {
    fn tag(&mut self, occ: &Occurrence, tag: Tag, rule: PlanRule) {
        self.tags.push(PlannedTag {
            doc: occ.id.doc,
            offset: occ.insert_at,
            tag,
            occurrence: occ.id,
            entry: occ.entry.clone(),
            rule,
            confidence: occ.confidence,
            origin: occ.origin,
            group: None,
        });
    }

    fn grouped(&mut self, occ: &Occurrence, tag: Tag, rule: PlanRule, group: &RangeGroup) {
        self.tags.push(PlannedTag {
            doc: occ.id.doc,
            offset: occ.insert_at,
            tag,
            occurrence: occ.id,
            entry: occ.entry.clone(),
            rule,
            confidence: group.confidence,
            origin: group.origin,
            group: Some(group.id),
        });
    }

    fn decide(&mut self, occ: &Occurrence, kind: DecisionKind) {
        debug!(occurrence = %occ.id, entry = %occ.entry, decision = kind.as_str(), "untagged occurrence");
        self.decisions.push(Decision {
            occurrence: occ.id,
            entry: occ.entry.clone(),
            kind,
        });
    }

    fn finish(mut self, edges: Vec<CrossRefEdge>) -> TagPlan {
        // Stable: ties keep the order rules pushed them in.
        self.tags.sort_by_key(|t| (t.doc, t.offset, t.occurrence, t.tag.placement_rank()));
        let mut seen = BTreeSet::new();
        self.tags.retain(|t| {
            let argument = t.tag.argument();
            seen.insert((
                t.doc,
                t.offset,
                t.tag.index_type(),
                argument.key.normalized(),
                argument.relation,
            ))
        });
        self.decisions.sort_by_key(|d| d.occurrence);
        TagPlan {
            tags: self.tags,
            decisions: self.decisions,
            groups: self.groups,
            edges,
            conflicts: self.conflicts,
        }
    }
}

/// Turns the frozen occurrence set of a corpus into a [`TagPlan`].
#[derive(Debug, Clone)]
pub struct Reasoner {
    config: ReasonConfig,
}

impl Reasoner {
    pub fn new(config: ReasonConfig) -> Result<Self, ReasonError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReasonConfig {
        &self.config
    }

    /// Plan every tag for the corpus. `lexicon` must be the version the
    /// occurrences were resolved against (synthesized entries included);
    /// unknown entry keys are treated as plain entries.
    pub fn plan(
        &self,
        lexicon: &Lexicon,
        documents: &[DocumentFacts<'_>],
        suppressed: &BTreeSet<OccurrenceId>,
    ) -> TagPlan {
        let span = info_span!("reason", documents = documents.len());
        let _guard = span.enter();
        let started = Instant::now();

        let mut occurrences: Vec<&Occurrence> =
            documents.iter().flat_map(|d| d.occurrences.iter()).collect();
        occurrences.sort_by_key(|o| o.id);

        let entries: BTreeMap<EntryKey, LexiconEntry> = occurrences
            .iter()
            .map(|o| {
                let entry = lexicon
                    .get(&o.entry)
                    .cloned()
                    .unwrap_or_else(|| LexiconEntry::new(o.entry.label.clone(), o.entry.index_type));
                (o.entry.clone(), entry)
            })
            .collect();

        let see_present: BTreeSet<KeyId> = documents
            .iter()
            .flat_map(|d| d.existing_tags.iter())
            .filter(|t| matches!(t.argument.relation, Relation::See(_)))
            .map(|t| key_id(t.index_type, &t.argument.key))
            .collect();
        let ranges = existing_ranges(documents);

        let mut point_keys: BTreeMap<(u32, usize), BTreeSet<KeyId>> = BTreeMap::new();
        for occ in occurrences.iter().filter(|o| !suppressed.contains(&o.id)) {
            if let Some(entry) = entries.get(&occ.entry) {
                point_keys
                    .entry((occ.id.doc, occ.insert_at))
                    .or_default()
                    .insert(key_id(entry.index_type, &entry.index_key()));
            }
        }

        let mut out = PlanBuilder::default();
        let mut live: BTreeMap<&EntryKey, Vec<&Occurrence>> = BTreeMap::new();
        let mut points = BTreeSet::new();
        for &occ in &occurrences {
            let Some(entry) = entries.get(&occ.entry) else {
                continue;
            };
            if suppressed.contains(&occ.id) {
                out.decide(occ, DecisionKind::Suppressed);
                continue;
            }
            let at_point = point_keys.get(&(occ.id.doc, occ.insert_at));
            if let Some(existing) = conflicting_tag(occ, entry, at_point) {
                let existing_text = format!("\\{}{{{}}}", existing.command, existing.raw);
                warn!(
                    occurrence = %occ.id,
                    entry = %occ.entry,
                    existing = %existing_text,
                    line = occ.line,
                    "conflicting tag at insertion point"
                );
                out.conflicts.push(ReasonError::ConflictingTag {
                    occurrence: occ.id,
                    entry: occ.entry.to_string(),
                    existing: existing_text.clone(),
                    offset: occ.insert_at,
                    line: occ.line,
                });
                out.decide(occ, DecisionKind::Conflict { existing: existing_text });
                continue;
            }
            if !points.insert((&occ.entry, occ.id.doc, occ.insert_at)) {
                out.decide(occ, DecisionKind::SamePoint);
                continue;
            }
            live.entry(&occ.entry).or_default().push(occ);
        }

        let mut edges = Vec::new();
        for (key, occs) in &live {
            let Some(entry) = entries.get(*key) else {
                continue;
            };
            edges.extend(entry.see.iter().map(|target| CrossRefEdge {
                source: entry.key(),
                target: target.clone(),
                relation: CrossRelation::See,
            }));
            edges.extend(entry.see_also.iter().map(|target| CrossRefEdge {
                source: entry.key(),
                target: target.clone(),
                relation: CrossRelation::SeeAlso,
            }));
            self.plan_entry(entry, occs, &see_present, &ranges, &mut out);
        }

        let plan = out.finish(edges);
        info!(
            tags = plan.tags.len(),
            decisions = plan.decisions.len(),
            groups = plan.groups.len(),
            conflicts = plan.conflicts.len(),
            elapsed_micros = started.elapsed().as_micros() as u64,
            "plan complete"
        );
        plan
    }

    fn plan_entry(
        &self,
        entry: &LexiconEntry,
        occs: &[&Occurrence],
        see_present: &BTreeSet<KeyId>,
        ranges: &BTreeMap<(u32, KeyId), Vec<(usize, usize)>>,
        out: &mut PlanBuilder,
    ) {
        let index_key = entry.index_key();
        let id = key_id(entry.index_type, &index_key);
        let single = || Tag::direct(entry.index_type, index_key.clone(), RangeMark::Single);

        let (overrides, rest): (Vec<&Occurrence>, Vec<&Occurrence>) = occs
            .iter()
            .copied()
            .partition(|o| entry.standalone || o.standalone);
        for occ in overrides {
            out.tag(occ, single(), PlanRule::Standalone);
        }

        if let Some(target) = entry.see_target() {
            if see_present.contains(&id) {
                for occ in rest {
                    out.decide(occ, DecisionKind::SeeAlreadyPresent { target: target.clone() });
                }
            } else if let Some((first, others)) = rest.split_first() {
                let see = Tag::CrossRef {
                    index_type: entry.index_type,
                    source: index_key.clone(),
                    relation: CrossRelation::See,
                    target: target.clone(),
                };
                out.tag(first, see, PlanRule::See);
                for occ in others {
                    out.decide(occ, DecisionKind::Redirected { target: target.clone() });
                }
            }
            return;
        }

        let mut scoped: BTreeMap<(u32, ScopePath), Vec<&Occurrence>> = BTreeMap::new();
        for occ in rest {
            scoped
                .entry((occ.id.doc, occ.scope.truncate(self.config.range_scope)))
                .or_default()
                .push(occ);
        }

        for ((doc, scope), members) in &scoped {
            let intervals = ranges.get(&(*doc, id.clone()));
            let mut uncovered = Vec::with_capacity(members.len());
            for occ in members {
                let covered = intervals.is_some_and(|iv| {
                    iv.iter()
                        .any(|&(start, end)| start <= occ.insert_at && occ.insert_at <= end)
                });
                if covered {
                    out.decide(occ, DecisionKind::CoveredByExistingRange);
                } else {
                    uncovered.push(*occ);
                }
            }

            for cluster in self.clusters(&uncovered) {
                self.place_cluster(entry, &index_key, *doc, *scope, &cluster, out);
            }

            if let Some(last) = members.last() {
                for target in &entry.see_also {
                    let see_also = Tag::CrossRef {
                        index_type: entry.index_type,
                        source: index_key.clone(),
                        relation: CrossRelation::SeeAlso,
                        target: target.clone(),
                    };
                    out.tag(last, see_also, PlanRule::SeeAlso);
                }
            }
        }
    }

    /// Split occurrences (one entry, one scope, offset order) where the
    /// paragraph distance reaches the discussion gap.
    fn clusters<'o>(&self, occs: &[&'o Occurrence]) -> Vec<Vec<&'o Occurrence>> {
        let gap = self.config.discussion_gap;
        let mut out: Vec<Vec<&'o Occurrence>> = Vec::new();
        for &occ in occs {
            let continues = out
                .last()
                .and_then(|current| current.last())
                .is_some_and(|prev| occ.paragraph.saturating_sub(prev.paragraph) < gap);
            match out.last_mut() {
                Some(current) if continues => current.push(occ),
                _ => out.push(vec![occ]),
            }
        }
        out
    }

    fn place_cluster(
        &self,
        entry: &LexiconEntry,
        index_key: &IndexKey,
        doc: u32,
        scope: ScopePath,
        cluster: &[&Occurrence],
        out: &mut PlanBuilder,
    ) {
        let single = || Tag::direct(entry.index_type, index_key.clone(), RangeMark::Single);
        let (Some(first), Some(last)) = (cluster.first(), cluster.last()) else {
            return;
        };
        let spanned = last.paragraph.saturating_sub(first.paragraph) + 1;
        let density = cluster.len() as f32 / spanned as f32;

        if !self.config.ranges
            || cluster.len() < self.config.min_range_size
            || density < self.config.min_density
        {
            for occ in cluster {
                out.tag(occ, single(), PlanRule::Direct);
            }
            return;
        }

        let group = RangeGroup {
            id: out.groups.len() as u32,
            entry: entry.key(),
            doc,
            scope,
            members: cluster.iter().map(|o| o.id).collect(),
            first_paragraph: first.paragraph,
            last_paragraph: last.paragraph,
            density,
            confidence: cluster
                .iter()
                .map(|o| o.confidence)
                .fold(f32::INFINITY, f32::min),
            origin: cluster
                .iter()
                .map(|o| o.origin)
                .min()
                .unwrap_or(Origin::Heuristic),
        };
        debug!(
            entry = %group.entry,
            members = group.members.len(),
            density = group.density,
            "range group formed"
        );

        out.grouped(
            first,
            Tag::direct(entry.index_type, index_key.clone(), RangeMark::Open),
            PlanRule::RangeOpen,
            &group,
        );
        for occ in &cluster[1..cluster.len() - 1] {
            out.decide(occ, DecisionKind::RangeInterior { group: group.id });
        }
        out.grouped(
            last,
            Tag::direct(entry.index_type, index_key.clone(), RangeMark::Close),
            PlanRule::RangeClose,
            &group,
        );
        out.groups.push(group);
    }
}

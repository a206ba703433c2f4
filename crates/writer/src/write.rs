//! Tag insertion.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use detect::OccurrenceId;
use lexicon::Origin;
use markup::Regions;
use reason::{PlanRule, PlannedTag};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use crate::config::WriterConfig;
use crate::error::WriterError;
use crate::gate::{gate, Verdict};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "reason", rename_all = "kebab-case")]
pub enum WriteAction {
    Inserted,
    Suggested,
    Deferred,
    /// An equivalent tag already sits at the insertion point.
    AlreadyPresent,
    /// The offset cannot take a tag.
    Rejected(String),
}

impl WriteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteAction::Inserted => "inserted",
            WriteAction::Suggested => "suggested",
            WriteAction::Deferred => "deferred",
            WriteAction::AlreadyPresent => "already-present",
            WriteAction::Rejected(_) => "rejected",
        }
    }
}

/// What happened to one planned tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRecord {
    pub occurrence: OccurrenceId,
    pub offset: usize,
    pub rendered: String,
    pub rule: PlanRule,
    pub confidence: f32,
    pub origin: Origin,
    pub group: Option<u32>,
    pub action: WriteAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub text: String,
    /// One record per planned tag, in plan order.
    pub records: Vec<WriteRecord>,
    pub inserted: usize,
}

impl WriteOutcome {
    pub fn changed(&self) -> bool {
        self.inserted > 0
    }
}

fn offset_problem(source: &str, regions: &Regions, offset: usize) -> Option<String> {
    if offset > source.len() {
        return Some(format!("offset {offset} past end of document ({} bytes)", source.len()));
    }
    if !source.is_char_boundary(offset) {
        return Some(format!("offset {offset} is not a character boundary"));
    }
    if let Some(tag) = regions.tag_enclosing(offset) {
        return Some(format!("offset {offset} is inside existing tag \\{}", tag.command));
    }
    None
}

/// Insert the planned tags of one document into `source`.
///
/// `regions` must come from classifying `source` itself. Every byte of
/// `source` is kept; the only change is tag text spliced in at planned
/// offsets, several tags at one offset in plan order. Tags equivalent to
/// one already chained at the offset (spaces and `~` allowed) are skipped, which is what makes a
/// second run over the output a no-op.
pub fn write_document<'a, I>(
    source: &str,
    regions: &Regions,
    tags: I,
    config: &WriterConfig,
) -> Result<WriteOutcome, WriterError>
where
    I: IntoIterator<Item = &'a PlannedTag>,
{
    config.validate()?;
    let span = info_span!("write", mode = config.mode.as_str());
    let _guard = span.enter();
    let started = Instant::now();

    let mut tags: Vec<&PlannedTag> = tags.into_iter().collect();
    tags.sort_by_key(|t| t.offset);

    let problems: Vec<Option<String>> = tags
        .iter()
        .map(|t| offset_problem(source, regions, t.offset))
        .collect();
    let broken_groups: BTreeSet<u32> = tags
        .iter()
        .zip(&problems)
        .filter(|(_, problem)| problem.is_some())
        .filter_map(|(t, _)| t.group)
        .collect();

    // Both ends of a range share one verdict: the weakest of the pair.
    let mut group_verdicts: BTreeMap<u32, Verdict> = BTreeMap::new();
    for tag in &tags {
        if let Some(group) = tag.group {
            let verdict = gate(tag, config);
            group_verdicts
                .entry(group)
                .and_modify(|v| {
                    if *v == Verdict::Commit {
                        *v = verdict;
                    }
                })
                .or_insert(verdict);
        }
    }

    let mut records = Vec::with_capacity(tags.len());
    let mut inserts: Vec<(usize, String)> = Vec::new();
    for (tag, problem) in tags.iter().zip(problems) {
        let rendered = tag.tag.render(config.command_set);
        let action = if let Some(reason) = problem {
            WriteAction::Rejected(reason)
        } else if tag.group.is_some_and(|g| broken_groups.contains(&g)) {
            WriteAction::Rejected("range partner cannot be placed".into())
        } else {
            let argument = tag.tag.argument();
            let present = regions.tag_chain_at(source, tag.offset).iter().any(|existing| {
                existing.index_type == tag.tag.index_type()
                    && existing.argument.is_equivalent(&argument)
            });
            let verdict = match tag.group.and_then(|g| group_verdicts.get(&g)) {
                Some(&verdict) => verdict,
                None => gate(tag, config),
            };
            match (present, verdict) {
                (true, _) => WriteAction::AlreadyPresent,
                (false, Verdict::Commit) => {
                    inserts.push((tag.offset, rendered.clone()));
                    WriteAction::Inserted
                }
                (false, Verdict::Suggest) => WriteAction::Suggested,
                (false, Verdict::Defer) => WriteAction::Deferred,
            }
        };
        debug!(offset = tag.offset, tag = %rendered, action = action.as_str(), "tag");
        records.push(WriteRecord {
            occurrence: tag.occurrence,
            offset: tag.offset,
            rendered,
            rule: tag.rule,
            confidence: tag.confidence,
            origin: tag.origin,
            group: tag.group,
            action,
        });
    }

    let added: usize = inserts.iter().map(|(_, text)| text.len()).sum();
    let mut text = String::with_capacity(source.len() + added);
    let mut cursor = 0;
    for (offset, rendered) in &inserts {
        text.push_str(&source[cursor..*offset]);
        text.push_str(rendered);
        cursor = *offset;
    }
    text.push_str(&source[cursor..]);

    debug!(
        planned = records.len(),
        inserted = inserts.len(),
        elapsed_micros = started.elapsed().as_micros() as u64,
        "document written"
    );

    Ok(WriteOutcome {
        text,
        records,
        inserted: inserts.len(),
    })
}

//! Keep/drop review of index tags already in a corpus.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use markup::{classify, parse, MarkupError, Outline, SkipRegistry};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

use crate::batch::run_batches;
use crate::checkpoint::{load_json, save_json};
use crate::config::AssistConfig;
use crate::context::tag_context;
use crate::contract::{judge_prompt, parse_judgments, JudgeItem, Judgment, Unresolved};
use crate::error::ProviderError;
use crate::provider::Provider;

/// Items and decisions of a judgment run. Saved after every batch when a
/// checkpoint path is given, and read back to resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeReport {
    #[serde(default)]
    pub items: Vec<JudgeItem>,
    #[serde(default)]
    pub decisions: Vec<Judgment>,
    #[serde(default)]
    pub unresolved: Vec<Unresolved>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl JudgeReport {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProviderError> {
        load_json(path.as_ref())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ProviderError> {
        save_json(path.as_ref(), self)
    }

    pub fn decision(&self, key: &str) -> Option<&Judgment> {
        self.decisions.iter().find(|d| d.key == key)
    }

    /// Items the reviewer decided to drop, in item order.
    pub fn dropped(&self) -> Vec<&JudgeItem> {
        let dropped: BTreeSet<&str> = self
            .decisions
            .iter()
            .filter(|d| !d.keep)
            .map(|d| d.key.as_str())
            .collect();
        self.items
            .iter()
            .filter(|item| dropped.contains(item.key().as_str()))
            .collect()
    }

    fn sort_by_items(&mut self) {
        let order: BTreeMap<String, usize> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.key(), i))
            .collect();
        let rank = |key: &str| order.get(key).copied().unwrap_or(usize::MAX);
        self.decisions.sort_by_key(|d| rank(&d.key));
        self.unresolved.sort_by_key(|u| rank(&u.key));
    }
}

/// Every index tag of one file, with the prose around it.
pub fn collect_judge_items(
    file: &str,
    source: &str,
    registry: &SkipRegistry,
    window: usize,
) -> Result<Vec<JudgeItem>, MarkupError> {
    let doc = parse(source, registry)?;
    let regions = classify(&doc);
    let outline = Outline::build(&doc);
    Ok(regions
        .existing_tags
        .iter()
        .map(|tag| JudgeItem {
            file: file.to_owned(),
            line: outline.line_of(tag.span.start),
            command: tag.command.clone(),
            index_type: tag.index_type,
            term: tag.raw.trim().to_owned(),
            tag: tag.span.slice(source).to_owned(),
            span: tag.span,
            context: tag_context(source, tag.span, window),
        })
        .collect())
}

/// Ask `provider` about every item without a decision in `previous`.
///
/// Tags of a failed batch, and tags a reply skips, end up unresolved and
/// are asked about again on the next resumed run.
pub async fn judge(
    provider: &dyn Provider,
    config: &AssistConfig,
    items: Vec<JudgeItem>,
    previous: Option<JudgeReport>,
    checkpoint: Option<&Path>,
) -> Result<JudgeReport, ProviderError> {
    config.validate()?;
    let keys: BTreeSet<String> = items.iter().map(JudgeItem::key).collect();
    let previous = previous.unwrap_or_default();
    let mut decided: BTreeSet<String> = BTreeSet::new();
    let decisions: Vec<Judgment> = previous
        .decisions
        .into_iter()
        .filter(|d| keys.contains(&d.key) && decided.insert(d.key.clone()))
        .collect();

    let pending: Vec<(usize, JudgeItem)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| !decided.contains(&item.key()))
        .map(|(id, item)| (id, item.clone()))
        .collect();
    let batches: Vec<Vec<(usize, JudgeItem)>> = pending
        .chunks(config.judge_chunk_size)
        .map(<[_]>::to_vec)
        .collect();

    let span = info_span!(
        "judge",
        items = items.len(),
        resumed = decisions.len(),
        batches = batches.len()
    );

    let mut report = JudgeReport {
        items,
        decisions,
        unresolved: Vec::new(),
        notes: previous.notes,
    };

    async {
        run_batches(
            provider,
            batches,
            config.max_concurrency,
            &config.retry,
            |batch| judge_prompt(batch),
            |batch, value| parse_judgments(value, batch),
            |outcome| {
                match &outcome.result {
                    Ok(reply) => {
                        for judgment in &reply.accepted {
                            if decided.insert(judgment.key.clone()) {
                                report.decisions.push(judgment.clone());
                            }
                        }
                        report.unresolved.extend(reply.unresolved.iter().cloned());
                        report.notes.extend(reply.notes.iter().cloned());
                    }
                    Err(error) => {
                        report
                            .unresolved
                            .extend(outcome.batch.iter().map(|(_, item)| Unresolved {
                                key: item.key(),
                                reason: error.to_string(),
                            }));
                    }
                }
                match checkpoint {
                    Some(path) => report.save(path),
                    None => Ok(()),
                }
            },
        )
        .await?;

        report.sort_by_items();
        if let Some(path) = checkpoint {
            report.save(path)?;
        }
        let dropped = report.decisions.iter().filter(|d| !d.keep).count();
        info!(
            decided = report.decisions.len(),
            dropped,
            unresolved = report.unresolved.len(),
            "judgment finished"
        );
        Ok(report)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use crate::testing::{payload_after, ScriptedProvider};
    use serde_json::{json, Value};
    use std::time::Duration;

    const SOURCE: &str = "A grammar\\sindex{grammar} of Turkish.\n\
                          See Lewis\\nindex{Lewis, Geoffrey} for more.\n";

    fn items() -> Vec<JudgeItem> {
        collect_judge_items("ch1.tex", SOURCE, &SkipRegistry::default(), 40).unwrap()
    }

    fn config() -> AssistConfig {
        AssistConfig::default().with_retry(
            RetryConfig::default()
                .with_max_retries(0)
                .with_base_delay(Duration::from_millis(1)),
        )
    }

    /// Drops names, keeps everything else.
    fn reviewer() -> ScriptedProvider {
        ScriptedProvider::new(|prompt| {
            let decisions: Vec<Value> = payload_after(prompt, "Items:\n")
                .iter()
                .map(|item| json!({"id": item["id"], "keep": item["type"] != "name", "reason": "test"}))
                .collect();
            Ok(json!({"decisions": decisions, "notes": []}).to_string())
        })
    }

    #[test]
    fn items_carry_line_and_context() {
        let items = items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].term, "grammar");
        assert_eq!(items[0].tag, "\\sindex{grammar}");
        assert_eq!(items[0].line, 1);
        assert!(items[0].context.starts_with("A grammar of Turkish."));
        assert_eq!(items[1].line, 2);
        assert_eq!(items[1].term, "Lewis, Geoffrey");
    }

    #[tokio::test]
    async fn decisions_cover_every_item() {
        let provider = reviewer();
        let report = judge(&provider, &config(), items(), None, None).await.unwrap();
        assert_eq!(report.decisions.len(), 2);
        assert!(report.unresolved.is_empty());
        let dropped = report.dropped();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].command, "nindex");
    }

    #[tokio::test]
    async fn resume_never_resubmits_decided_items() {
        let items = items();
        let previous = JudgeReport {
            items: items.clone(),
            decisions: vec![Judgment {
                key: items[0].key(),
                keep: true,
                reason: "earlier run".into(),
            }],
            unresolved: Vec::new(),
            notes: vec!["first pass".into()],
        };
        let provider = reviewer();
        let report = judge(&provider, &config(), items.clone(), Some(previous), None)
            .await
            .unwrap();
        assert_eq!(provider.calls(), 1);
        let sent = payload_after(&provider.prompts()[0], "Items:\n");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["id"], 1);
        assert_eq!(report.decisions[0].reason, "earlier run");
        assert_eq!(report.notes, vec!["first pass".to_string()]);

        let again = judge(&provider, &config(), items, Some(report), None)
            .await
            .unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(again.decisions.len(), 2);
    }

    #[tokio::test]
    async fn failed_batches_leave_items_unresolved() {
        let provider = ScriptedProvider::new(|_| Err(ProviderError::Command("offline".into())));
        let report = judge(&provider, &config(), items(), None, None).await.unwrap();
        assert!(report.decisions.is_empty());
        assert_eq!(report.unresolved.len(), 2);
        assert!(report.unresolved[0].reason.contains("offline"));
    }

    #[tokio::test]
    async fn checkpoint_is_written_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("judgment.json");
        let provider = reviewer();
        let config = config().with_judge_chunk_size(1);
        let report = judge(&provider, &config, items(), None, Some(&path))
            .await
            .unwrap();
        assert_eq!(provider.calls(), 2);
        assert_eq!(JudgeReport::load(&path).unwrap(), report);
    }
}

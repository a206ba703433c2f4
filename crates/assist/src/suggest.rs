//! Reviewer suggestions for lexicon entries.

use std::collections::BTreeSet;
use std::path::Path;

use lexicon::{EntryKey, Lexicon, SuggestedChange};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

use crate::batch::run_batches;
use crate::checkpoint::{load_json, save_json};
use crate::config::AssistConfig;
use crate::context::find_contexts;
use crate::contract::{parse_suggestions, suggestion_prompt, LexiconSuggestion, SuggestionItem, Unresolved};
use crate::error::ProviderError;
use crate::provider::Provider;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuggestionReport {
    #[serde(default)]
    pub suggestions: Vec<LexiconSuggestion>,
    /// Entries the provider has answered for, changed or not.
    #[serde(default)]
    pub reviewed: Vec<EntryKey>,
    #[serde(default)]
    pub unresolved: Vec<Unresolved>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl SuggestionReport {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProviderError> {
        load_json(path.as_ref())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ProviderError> {
        save_json(path.as_ref(), self)
    }

    /// Suggestions as lexicon changes, in report order.
    pub fn changes(&self) -> Vec<SuggestedChange> {
        self.suggestions
            .iter()
            .map(|s| SuggestedChange {
                target: Some(s.existing.clone()),
                update: s.suggested.clone(),
            })
            .collect()
    }
}

/// One review item per lexicon entry, with up to `max_contexts` snippets
/// from `corpus` for its label and then its synonyms.
pub fn suggestion_items<S: AsRef<str>>(
    lexicon: &Lexicon,
    corpus: &[S],
    config: &AssistConfig,
) -> Vec<SuggestionItem> {
    lexicon
        .entries()
        .iter()
        .enumerate()
        .map(|(id, entry)| {
            let mut contexts = Vec::new();
            'docs: for doc in corpus {
                for term in std::iter::once(&entry.label).chain(&entry.synonyms) {
                    let needed = config.max_contexts.saturating_sub(contexts.len());
                    if needed == 0 {
                        break 'docs;
                    }
                    contexts.extend(find_contexts(doc.as_ref(), term, config.context_window, needed));
                }
            }
            SuggestionItem {
                id,
                entry: entry.key(),
                synonyms: entry.synonyms.clone(),
                contexts,
            }
        })
        .collect()
}

/// Ask `provider` about every item not yet reviewed in `previous`.
pub async fn suggest(
    provider: &dyn Provider,
    config: &AssistConfig,
    items: Vec<SuggestionItem>,
    previous: Option<SuggestionReport>,
    checkpoint: Option<&Path>,
) -> Result<SuggestionReport, ProviderError> {
    config.validate()?;
    let mut report = previous.unwrap_or_default();
    report.unresolved.clear();
    let mut reviewed: BTreeSet<EntryKey> = report.reviewed.iter().cloned().collect();

    let pending: Vec<SuggestionItem> = items
        .into_iter()
        .filter(|item| !reviewed.contains(&item.entry))
        .collect();
    let batches: Vec<Vec<SuggestionItem>> = pending
        .chunks(config.chunk_size)
        .map(<[_]>::to_vec)
        .collect();

    let span = info_span!(
        "suggest",
        pending = pending.len(),
        resumed = reviewed.len(),
        batches = batches.len()
    );

    async {
        let outcomes = run_batches(
            provider,
            batches,
            config.max_concurrency,
            &config.retry,
            |batch| suggestion_prompt(batch),
            |batch, value| parse_suggestions(value, batch),
            |outcome| {
                match &outcome.result {
                    Ok(reply) => {
                        for item in &outcome.batch {
                            if reviewed.insert(item.entry.clone()) {
                                report.reviewed.push(item.entry.clone());
                            }
                        }
                        report.suggestions.extend(reply.accepted.iter().cloned());
                        report.unresolved.extend(reply.unresolved.iter().cloned());
                        report.notes.extend(reply.notes.iter().cloned());
                    }
                    Err(error) => {
                        report
                            .unresolved
                            .extend(outcome.batch.iter().map(|item| Unresolved {
                                key: item.entry.to_string(),
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

        report.suggestions.sort_by_key(|s| s.id);
        report.reviewed.sort();
        if let Some(path) = checkpoint {
            report.save(path)?;
        }
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(
            suggestions = report.suggestions.len(),
            unresolved = report.unresolved.len(),
            failed_batches = failed,
            "suggestions finished"
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
    use lexicon::{IndexType, LexiconEntry};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn lexicon() -> Lexicon {
        Lexicon::from_entries(vec![
            LexiconEntry::new("vowel harmony", IndexType::Subject).with_synonyms(["harmony"]),
            LexiconEntry::new("Turkish", IndexType::Lexical),
        ])
        .unwrap()
    }

    fn config() -> AssistConfig {
        AssistConfig::default().with_retry(
            RetryConfig::default()
                .with_max_retries(0)
                .with_base_delay(Duration::from_millis(1)),
        )
    }

    /// Proposes a display form for every subject entry.
    fn reviewer() -> ScriptedProvider {
        ScriptedProvider::new(|prompt| {
            let updates: Vec<Value> = payload_after(prompt, "Entries:\n")
                .iter()
                .filter(|item| item["type"] == "subject")
                .map(|item| json!({"id": item["id"], "display": "\\emph{x}", "confidence": 0.7}))
                .collect();
            Ok(json!({"updates": updates, "notes": ["ok"]}).to_string())
        })
    }

    #[test]
    fn contexts_fall_back_to_synonyms() {
        let corpus = ["Only harmony here.", "Turkish and Turkish again. Turkish."];
        let items = suggestion_items(&lexicon(), &corpus, &config());
        let harmony = items
            .iter()
            .find(|i| i.entry.label == "vowel harmony")
            .unwrap();
        assert_eq!(harmony.contexts.len(), 1);
        let turkish = items.iter().find(|i| i.entry.label == "Turkish").unwrap();
        assert_eq!(turkish.contexts.len(), 2);
    }

    #[tokio::test]
    async fn suggestions_become_lexicon_changes() {
        let lex = lexicon();
        let items = suggestion_items::<&str>(&lex, &[], &config());
        let provider = reviewer();
        let report = suggest(&provider, &config(), items, None, None).await.unwrap();
        assert_eq!(report.suggestions.len(), 1);
        assert_eq!(report.reviewed.len(), 2);
        assert_eq!(report.notes, vec!["ok".to_string()]);

        let outcome = lex.apply_suggestions(&report.changes()).unwrap();
        assert_eq!(outcome.applied.len(), 1);
        let key = EntryKey::new(IndexType::Subject, "vowel harmony");
        assert_eq!(
            outcome.lexicon.get(&key).unwrap().display.as_deref(),
            Some("\\emph{x}")
        );
    }

    #[tokio::test]
    async fn reviewed_entries_are_skipped_on_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let lex = lexicon();
        let items = suggestion_items::<&str>(&lex, &[], &config());
        let provider = reviewer();
        suggest(&provider, &config(), items.clone(), None, Some(&path))
            .await
            .unwrap();
        let saved = SuggestionReport::load(&path).unwrap();
        let again = suggest(&provider, &config(), items, Some(saved.clone()), Some(&path))
            .await
            .unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(again, saved);
    }

    #[tokio::test]
    async fn failed_batches_are_unresolved_not_fatal() {
        let provider = ScriptedProvider::new(|_| Ok("not json at all".into()));
        let items = suggestion_items::<&str>(&lexicon(), &[], &config());
        let report = suggest(&provider, &config(), items, None, None).await.unwrap();
        assert!(report.suggestions.is_empty());
        assert!(report.reviewed.is_empty());
        assert_eq!(report.unresolved.len(), 2);
    }
}

//! What is sent to a provider and what comes back.
//!
//! Both workflows number the items of a request from zero and ask the model
//! to echo those ids. Replies are checked record by record: a record that
//! does not parse or names an id outside the request is kept as
//! [`Unresolved`] and never applied.

use std::collections::BTreeMap;

use lexicon::{EntryKey, IndexType, LexiconUpdate};
use markup::Span;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::provider::Prompt;

const SUGGEST_SYSTEM: &str = "You are an experienced indexer of academic books. \
Review the lexicon entries you are given and propose improvements: consistent \
capitalisation of canonical terms, LaTeX display forms where needed, head!sub \
hierarchy where a term belongs under a broader heading, and see or see_also \
cross-references between synonyms and related terms. Use see when a term should \
redirect to another instead of being indexed itself. Reply with strict JSON only.";

const JUDGE_SYSTEM: &str = "You are an experienced indexer of academic books. \
For each index tag decide whether it should stay. Keep a tag when the surrounding \
text actually discusses the concept or the term matters to the passage. Drop tags \
on passing mentions, lists of examples and bibliographic references. If in doubt, \
drop the tag.";

/// A lexicon entry offered for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionItem {
    /// Position of the entry in the lexicon.
    pub id: usize,
    pub entry: EntryKey,
    pub synonyms: Vec<String>,
    pub contexts: Vec<String>,
}

/// A reviewer-proposed change to one existing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconSuggestion {
    pub id: usize,
    pub existing: EntryKey,
    pub suggested: LexiconUpdate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// An index tag already in the corpus, offered for a keep/drop decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeItem {
    pub file: String,
    pub line: usize,
    pub command: String,
    #[serde(rename = "type")]
    pub index_type: IndexType,
    pub term: String,
    /// The whole macro call as it appears in the source.
    pub tag: String,
    pub span: Span,
    pub context: String,
}

impl JudgeItem {
    /// Stable identity across runs: file plus byte span.
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.file, self.span.start, self.span.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judgment {
    pub key: String,
    pub keep: bool,
    #[serde(default)]
    pub reason: String,
}

/// An item the provider did not settle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unresolved {
    pub key: String,
    pub reason: String,
}

/// One parsed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub accepted: Vec<T>,
    pub unresolved: Vec<Unresolved>,
    pub notes: Vec<String>,
}

pub fn suggestion_prompt(items: &[SuggestionItem]) -> Prompt {
    let payload: Vec<Value> = items
        .iter()
        .map(|item| {
            json!({
                "id": item.id,
                "term": item.entry.label,
                "type": item.entry.index_type,
                "synonyms": item.synonyms,
                "contexts": item.contexts,
            })
        })
        .collect();
    let user = format!(
        "Return an update only for entries that need a change.\n\
         JSON schema:\n\
         {{\n  \"updates\": [\n    {{\n      \"id\": <int>,\n      \"canonical\": <string?>,\n      \
         \"display\": <string?>,\n      \"hierarchy\": <array of strings?>,\n      \
         \"synonyms\": <array of strings?>,\n      \"see\": <array of strings?>,\n      \
         \"see_also\": <array of strings?>,\n      \"type\": <\"subject\"|\"name\"|\"lexical\"?>,\n      \
         \"reason\": <string?>,\n      \"confidence\": <number 0..1?>\n    }}\n  ],\n  \
         \"notes\": [<string>]\n}}\n\
         Entries:\n{}\n",
        Value::Array(payload)
    );
    Prompt {
        system: SUGGEST_SYSTEM.to_owned(),
        user,
    }
}

/// `items` pairs each tag with the id it is sent under.
pub fn judge_prompt(items: &[(usize, JudgeItem)]) -> Prompt {
    let payload: Vec<Value> = items
        .iter()
        .map(|(id, item)| {
            json!({
                "id": id,
                "term": item.term,
                "type": item.index_type,
                "context": item.context,
            })
        })
        .collect();
    let user = format!(
        "Reply with strict JSON only.\n\
         Schema:\n\
         {{\n  \"decisions\": [\n    {{\"id\": <int>, \"keep\": <bool>, \"reason\": <string>}}\n  ],\n  \
         \"notes\": [<string>]\n}}\n\
         Items:\n{}\n",
        Value::Array(payload)
    );
    Prompt {
        system: JUDGE_SYSTEM.to_owned(),
        user,
    }
}

fn records(value: &Value, field: &str) -> Result<Vec<Value>, ProviderError> {
    match value.get(field) {
        Some(Value::Array(items)) => Ok(items.clone()),
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(_) => Err(ProviderError::InvalidResponse(format!("`{field}` is not a list"))),
    }
}

fn notes(value: &Value) -> Vec<String> {
    value
        .get("notes")
        .and_then(Value::as_array)
        .map(|notes| {
            notes
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn record_key(record: &Value) -> String {
    match record.get("id") {
        Some(id) => id.to_string(),
        None => "?".into(),
    }
}

#[derive(Deserialize)]
struct RawUpdate {
    id: usize,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(flatten)]
    update: LexiconUpdate,
}

/// Validate a suggestion reply against the request it answers.
pub fn parse_suggestions(
    value: &Value,
    items: &[SuggestionItem],
) -> Result<Reply<LexiconSuggestion>, ProviderError> {
    if !value.is_object() {
        return Err(ProviderError::InvalidResponse("reply is not a JSON object".into()));
    }
    let by_id: BTreeMap<usize, &SuggestionItem> = items.iter().map(|i| (i.id, i)).collect();
    let mut reply = Reply {
        accepted: Vec::new(),
        unresolved: Vec::new(),
        notes: notes(value),
    };
    for record in records(value, "updates")? {
        let key = record_key(&record);
        let raw: RawUpdate = match serde_json::from_value(record) {
            Ok(raw) => raw,
            Err(e) => {
                reply.unresolved.push(Unresolved {
                    key,
                    reason: format!("malformed update: {e}"),
                });
                continue;
            }
        };
        let Some(item) = by_id.get(&raw.id) else {
            reply.unresolved.push(Unresolved {
                key,
                reason: "id not in request".into(),
            });
            continue;
        };
        if raw.update.is_empty() {
            continue;
        }
        reply.accepted.push(LexiconSuggestion {
            id: raw.id,
            existing: item.entry.clone(),
            suggested: raw.update,
            reason: raw.reason,
            confidence: raw.confidence.map(|c| c.clamp(0.0, 1.0)),
        });
    }
    Ok(reply)
}

#[derive(Deserialize)]
struct RawJudgment {
    id: usize,
    keep: bool,
    #[serde(default)]
    reason: String,
}

/// Validate a judgment reply. Tags the reply says nothing about are
/// unresolved; a repeated id keeps its first decision.
pub fn parse_judgments(
    value: &Value,
    items: &[(usize, JudgeItem)],
) -> Result<Reply<Judgment>, ProviderError> {
    if !value.is_object() {
        return Err(ProviderError::InvalidResponse("reply is not a JSON object".into()));
    }
    let by_id: BTreeMap<usize, &JudgeItem> = items.iter().map(|(id, item)| (*id, item)).collect();
    let mut decided: BTreeMap<usize, Judgment> = BTreeMap::new();
    let mut reply = Reply {
        accepted: Vec::new(),
        unresolved: Vec::new(),
        notes: notes(value),
    };
    for record in records(value, "decisions")? {
        let key = record_key(&record);
        let raw: RawJudgment = match serde_json::from_value(record) {
            Ok(raw) => raw,
            Err(e) => {
                reply.unresolved.push(Unresolved {
                    key,
                    reason: format!("malformed decision: {e}"),
                });
                continue;
            }
        };
        let Some(item) = by_id.get(&raw.id) else {
            reply.unresolved.push(Unresolved {
                key,
                reason: "id not in request".into(),
            });
            continue;
        };
        decided.entry(raw.id).or_insert(Judgment {
            key: item.key(),
            keep: raw.keep,
            reason: raw.reason,
        });
    }
    for (id, item) in items {
        match decided.remove(id) {
            Some(judgment) => reply.accepted.push(judgment),
            None => reply.unresolved.push(Unresolved {
                key: item.key(),
                reason: "no decision returned".into(),
            }),
        }
    }
    Ok(reply)
}

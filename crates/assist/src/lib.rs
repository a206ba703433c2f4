//! texindex review assistance.
//!
//! Sends lexicon entries and existing index tags to a language model for
//! review and turns the replies into data the pipeline can apply: lexicon
//! suggestions ([`suggest`]) and keep/drop judgments ([`judge`]).
//!
//! ## Guarantees
//!
//! - Requests run in batches, at most `max_concurrency` at a time, each
//!   retried with exponential backoff and jitter
//! - A batch that still fails, or a reply record that does not validate,
//!   is reported as unresolved; the run carries on
//! - Items are keyed by stable identity (entry key, or file plus tag span)
//!   and checkpointed after each batch, so a resumed run never re-submits
//!   a decided item
//!
//! Nothing here writes to the corpus or the lexicon file. Applying the
//! results is up to the caller.

mod batch;
mod checkpoint;
mod config;
mod context;
mod contract;
mod error;
mod judge;
mod provider;
mod retry;
mod serde_millis;
mod suggest;

#[cfg(test)]
mod testing;

pub use crate::batch::{run_batches, BatchOutcome};
pub use crate::config::{AssistConfig, ProviderKind};
pub use crate::context::{find_contexts, tag_context};
pub use crate::contract::{
    judge_prompt, parse_judgments, parse_suggestions, suggestion_prompt, JudgeItem, Judgment,
    LexiconSuggestion, Reply, SuggestionItem, Unresolved,
};
pub use crate::error::ProviderError;
pub use crate::judge::{collect_judge_items, judge, JudgeReport};
pub use crate::provider::{
    build_provider, json_from_text, AnthropicProvider, CommandProvider, OpenAiProvider, Prompt,
    Provider,
};
pub use crate::retry::{execute_with_retry, RetryConfig, RetryResult};
pub use crate::suggest::{suggest, suggestion_items, SuggestionReport};

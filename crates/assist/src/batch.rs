//! Bounded-concurrency batch execution.

use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};

use crate::error::ProviderError;
use crate::provider::{json_from_text, Prompt, Provider};
use crate::retry::{execute_with_retry, RetryConfig};

/// A settled batch: its position in the input, the batch itself, and what
/// the provider made of it after retries.
#[derive(Debug)]
pub struct BatchOutcome<B, R> {
    pub index: usize,
    pub batch: B,
    pub result: Result<R, ProviderError>,
    pub attempts: u32,
}

/// Run every batch through `provider`, at most `max_concurrency` at a time.
///
/// Each batch is retried per `retry`; a batch that still fails is returned
/// with its error and does not stop the others. `on_settled` sees every
/// batch as soon as it settles, in completion order, which is where
/// callers checkpoint; an error from it stops the run. The returned
/// outcomes are in input order.
pub async fn run_batches<B, R, Build, Parse, Settled>(
    provider: &dyn Provider,
    batches: Vec<B>,
    max_concurrency: usize,
    retry: &RetryConfig,
    build: Build,
    parse: Parse,
    mut on_settled: Settled,
) -> Result<Vec<BatchOutcome<B, R>>, ProviderError>
where
    Build: Fn(&B) -> Prompt,
    Parse: Fn(&B, &Value) -> Result<R, ProviderError>,
    Settled: FnMut(&BatchOutcome<B, R>) -> Result<(), ProviderError>,
{
    let total = batches.len();
    let started = Instant::now();
    let build = &build;
    let parse = &parse;

    let mut pending = stream::iter(batches.into_iter().enumerate().map(|(index, batch)| {
        let span = info_span!("batch", provider = provider.name(), index, total);
        async move {
            let prompt = build(&batch);
            let prompt_ref = &prompt;
            let batch_ref = &batch;
            let retried = execute_with_retry(retry, move |_| async move {
                let text = provider.complete(prompt_ref).await?;
                let value = json_from_text(&text)?;
                parse(batch_ref, &value)
            })
            .await;
            BatchOutcome {
                index,
                attempts: retried.attempts,
                result: retried.result,
                batch,
            }
        }
        .instrument(span)
    }))
    .buffer_unordered(max_concurrency.max(1));

    let mut outcomes = Vec::with_capacity(total);
    let mut failed = 0usize;
    while let Some(outcome) = pending.next().await {
        if let Err(error) = &outcome.result {
            failed += 1;
            warn!(index = outcome.index, attempts = outcome.attempts, error = %error, "batch failed");
        }
        on_settled(&outcome)?;
        outcomes.push(outcome);
    }
    outcomes.sort_by_key(|o| o.index);

    info!(
        provider = provider.name(),
        batches = total,
        failed,
        elapsed_micros = started.elapsed().as_micros() as u64,
        "batches settled"
    );
    Ok(outcomes)
}

//! Batch orchestration
//!
//! Drives a list of items through the fallback chain:
//!
//! 1. **Titles** are short, so they are sent together in combined requests.
//!    A failing sub-batch halves the batch size and the same range is
//!    retried; at the floor the range is translated item by item.
//! 2. **Contents** are translated one item at a time, either sequentially
//!    or concurrently with a staggered start. Long contents are chunked by
//!    the fallback chain.
//!
//! Results always line up with the input: `results[i]` belongs to `items[i]`.

use crate::mt::data::{BatchOutcome, TextOutcome, TranslationItem, TranslationResult};
use crate::mt::fallback::{FallbackChain, RunContext};
use crate::mt::instructions::TranslationInstructions;
use crate::mt::limiter::ConcurrencyLimiter;
use crate::mt::unit::UnitTranslator;
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables of a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    /// Starting size of combined title requests
    pub batch_size_ceiling: usize,
    /// Size below which combined requests are no longer shrunk
    pub batch_size_floor: usize,
    /// Translate contents concurrently instead of one after another
    pub concurrent: bool,
    /// Start delay between consecutive concurrent contents
    pub stagger: Duration,
    /// Maximum backend calls in flight
    pub concurrency_limit: usize,
    /// Guard timeout of each backend call
    pub call_timeout: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size_ceiling: 20,
            batch_size_floor: 1,
            concurrent: true,
            stagger: Duration::from_millis(300),
            concurrency_limit: 3,
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// Runs batches of items through a [`FallbackChain`]
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    chain: FallbackChain,
    settings: BatchSettings,
    limiter: ConcurrencyLimiter,
    instructions: TranslationInstructions,
}

impl BatchOrchestrator {
    pub fn new(
        chain: FallbackChain,
        settings: BatchSettings,
        instructions: TranslationInstructions,
    ) -> Self {
        let limiter = ConcurrencyLimiter::new(settings.concurrency_limit);
        Self {
            chain,
            settings,
            limiter,
            instructions,
        }
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Translate every item
    pub async fn run(&self, items: &[TranslationItem]) -> BatchOutcome {
        self.run_resuming(items, &[]).await
    }

    /// Translate the items that a previous run did not finish
    ///
    /// `previous[i]` is kept when it is marked translated; every other
    /// position is translated again. `previous` may be shorter or longer
    /// than `items`.
    pub async fn run_resuming(
        &self,
        items: &[TranslationItem],
        previous: &[TranslationResult],
    ) -> BatchOutcome {
        let pending: Vec<usize> = (0..items.len())
            .filter(|&i| !previous.get(i).is_some_and(|r| r.translated))
            .collect();
        let reused = items.len() - pending.len();
        info!(
            items = items.len(),
            pending = pending.len(),
            reused,
            concurrent = self.settings.concurrent,
            "starting batch run"
        );

        let run = RunContext::new(
            UnitTranslator::new(self.limiter.clone(), self.settings.call_timeout),
            self.instructions.clone(),
        );

        let titles: Vec<&str> = pending.iter().map(|&i| items[i].title.as_str()).collect();
        let contents: Vec<&str> = pending.iter().map(|&i| items[i].content.as_str()).collect();

        let title_outcomes = self.translate_titles(&run, &titles).await;
        let content_outcomes = self.translate_contents(&run, &contents).await;

        let mut fresh = pending
            .into_iter()
            .zip(title_outcomes.into_iter().zip(content_outcomes))
            .map(|(index, (title, content))| (index, TranslationResult::from_parts(title, content)))
            .peekable();

        let mut results = Vec::with_capacity(items.len());
        for index in 0..items.len() {
            match fresh.next_if(|(i, _)| *i == index) {
                Some((_, result)) => results.push(result),
                None => results.push(previous[index].clone()),
            }
        }

        let outcome = BatchOutcome::from_results(results);
        info!(
            success = outcome.success_count,
            failed = outcome.fail_count,
            sticky = run.sticky_index(),
            "batch run finished"
        );
        outcome
    }

    /// Translate titles in combined requests with adaptive sizing
    async fn translate_titles(&self, run: &RunContext, titles: &[&str]) -> Vec<TextOutcome> {
        let mut outcomes: Vec<TextOutcome> =
            titles.iter().map(|t| TextOutcome::passthrough(t)).collect();
        let pending: Vec<usize> = (0..titles.len())
            .filter(|&i| !titles[i].trim().is_empty())
            .collect();

        let floor = self.settings.batch_size_floor.max(1);
        let mut size = self.settings.batch_size_ceiling.max(floor);
        let mut start = 0;

        while start < pending.len() {
            let end = (start + size).min(pending.len());
            let range = &pending[start..end];

            if !self.chain.has_available_ranked(run) {
                debug!(from = start, to = end, "no ranked backend left, titles one by one");
                self.translate_titles_singly(run, titles, range, &mut outcomes)
                    .await;
                start = end;
                continue;
            }

            let texts: Vec<String> = range.iter().map(|&i| titles[i].to_string()).collect();
            match self.chain.translate_batch(run, &texts).await {
                Ok(reply) => {
                    debug!(from = start, to = end, model = %reply.model, "title batch translated");
                    for (&i, text) in range.iter().zip(reply.texts) {
                        outcomes[i] = TextOutcome::translated(text, &reply.model);
                    }
                    start = end;
                }
                Err(err) if size > floor => {
                    let shrunk = (size / 2).max(floor);
                    warn!(size, shrunk, error = %err, "title batch failed, shrinking");
                    size = shrunk;
                }
                Err(err) => {
                    warn!(size, error = %err, "title batch failed at floor, titles one by one");
                    self.translate_titles_singly(run, titles, range, &mut outcomes)
                        .await;
                    start = end;
                }
            }
        }

        outcomes
    }

    async fn translate_titles_singly(
        &self,
        run: &RunContext,
        titles: &[&str],
        range: &[usize],
        outcomes: &mut [TextOutcome],
    ) {
        for &i in range {
            outcomes[i] = self.chain.translate_text(run, titles[i]).await;
        }
    }

    /// Translate contents one item per fallback chain call
    async fn translate_contents(&self, run: &RunContext, contents: &[&str]) -> Vec<TextOutcome> {
        if !self.settings.concurrent {
            let mut outcomes = Vec::with_capacity(contents.len());
            for content in contents {
                outcomes.push(self.chain.translate_text(run, content).await);
            }
            return outcomes;
        }

        let tasks = contents.iter().enumerate().map(|(position, content)| async move {
            if !content.trim().is_empty() {
                let factor = u32::try_from(position).unwrap_or(u32::MAX);
                let delay = self.settings.stagger.saturating_mul(factor);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            self.chain.translate_text(run, content).await
        });
        join_all(tasks).await
    }
}

//! Facade composing the strategy engine and the summarizer

use super::generate::TextGenerator;
use super::models::{HistoryStats, Message, ReductionResult, Strategy, SummaryRecord, ThreadConfig};
use super::store::SummaryStore;
use super::strategy::StrategyEngine;
use super::summarizer::Summarizer;
use super::token_estimator::{CharBasedEstimator, TokenEstimator};
use crate::error::{ContextError, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Single entry point for the calling application.
///
/// Composes the strategy engine and the summarizer; holds no per-thread
/// configuration state. Turns for one thread must be serialized by the caller;
/// distinct threads are fully independent.
pub struct ContextManager {
    estimator: Arc<dyn TokenEstimator>,
    engine: StrategyEngine,
    summarizer: Summarizer,
}

impl ContextManager {
    pub fn new(
        estimator: Arc<dyn TokenEstimator>,
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn SummaryStore>,
    ) -> Self {
        Self {
            engine: StrategyEngine::new(estimator.clone()),
            summarizer: Summarizer::new(estimator.clone(), generator, store),
            estimator,
        }
    }

    /// Build with the default character-based estimator
    pub fn with_defaults(generator: Arc<dyn TextGenerator>, store: Arc<dyn SummaryStore>) -> Self {
        Self::new(Arc::new(CharBasedEstimator::default()), generator, store)
    }

    /// Compute what to send to the model for this turn.
    ///
    /// For the summarization strategy this first runs a non-forced summary
    /// refresh and feeds the latest cached record into the reduction.
    pub async fn prepare_turn(
        &self,
        thread_id: &str,
        messages: &[Message],
        config: &ThreadConfig,
    ) -> Result<ReductionResult> {
        config.validate()?;

        let summary = if config.strategy == Strategy::Summarization {
            let outcome = self
                .summarizer
                .refresh_if_needed(thread_id, messages, config, false)
                .await?;
            if let Some(ref o) = outcome {
                if o.degraded {
                    warn!(thread_id, "turn proceeding with degraded fallback summary");
                }
            }
            outcome.map(|o| o.record)
        } else {
            None
        };

        self.engine.reduce(messages, config, summary.as_ref())
    }

    /// Explicit user-triggered summary regeneration
    pub async fn force_summary(
        &self,
        thread_id: &str,
        messages: &[Message],
        config: &ThreadConfig,
    ) -> Result<SummaryRecord> {
        let outcome = self
            .summarizer
            .refresh_if_needed(thread_id, messages, config, true)
            .await?;
        match outcome {
            Some(o) => Ok(o.record),
            None => Err(ContextError::Configuration(
                "cannot summarize an empty thread".to_string(),
            )),
        }
    }

    /// History statistics for display purposes
    pub fn get_stats(&self, messages: &[Message], result: &ReductionResult) -> HistoryStats {
        let total_tokens: usize = messages
            .iter()
            .map(|m| self.estimator.estimate(&m.content))
            .sum();

        let stats = HistoryStats {
            total_messages: messages.len(),
            total_tokens,
            sent_messages: result.sent_message_count,
            sent_tokens: result.estimated_tokens_sent,
            reduction_pct: result.reduction_percentage(),
        };
        debug!(
            total = stats.total_messages,
            sent = stats.sent_messages,
            reduction_pct = stats.reduction_pct,
            "history stats"
        );
        stats
    }
}

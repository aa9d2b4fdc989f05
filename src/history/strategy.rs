//! The five history reduction strategies

use super::models::{Message, ReductionResult, Role, Strategy, SummaryRecord, ThreadConfig};
use super::token_estimator::TokenEstimator;
use crate::error::Result;
use std::sync::Arc;
use tracing::debug;

/// Applies the configured reduction strategy to a thread's message log
pub struct StrategyEngine {
    estimator: Arc<dyn TokenEstimator>,
}

impl StrategyEngine {
    pub fn new(estimator: Arc<dyn TokenEstimator>) -> Self {
        Self { estimator }
    }

    /// Reduce the full ordered log to the messages that will be sent.
    ///
    /// `summary` is only consulted by the summarization strategy; passing one
    /// to other strategies is harmless. Relative ordering of retained messages
    /// is never altered.
    pub fn reduce(
        &self,
        messages: &[Message],
        config: &ThreadConfig,
        summary: Option<&SummaryRecord>,
    ) -> Result<ReductionResult> {
        config.validate()?;

        let selected = match config.strategy {
            Strategy::MessageCount => self.message_count(messages, config),
            Strategy::TokenBased => self.token_based(messages, config),
            Strategy::SlidingWindow => self.sliding_window(messages, config),
            Strategy::Hybrid => self.hybrid(messages, config),
            Strategy::Summarization => match summary {
                Some(record) => self.summarized(messages, config, record),
                // No summary produced yet: hybrid keeps the thread usable
                None => self.hybrid(messages, config),
            },
        };

        let result = self.with_stats(messages, selected);
        debug!(
            strategy = config.strategy.as_str(),
            total = result.total_message_count,
            sent = result.sent_message_count,
            tokens_sent = result.estimated_tokens_sent,
            tokens_total = result.estimated_tokens_total,
            "reduced history"
        );
        Ok(result)
    }

    /// Strategy 1: keep the last `max_messages` messages verbatim
    fn message_count(&self, messages: &[Message], config: &ThreadConfig) -> Vec<Message> {
        let start = messages.len().saturating_sub(config.max_messages);
        messages[start..].to_vec()
    }

    /// Strategy 2: walk newest to oldest, stop before the budget overflows.
    ///
    /// The most recent message is always included, even when it alone exceeds
    /// the budget; a non-empty log never reduces to nothing.
    fn token_based(&self, messages: &[Message], config: &ThreadConfig) -> Vec<Message> {
        let mut selected = Vec::new();
        let mut tokens = 0usize;

        for msg in messages.iter().rev() {
            let cost = self.estimator.estimate(&msg.content);
            if !selected.is_empty() && tokens + cost > config.max_tokens {
                break;
            }
            tokens += cost;
            selected.push(msg.clone());
        }

        selected.reverse();
        selected
    }

    /// Strategy 3: message-count window aligned to complete exchanges.
    ///
    /// When truncating, the kept count is rounded down to the nearest even
    /// number (history read as user/assistant pairs), and if the window would
    /// open on the assistant half of an exchange the cut is extended to pull
    /// in the matching user message.
    fn sliding_window(&self, messages: &[Message], config: &ThreadConfig) -> Vec<Message> {
        let n = messages.len();
        let mut keep = config.max_messages.min(n);
        if keep == n {
            return messages.to_vec();
        }
        if keep % 2 == 1 && keep > 1 {
            keep -= 1;
        }

        let mut cut = n - keep;
        if messages[cut].role == Role::Assistant
            && cut > 0
            && messages[cut - 1].role == Role::User
        {
            cut -= 1;
        }
        messages[cut..].to_vec()
    }

    /// Strategy 4: first message as a stable topic anchor plus as many recent
    /// messages as fit under the remaining budget.
    ///
    /// The anchor is never dropped, even when its cost alone exceeds
    /// `max_tokens`; in that case no recent messages are added.
    fn hybrid(&self, messages: &[Message], config: &ThreadConfig) -> Vec<Message> {
        let Some(first) = messages.first() else {
            return Vec::new();
        };

        let anchor_cost = self.estimator.estimate(&first.content);
        let budget = config.max_tokens.saturating_sub(anchor_cost);

        let mut recent = Vec::new();
        let mut tokens = 0usize;
        for msg in messages[1..].iter().rev() {
            let cost = self.estimator.estimate(&msg.content);
            if tokens + cost > budget {
                break;
            }
            tokens += cost;
            recent.push(msg.clone());
        }
        recent.reverse();

        let mut selected = vec![first.clone()];
        selected.extend(recent);
        selected
    }

    /// Strategy 5: summary placeholder plus recent raw messages.
    ///
    /// Sends a synthetic system message carrying the system prompt and the
    /// cached summary, followed by the last `recent_messages_count` raw
    /// messages newer than what the summary covers.
    fn summarized(
        &self,
        messages: &[Message],
        config: &ThreadConfig,
        summary: &SummaryRecord,
    ) -> Vec<Message> {
        let uncovered: Vec<Message> = messages
            .iter()
            .filter(|m| m.sequence_order > summary.last_message_order)
            .cloned()
            .collect();
        let start = uncovered.len().saturating_sub(config.recent_messages_count);

        let placeholder = Message::summary_placeholder(
            config.system_prompt.as_deref(),
            &summary.summary_text,
        );

        let mut selected = vec![placeholder];
        selected.extend_from_slice(&uncovered[start..]);
        selected
    }

    fn with_stats(&self, messages: &[Message], selected: Vec<Message>) -> ReductionResult {
        let estimated_tokens_total = messages
            .iter()
            .map(|m| self.estimator.estimate(&m.content))
            .sum();
        let estimated_tokens_sent = selected
            .iter()
            .map(|m| self.estimator.estimate(&m.content))
            .sum();

        ReductionResult {
            total_message_count: messages.len(),
            sent_message_count: selected.len(),
            estimated_tokens_sent,
            estimated_tokens_total,
            messages_to_send: selected,
        }
    }
}

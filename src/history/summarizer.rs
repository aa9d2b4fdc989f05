//! AI-assisted summarization with cached, incrementally refreshed summaries

use super::generate::TextGenerator;
use super::models::{Message, Role, SummaryRecord, ThreadConfig};
use super::store::SummaryStore;
use super::token_estimator::TokenEstimator;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Per-message excerpt length used when building the summarization prompt
const PROMPT_EXCERPT_CHARS: usize = 500;

/// Excerpt length used by the deterministic fallback summary
const FALLBACK_EXCERPT_CHARS: usize = 100;

/// Result of a refresh check
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub record: SummaryRecord,
    /// Whether this call generated and persisted a new record
    pub refreshed: bool,
    /// Whether the generator failed and the record carries the deterministic
    /// fallback summary instead of AI output
    pub degraded: bool,
}

/// Produces and refreshes compressed long-range summaries.
///
/// Exactly one refresh can be in flight per thread at a time; a concurrent
/// request for the same thread waits on the per-thread lock and then reuses
/// the freshly persisted record instead of generating again.
pub struct Summarizer {
    estimator: Arc<dyn TokenEstimator>,
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn SummaryStore>,
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Summarizer {
    pub fn new(
        estimator: Arc<dyn TokenEstimator>,
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn SummaryStore>,
    ) -> Self {
        Self {
            estimator,
            generator,
            store,
            refresh_locks: DashMap::new(),
        }
    }

    /// Refresh the thread's summary when due, returning the latest record.
    ///
    /// `Ok(None)` means the thread has no summary yet and none is due. A
    /// generation failure never aborts the refresh: the record is built from
    /// the deterministic fallback and flagged `degraded`.
    pub async fn refresh_if_needed(
        &self,
        thread_id: &str,
        messages: &[Message],
        config: &ThreadConfig,
        force: bool,
    ) -> Result<Option<RefreshOutcome>> {
        config.validate()?;

        let lock = self.refresh_lock(thread_id);
        let result = {
            let _guard = lock.lock().await;
            self.refresh_under_lock(thread_id, messages, config, force)
                .await
        };
        drop(lock);
        // The map entry is only needed while some task holds or waits on the
        // lock; prune it so short-lived threads do not accumulate entries.
        self.refresh_locks
            .remove_if(thread_id, |_, l| Arc::strong_count(l) == 1);
        result
    }

    async fn refresh_under_lock(
        &self,
        thread_id: &str,
        messages: &[Message],
        config: &ThreadConfig,
        force: bool,
    ) -> Result<Option<RefreshOutcome>> {
        // Re-read under the lock: a refresh that just finished on another
        // task must be reused, not repeated.
        let existing = self.store.load_summary(thread_id).await?;

        if !force && !Self::is_due(existing.as_ref(), messages, config) {
            return Ok(existing.map(|record| RefreshOutcome {
                record,
                refreshed: false,
                degraded: false,
            }));
        }

        let segment = self.uncovered_segment(messages, config, existing.as_ref(), force);
        if segment.is_empty() {
            debug!(thread_id, "refresh due but nothing new to fold");
            return Ok(existing.map(|record| RefreshOutcome {
                record,
                refreshed: false,
                degraded: false,
            }));
        }

        let prompt = self.build_prompt(existing.as_ref(), &segment);
        debug!(
            thread_id,
            folded = segment.len(),
            prompt_tokens = self.estimator.estimate(&prompt),
            "refreshing summary"
        );

        let (summary_text, degraded) = match self.generator.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => (text, false),
            Ok(_) => {
                warn!(thread_id, "generator returned empty output, using fallback summary");
                (Self::fallback_summary(existing.as_ref(), &segment), true)
            }
            Err(e) => {
                warn!(thread_id, error = %e, "generation failed, using fallback summary");
                (Self::fallback_summary(existing.as_ref(), &segment), true)
            }
        };

        let messages_covered =
            existing.as_ref().map(|r| r.messages_covered).unwrap_or(0) + segment.len();
        // Segment is filtered to orders above the previous record, so this
        // never decreases across refreshes.
        let last_message_order = segment
            .last()
            .map(|m| m.sequence_order)
            .unwrap_or_default();

        let record = SummaryRecord::new(thread_id, summary_text, messages_covered, last_message_order);
        self.store.save_summary(&record).await?;

        info!(
            thread_id,
            messages_covered, last_message_order, degraded, "summary refreshed"
        );

        Ok(Some(RefreshOutcome {
            record,
            refreshed: true,
            degraded,
        }))
    }

    /// Whether a refresh is due for the given log state
    fn is_due(existing: Option<&SummaryRecord>, messages: &[Message], config: &ThreadConfig) -> bool {
        let Some(newest) = messages.last() else {
            return false;
        };
        match existing {
            None => messages.len() >= config.summarize_threshold,
            Some(record) => {
                let new_messages = newest.sequence_order.saturating_sub(record.last_message_order);
                new_messages as usize >= config.effective_refresh_interval()
            }
        }
    }

    /// Messages to fold into the summary: everything not yet covered, minus
    /// the trailing messages that will still be sent verbatim. A forced
    /// refresh on a log shorter than the verbatim tail folds the whole log.
    fn uncovered_segment(
        &self,
        messages: &[Message],
        config: &ThreadConfig,
        existing: Option<&SummaryRecord>,
        force: bool,
    ) -> Vec<Message> {
        let covered_up_to = existing.map(|r| r.last_message_order).unwrap_or(0);
        let cutoff = messages.len().saturating_sub(config.recent_messages_count);

        let segment: Vec<Message> = messages[..cutoff]
            .iter()
            .filter(|m| m.sequence_order > covered_up_to)
            .cloned()
            .collect();

        if segment.is_empty() && force {
            return messages
                .iter()
                .filter(|m| m.sequence_order > covered_up_to)
                .cloned()
                .collect();
        }
        segment
    }

    fn build_prompt(&self, existing: Option<&SummaryRecord>, segment: &[Message]) -> String {
        let mut conversation = String::new();
        for msg in segment {
            let role = match msg.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            conversation.push_str(role);
            conversation.push_str(": ");
            conversation.push_str(&truncate_chars(&msg.content, PROMPT_EXCERPT_CHARS));
            conversation.push_str("\n\n");
        }

        let prior = existing
            .map(|r| {
                format!(
                    "An earlier portion of this conversation was already summarized as:\n{}\n\n\
                     Fold the new turns below into an updated summary.\n\n",
                    r.summary_text
                )
            })
            .unwrap_or_default();

        format!(
            "Please provide a concise summary of the following conversation between a user \
             and an AI assistant.\n\n\
             Focus on:\n\
             1. Main topics and questions discussed\n\
             2. Key information or solutions provided\n\
             3. Important context for continuing the conversation\n\n\
             Keep the summary brief (under 150 words) but informative.\n\n\
             {}Conversation:\n{}\n\
             Provide a clear, factual summary:",
            prior, conversation
        )
    }

    /// Deterministic extractive summary used when generation fails
    fn fallback_summary(existing: Option<&SummaryRecord>, segment: &[Message]) -> String {
        let user_count = segment.iter().filter(|m| m.role == Role::User).count();
        let first_user = segment
            .iter()
            .find(|m| m.role == Role::User)
            .or_else(|| segment.first());
        let last = segment.last();

        let mut summary = String::new();
        if let Some(prior) = existing {
            summary.push_str(&prior.summary_text);
            summary.push_str("\n\n");
        }
        if let Some(first) = first_user {
            summary.push_str(&format!(
                "Conversation covered: {}...",
                truncate_chars(&first.content, FALLBACK_EXCERPT_CHARS)
            ));
        }
        if let Some(last) = last {
            summary.push_str(&format!(
                " Most recently: {}...",
                truncate_chars(&last.content, FALLBACK_EXCERPT_CHARS)
            ));
        }
        summary.push_str(&format!(
            " ({} messages exchanged, {} from the user)",
            segment.len(),
            user_count
        ));
        summary
    }

    fn refresh_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::generate::GenerationError;
    use crate::history::models::Strategy;
    use crate::history::store::InMemorySummaryStore;
    use crate::history::token_estimator::CharBasedEstimator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingGenerator {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(0),
                fail: false,
            }
        }

        fn slow() -> Self {
            Self {
                delay: Duration::from_millis(50),
                ..Self::new()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(GenerationError::NetworkError("connection refused".to_string()))
            } else {
                Ok("AI summary of the conversation.".to_string())
            }
        }
    }

    fn summarizer_with(generator: Arc<CountingGenerator>) -> Summarizer {
        Summarizer::new(
            Arc::new(CharBasedEstimator::default()),
            generator,
            Arc::new(InMemorySummaryStore::new()),
        )
    }

    fn log(count: usize) -> Vec<Message> {
        (1..=count as u64)
            .map(|i| {
                let role = if i % 2 == 1 { Role::User } else { Role::Assistant };
                Message::new(role, format!("turn {}", i), i)
            })
            .collect()
    }

    fn config() -> ThreadConfig {
        ThreadConfig {
            strategy: Strategy::Summarization,
            summarize_threshold: 30,
            recent_messages_count: 10,
            ..ThreadConfig::default()
        }
    }

    #[tokio::test]
    async fn test_noop_below_threshold() {
        let generator = Arc::new(CountingGenerator::new());
        let summarizer = summarizer_with(generator.clone());

        let outcome = summarizer
            .refresh_if_needed("t1", &log(20), &config(), false)
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_first_refresh_covers_all_but_recent() {
        let generator = Arc::new(CountingGenerator::new());
        let summarizer = summarizer_with(generator.clone());

        let outcome = summarizer
            .refresh_if_needed("t1", &log(50), &config(), false)
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.refreshed);
        assert!(!outcome.degraded);
        assert_eq!(outcome.record.messages_covered, 40);
        assert_eq!(outcome.record.last_message_order, 40);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_last_message_order_is_monotone() {
        let generator = Arc::new(CountingGenerator::new());
        let summarizer = summarizer_with(generator.clone());
        let cfg = config();

        let first = summarizer
            .refresh_if_needed("t1", &log(30), &cfg, false)
            .await
            .unwrap()
            .unwrap();

        let second = summarizer
            .refresh_if_needed("t1", &log(45), &cfg, false)
            .await
            .unwrap()
            .unwrap();

        assert!(second.record.last_message_order >= first.record.last_message_order);
        assert_eq!(first.record.last_message_order, 20);
        assert_eq!(second.record.last_message_order, 35);
        assert_eq!(second.record.messages_covered, 35);
    }

    #[tokio::test]
    async fn test_not_due_returns_existing_unchanged() {
        let generator = Arc::new(CountingGenerator::new());
        let summarizer = summarizer_with(generator.clone());
        let cfg = config();
        let messages = log(30);

        let first = summarizer
            .refresh_if_needed("t1", &messages, &cfg, false)
            .await
            .unwrap()
            .unwrap();
        assert!(first.refreshed);

        // Same log again: nothing new has accumulated
        let second = summarizer
            .refresh_if_needed("t1", &messages, &cfg, false)
            .await
            .unwrap()
            .unwrap();
        assert!(!second.refreshed);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_degrades_to_fallback() {
        let generator = Arc::new(CountingGenerator::failing());
        let summarizer = summarizer_with(generator.clone());

        let outcome = summarizer
            .refresh_if_needed("t1", &log(50), &config(), false)
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.refreshed);
        assert!(outcome.degraded);
        assert!(outcome.record.summary_text.contains("messages exchanged"));
        assert_eq!(outcome.record.last_message_order, 40);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_generate_once() {
        let generator = Arc::new(CountingGenerator::slow());
        let summarizer = Arc::new(summarizer_with(generator.clone()));
        let messages = Arc::new(log(50));
        let cfg = config();

        let a = {
            let s = summarizer.clone();
            let m = messages.clone();
            let c = cfg.clone();
            tokio::spawn(async move { s.refresh_if_needed("t1", m.as_slice(), &c, false).await })
        };
        let b = {
            let s = summarizer.clone();
            let m = messages.clone();
            let c = cfg.clone();
            tokio::spawn(async move { s.refresh_if_needed("t1", m.as_slice(), &c, false).await })
        };

        let first = a.await.unwrap().unwrap().unwrap();
        let second = b.await.unwrap().unwrap().unwrap();

        assert_eq!(generator.call_count(), 1);
        assert_eq!(first.record.id, second.record.id);
        assert_eq!(first.record.last_message_order, second.record.last_message_order);
    }

    #[tokio::test]
    async fn test_distinct_threads_refresh_independently() {
        let generator = Arc::new(CountingGenerator::new());
        let summarizer = summarizer_with(generator.clone());
        let cfg = config();

        summarizer
            .refresh_if_needed("thread-a", &log(40), &cfg, false)
            .await
            .unwrap()
            .unwrap();
        summarizer
            .refresh_if_needed("thread-b", &log(40), &cfg, false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_refresh_locks_pruned_after_use() {
        let generator = Arc::new(CountingGenerator::new());
        let summarizer = summarizer_with(generator.clone());
        let cfg = config();

        summarizer
            .refresh_if_needed("thread-a", &log(40), &cfg, false)
            .await
            .unwrap();
        summarizer
            .refresh_if_needed("thread-b", &log(40), &cfg, false)
            .await
            .unwrap();

        assert!(summarizer.refresh_locks.is_empty());
    }

    #[tokio::test]
    async fn test_forced_refresh_on_short_log_folds_everything() {
        let generator = Arc::new(CountingGenerator::new());
        let summarizer = summarizer_with(generator.clone());

        let outcome = summarizer
            .refresh_if_needed("t1", &log(6), &config(), true)
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.refreshed);
        assert_eq!(outcome.record.messages_covered, 6);
        assert_eq!(outcome.record.last_message_order, 6);
    }
}

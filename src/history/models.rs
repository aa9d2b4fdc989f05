//! Data models for history reduction

use crate::error::ContextError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single message in a conversation thread
///
/// Messages are immutable once created and owned by the conversation log;
/// the engine only reads them. `sequence_order` is monotonically increasing
/// and unique within a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub sequence_order: u64,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, sequence_order: u64) -> Self {
        Self {
            role,
            content: content.into(),
            sequence_order,
            created_at: Utc::now(),
        }
    }

    /// Build the synthetic system message that stands in for summarized history.
    ///
    /// The placeholder is transient (sequence_order 0) and never written back
    /// to the conversation log.
    pub fn summary_placeholder(system_prompt: Option<&str>, summary_text: &str) -> Self {
        let mut content = String::new();
        if let Some(prompt) = system_prompt {
            if !prompt.is_empty() {
                content.push_str(prompt);
                content.push_str("\n\n");
            }
        }
        content.push_str(&format!(
            "Previous conversation summary:\n{}\n\n---\nRecent conversation continues below:",
            summary_text
        ));
        Self::new(Role::System, content, 0)
    }
}

/// The five history reduction strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Keep the last `max_messages` messages verbatim
    MessageCount,
    /// Keep the most recent messages that fit under `max_tokens`
    TokenBased,
    /// Message-count window aligned to complete user/assistant exchanges
    SlidingWindow,
    /// First message as topic anchor plus recent messages under `max_tokens`
    Hybrid,
    /// Cached AI summary of older history plus recent raw messages
    Summarization,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::MessageCount => "message_count",
            Strategy::TokenBased => "token_based",
            Strategy::SlidingWindow => "sliding_window",
            Strategy::Hybrid => "hybrid",
            Strategy::Summarization => "summarization",
        }
    }
}

impl FromStr for Strategy {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message_count" => Ok(Strategy::MessageCount),
            "token_based" => Ok(Strategy::TokenBased),
            "sliding_window" => Ok(Strategy::SlidingWindow),
            "hybrid" => Ok(Strategy::Hybrid),
            "summarization" => Ok(Strategy::Summarization),
            other => Err(ContextError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Per-thread reduction configuration
///
/// Passed explicitly into every call; the engine holds no global configuration
/// state. Mutable by the caller between turns, never by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadConfig {
    pub strategy: Strategy,
    /// Window size for message_count and sliding_window
    pub max_messages: usize,
    /// Token budget for token_based and hybrid
    pub max_tokens: usize,
    /// Message count at which the first summary becomes due
    pub summarize_threshold: usize,
    /// Raw messages kept verbatim alongside a summary
    pub recent_messages_count: usize,
    /// New messages after which a cached summary is refreshed; defaults to
    /// `recent_messages_count` when unset
    #[serde(default)]
    pub refresh_interval: Option<usize>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::TokenBased,
            max_messages: 20,
            max_tokens: 3000,
            summarize_threshold: 30,
            recent_messages_count: 10,
            refresh_interval: None,
            system_prompt: None,
        }
    }
}

impl ThreadConfig {
    /// Validate thresholds before any reduction work is done
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.max_messages == 0 {
            return Err(ContextError::Configuration(
                "max_messages must be positive".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ContextError::Configuration(
                "max_tokens must be positive".to_string(),
            ));
        }
        if self.summarize_threshold == 0 {
            return Err(ContextError::Configuration(
                "summarize_threshold must be positive".to_string(),
            ));
        }
        if self.recent_messages_count == 0 {
            return Err(ContextError::Configuration(
                "recent_messages_count must be positive".to_string(),
            ));
        }
        if self.refresh_interval == Some(0) {
            return Err(ContextError::Configuration(
                "refresh_interval must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Refresh cadence: configured interval or `recent_messages_count`
    pub fn effective_refresh_interval(&self) -> usize {
        self.refresh_interval.unwrap_or(self.recent_messages_count)
    }
}

/// The single current summary for a thread
///
/// Superseded in place on refresh, never versioned; deletion is a
/// thread-lifecycle concern of the collaborator store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: String,
    pub thread_id: String,
    pub summary_text: String,
    /// Count of original messages folded into this summary
    pub messages_covered: usize,
    /// sequence_order of the newest message included
    pub last_message_order: u64,
    pub created_at: DateTime<Utc>,
}

impl SummaryRecord {
    pub fn new(
        thread_id: impl Into<String>,
        summary_text: impl Into<String>,
        messages_covered: usize,
        last_message_order: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            summary_text: summary_text.into(),
            messages_covered,
            last_message_order,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of one reduction pass, recomputed every turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionResult {
    /// Messages to send to the model, in original order, possibly prefixed by
    /// a synthetic summary placeholder
    pub messages_to_send: Vec<Message>,
    pub total_message_count: usize,
    pub sent_message_count: usize,
    pub estimated_tokens_sent: usize,
    pub estimated_tokens_total: usize,
}

impl ReductionResult {
    /// Fraction of estimated tokens removed by the reduction, in percent,
    /// rounded to two decimals. Zero for an empty log, never negative.
    pub fn reduction_percentage(&self) -> f64 {
        if self.estimated_tokens_total == 0 {
            return 0.0;
        }
        let ratio = self.estimated_tokens_sent as f64 / self.estimated_tokens_total as f64;
        (((1.0 - ratio) * 100.0).max(0.0) * 100.0).round() / 100.0
    }
}

/// History statistics for display purposes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_messages: usize,
    pub total_tokens: usize,
    pub sent_messages: usize,
    pub sent_tokens: usize,
    pub reduction_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_round_trip() {
        for name in [
            "message_count",
            "token_based",
            "sliding_window",
            "hybrid",
            "summarization",
        ] {
            let strategy: Strategy = name.parse().unwrap();
            assert_eq!(strategy.as_str(), name);
        }
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result = "keep_everything".parse::<Strategy>();
        assert!(matches!(result, Err(ContextError::UnknownStrategy(_))));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ThreadConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_thresholds_rejected() {
        let mut config = ThreadConfig::default();
        config.max_tokens = 0;
        assert!(matches!(
            config.validate(),
            Err(ContextError::Configuration(_))
        ));

        let mut config = ThreadConfig::default();
        config.refresh_interval = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_interval_defaults_to_recent_count() {
        let config = ThreadConfig::default();
        assert_eq!(config.effective_refresh_interval(), 10);

        let config = ThreadConfig {
            refresh_interval: Some(20),
            ..ThreadConfig::default()
        };
        assert_eq!(config.effective_refresh_interval(), 20);
    }

    #[test]
    fn test_summary_placeholder_carries_prompt_and_summary() {
        let msg = Message::summary_placeholder(Some("You are helpful."), "User asked about Rust.");
        assert_eq!(msg.role, Role::System);
        assert_eq!(msg.sequence_order, 0);
        assert!(msg.content.starts_with("You are helpful."));
        assert!(msg.content.contains("User asked about Rust."));
    }

    #[test]
    fn test_reduction_percentage_never_negative() {
        let result = ReductionResult {
            messages_to_send: vec![],
            total_message_count: 1,
            sent_message_count: 2,
            estimated_tokens_sent: 150,
            estimated_tokens_total: 100,
        };
        assert_eq!(result.reduction_percentage(), 0.0);

        let empty = ReductionResult {
            messages_to_send: vec![],
            total_message_count: 0,
            sent_message_count: 0,
            estimated_tokens_sent: 0,
            estimated_tokens_total: 0,
        };
        assert_eq!(empty.reduction_percentage(), 0.0);
    }
}

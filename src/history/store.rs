//! Summary store collaborator interface

use super::models::SummaryRecord;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// Persistence contract for the single current summary per thread.
///
/// The engine never deletes records and never retries store operations;
/// failures map to [`crate::error::ContextError::Store`] and abort the turn.
/// Retry policy belongs to the implementing collaborator.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Load the current summary for a thread, if one exists
    async fn load_summary(&self, thread_id: &str) -> Result<Option<SummaryRecord>>;

    /// Persist a summary, overwriting any previous record for the thread
    async fn save_summary(&self, record: &SummaryRecord) -> Result<()>;
}

/// In-memory summary store backed by a concurrent map.
///
/// Suitable for tests and for embedding callers that keep summaries only for
/// the process lifetime.
#[derive(Default)]
pub struct InMemorySummaryStore {
    records: DashMap<String, SummaryRecord>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn load_summary(&self, thread_id: &str) -> Result<Option<SummaryRecord>> {
        Ok(self.records.get(thread_id).map(|r| r.clone()))
    }

    async fn save_summary(&self, record: &SummaryRecord) -> Result<()> {
        debug!(
            thread_id = %record.thread_id,
            messages_covered = record.messages_covered,
            last_message_order = record.last_message_order,
            "saving summary"
        );
        self.records
            .insert(record.thread_id.clone(), record.clone());
        Ok(())
    }
}

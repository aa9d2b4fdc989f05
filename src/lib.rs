//! Context window management for multi-turn conversational AI
//!
//! A language model has a bounded input-context budget while a conversation's
//! full message log grows without bound. This crate decides, on every turn,
//! which subset (or compressed representation) of the history is sent to the
//! model. The durable message log, the model invocation, and the UI are all
//! collaborators; this crate only reduces.

pub mod error;
pub mod history;

pub use error::{ContextError, Result};
pub use history::{
    CharBasedEstimator, ContextManager, HistoryStats, InMemorySummaryStore, Message,
    ReductionResult, RefreshOutcome, Role, Strategy, StrategyEngine, SummaryRecord, SummaryStore,
    Summarizer, TextGenerator, ThreadConfig, TokenEstimator,
};

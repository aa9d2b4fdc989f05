//! Chat history reduction with pluggable strategies
//!
//! This module decides which portion of a thread's message log is sent to the
//! model each turn: five interchangeable reduction strategies, a deterministic
//! token estimator, and an AI-assisted summarizer that caches and incrementally
//! refreshes long-range context.

pub mod generate;
pub mod manager;
pub mod models;
pub mod store;
pub mod strategy;
pub mod summarizer;
pub mod token_estimator;

pub use generate::{GenerationError, GeneratorConfig, HttpGenerator, TextGenerator};
pub use manager::ContextManager;
pub use models::{HistoryStats, Message, ReductionResult, Role, Strategy, SummaryRecord, ThreadConfig};
pub use store::{InMemorySummaryStore, SummaryStore};
pub use strategy::StrategyEngine;
pub use summarizer::{RefreshOutcome, Summarizer};
pub use token_estimator::{CharBasedEstimator, TokenEstimator, WordBasedEstimator};

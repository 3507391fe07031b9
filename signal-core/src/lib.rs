//! Core types for the headline signal pipeline
//!
//! This crate defines the shared data structures used across the pipeline:
//! source articles, model extractions, resolved tickers, per-article analysis
//! records and the per-ticker aggregates built from them.

pub mod analysis;
pub mod article;
pub mod error;
pub mod extraction;
pub mod ticker;

pub use analysis::{AnalysisRecord, SentimentCounts, TickerAggregate};
pub use article::{Article, ExtractionRequest};
pub use error::{FailureKind, SignalError, SignalResult};
pub use extraction::{CompanyMention, ExtractionRecord, Impact, RawExtraction, Sentiment};
pub use ticker::{ResolvedTicker, TickerEntry};

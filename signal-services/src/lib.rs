//! Pipeline services for headline signals
//!
//! - [`TickerRegistry`]: read-only symbol and alias lookup loaded from a snapshot
//! - [`ExtractionParser`]: tolerant decoding of raw model output
//! - [`TickerResolver`]: maps company mentions onto registry symbols
//! - [`ArticleAnalyzer`]: extraction, parsing and resolution for one article
//! - [`aggregation`]: per-ticker aggregates, rankings and deep dives
//! - [`PipelineRunner`]: bounded-concurrency run over an article batch

pub mod aggregation;
pub mod analyzer;
pub mod config;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod resolver;

pub use aggregation::{aggregate, AggregateView, Overview};
pub use analyzer::{ArticleAnalyzer, ArticleOutcome, RetryPolicy};
pub use config::PipelineConfig;
pub use parser::ExtractionParser;
pub use pipeline::{DeepDiveEntry, LogEntry, LogStatus, PipelineRunner, RunReport};
pub use registry::TickerRegistry;
pub use resolver::TickerResolver;

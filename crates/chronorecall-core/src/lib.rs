//! ChronoRecall Core Library
//!
//! Filtering, aggregation and correlation analysis over LLM historical
//! year-recall results, with a generation-keyed single-flight query cache.

pub mod aggregate;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod correlation;
pub mod dimension;
pub mod engine;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod metrics;
pub mod obs;
pub mod results;
pub mod scoring;
pub mod telemetry;

pub use aggregate::{AggregateMetrics, GroupedMetrics, Partition};
pub use cache::{CacheStats, QueryCache};
pub use catalog::{Event, EventCatalog, EventRef};
pub use config::EngineConfig;
pub use correlation::{CorrelationAdvisor, CorrelationEntry, SuggestionPolicy, CORRELATED_PAIRS};
pub use dimension::{Dimension, ValueCode};
pub use engine::{AnalysisEngine, Dataset, ExportRow, GenerationHandle, QueryOutput};
pub use error::{EngineError, Result};
pub use filter::{resolve, FilterSpec};
pub use fingerprint::Fingerprint;
pub use metrics::{MetricsSnapshot, METRICS};
pub use obs::QuerySpan;
pub use results::{group_by_model, PredictionResult, ResultStore};
pub use scoring::{extract_year, score_responses, score_year, RawResponse};
pub use telemetry::init_tracing;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

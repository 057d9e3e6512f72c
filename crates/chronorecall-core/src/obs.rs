//! Structured lifecycle events for dataset loads and queries.
//!
//! Every event carries an `event` field naming it, so JSON log output can be
//! filtered without parsing messages.

use tracing::{info, warn};

/// RAII guard for a query-scoped span tagged with the dataset generation.
///
/// ```ignore
/// let _span = QuerySpan::enter(3, "accuracy");
/// // cache and aggregation logs now carry generation = 3
/// ```
pub struct QuerySpan {
    _span: tracing::span::EnteredSpan,
}

impl QuerySpan {
    pub fn enter(generation: u64, kind: &'static str) -> Self {
        Self {
            _span: query_span(generation, kind).entered(),
        }
    }
}

/// The same span, unentered, for `.instrument()` on async queries.
pub fn query_span(generation: u64, kind: &'static str) -> tracing::Span {
    tracing::info_span!("chronorecall.query", generation, kind)
}

/// A dataset passed validation and became the current generation.
pub fn emit_dataset_loaded(generation: u64, events: usize, models: usize, results: usize) {
    info!(
        event = "dataset.loaded",
        generation,
        events,
        models,
        results,
    );
}

/// A dataset was rejected; the previous generation remains current.
pub fn emit_load_rejected(error: &dyn std::fmt::Display) {
    warn!(event = "dataset.rejected", error = %error);
}

/// A query returned, from cache or freshly computed.
pub fn emit_query_served(generation: u64, kind: &str, fingerprint: &str, matched: usize) {
    info!(
        event = "query.served",
        generation,
        kind = %kind,
        fingerprint = %fingerprint,
        matched,
    );
}

pub fn emit_suggestions(generation: u64, matched: usize, suggestions: usize) {
    info!(
        event = "query.suggested",
        generation,
        matched,
        suggestions,
    );
}

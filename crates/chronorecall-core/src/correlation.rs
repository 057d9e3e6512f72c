//! Conditional co-occurrence statistics between correlated dimensions and
//! the "smart filter" suggestions derived from them.
//!
//! Suggestions are advisory data only. Nothing here mutates a
//! [`FilterSpec`] or touches the query cache.

use serde::{Deserialize, Serialize};

use crate::catalog::{EventCatalog, EventRef};
use crate::config::EngineConfig;
use crate::dimension::{Dimension, ValueCode};
use crate::filter::FilterSpec;

/// Source → target pairs for which suggestions are offered.
pub const CORRELATED_PAIRS: [(Dimension, Dimension); 5] = [
    (Dimension::Continent, Dimension::CulturalRegion),
    (Dimension::Century, Dimension::Decade),
    (Dimension::Century, Dimension::HistoricalPeriod),
    (Dimension::ColonialStatus, Dimension::DevelopmentStatus),
    (Dimension::PrimaryCategory, Dimension::ViolenceLevel),
];

/// A suggested refinement: events with `source_value` hold
/// `suggested_value` with frequency `confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEntry {
    pub source_dimension: Dimension,
    pub source_value: String,
    pub suggested_dimension: Dimension,
    pub suggested_value: String,
    pub confidence: f64,
}

/// Co-occurrence counts for one pair over the whole catalog.
#[derive(Debug, Clone)]
struct PairTable {
    source: Dimension,
    target: Dimension,
    /// `counts[source_code][target_code]`
    counts: Vec<Vec<usize>>,
}

impl PairTable {
    fn build(catalog: &EventCatalog, source: Dimension, target: Dimension) -> Self {
        let counts = count_pairs(catalog, source, target, &catalog.all());
        Self {
            source,
            target,
            counts,
        }
    }
}

/// Suggestion thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuggestionPolicy {
    /// Candidates must exceed this conditional frequency.
    pub threshold: f64,
    /// At most this many candidates per selected source value.
    pub top_k: usize,
}

impl Default for SuggestionPolicy {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            top_k: 3,
        }
    }
}

impl From<&EngineConfig> for SuggestionPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            threshold: config.suggest_threshold,
            top_k: config.suggest_top_k,
        }
    }
}

/// Load-time correlation tables for [`CORRELATED_PAIRS`].
#[derive(Debug, Clone)]
pub struct CorrelationAdvisor {
    tables: Vec<PairTable>,
    policy: SuggestionPolicy,
}

impl CorrelationAdvisor {
    pub fn build(catalog: &EventCatalog, policy: SuggestionPolicy) -> Self {
        let tables = CORRELATED_PAIRS
            .iter()
            .map(|(source, target)| PairTable::build(catalog, *source, *target))
            .collect();
        Self { tables, policy }
    }

    pub fn policy(&self) -> SuggestionPolicy {
        self.policy
    }

    /// Whole-catalog conditional frequencies for a pair, one entry per
    /// co-occurring (source value, target value). `None` if the pair is not
    /// tracked.
    pub fn table(&self, source: Dimension, target: Dimension) -> Option<Vec<CorrelationEntry>> {
        let table = self
            .tables
            .iter()
            .find(|t| t.source == source && t.target == target)?;
        let mut entries = Vec::new();
        for (source_code, row) in table.counts.iter().enumerate() {
            let total: usize = row.iter().sum();
            for (target_code, count) in row.iter().enumerate() {
                if *count > 0 {
                    entries.push(entry(
                        source,
                        source_code as ValueCode,
                        target,
                        target_code as ValueCode,
                        *count as f64 / total as f64,
                    ));
                }
            }
        }
        Some(entries)
    }

    /// Suggest values for unconstrained target dimensions of `spec`.
    ///
    /// `matching` must be the resolution of `spec` against `catalog`.
    /// Output is ordered by pair, then by source value in enumeration order,
    /// then by descending confidence with ties broken by value.
    pub fn suggest(
        &self,
        catalog: &EventCatalog,
        spec: &FilterSpec,
        matching: &[EventRef],
    ) -> Vec<CorrelationEntry> {
        let mut suggestions = Vec::new();

        for table in &self.tables {
            let Some(selected) = spec.selected(table.source) else {
                continue;
            };
            if spec.is_constrained(table.target) {
                continue;
            }

            // When the source is the only constraint, `matching` is exactly
            // the union of its selected values and the load-time table holds
            // the same counts.
            let only_source = spec.constrained().all(|d| d == table.source);
            let recounted;
            let counts = if only_source {
                &table.counts
            } else {
                recounted = count_pairs(catalog, table.source, table.target, matching);
                &recounted
            };

            let mut source_codes: Vec<ValueCode> = selected
                .iter()
                .filter_map(|v| table.source.code_of(v))
                .collect();
            source_codes.sort_unstable();

            for source_code in source_codes {
                let row = &counts[source_code as usize];
                let total: usize = row.iter().sum();
                if total == 0 {
                    continue;
                }
                let mut candidates: Vec<CorrelationEntry> = row
                    .iter()
                    .enumerate()
                    .map(|(target_code, count)| (target_code, *count as f64 / total as f64))
                    .filter(|(_, confidence)| *confidence > self.policy.threshold)
                    .map(|(target_code, confidence)| {
                        entry(
                            table.source,
                            source_code,
                            table.target,
                            target_code as ValueCode,
                            confidence,
                        )
                    })
                    .collect();
                candidates.sort_by(|a, b| {
                    b.confidence
                        .total_cmp(&a.confidence)
                        .then_with(|| a.suggested_value.cmp(&b.suggested_value))
                });
                candidates.truncate(self.policy.top_k);
                suggestions.extend(candidates);
            }
        }

        suggestions
    }
}

fn entry(
    source: Dimension,
    source_code: ValueCode,
    target: Dimension,
    target_code: ValueCode,
    confidence: f64,
) -> CorrelationEntry {
    CorrelationEntry {
        source_dimension: source,
        source_value: source.value_of(source_code).to_string(),
        suggested_dimension: target,
        suggested_value: target.value_of(target_code).to_string(),
        confidence,
    }
}

fn count_pairs(
    catalog: &EventCatalog,
    source: Dimension,
    target: Dimension,
    events: &[EventRef],
) -> Vec<Vec<usize>> {
    let mut counts = vec![vec![0usize; target.cardinality()]; source.cardinality()];
    for handle in events {
        let s = catalog.code(*handle, source) as usize;
        let t = catalog.code(*handle, target) as usize;
        counts[s][t] += 1;
    }
    counts
}

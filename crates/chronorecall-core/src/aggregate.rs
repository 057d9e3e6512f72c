//! Accuracy and confidence statistics over a resolved event set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{EventCatalog, EventRef};
use crate::dimension::Dimension;
use crate::error::Result;
use crate::results::{PredictionResult, ResultStore};

/// Statistics for one model over one event set.
///
/// Means are `None` when there is nothing to average; they are never NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    /// Events that have a result for the model.
    pub sample_count: usize,
    /// Events in the set, with or without a result.
    pub event_count: usize,
    pub correct_count: usize,
    pub accuracy: Option<f64>,
    pub avg_confidence: Option<f64>,
    /// Mean |extracted_year - year| over samples that extracted a year.
    pub avg_year_error: Option<f64>,
    /// Median of the same errors; an even count averages the middle two.
    pub median_year_error: Option<f64>,
}

impl AggregateMetrics {
    pub fn empty() -> Self {
        Accumulator::default().finish()
    }
}

#[derive(Debug, Clone, Default)]
struct Accumulator {
    events: usize,
    samples: usize,
    correct: usize,
    confidence_sum: f64,
    year_errors: Vec<u64>,
}

impl Accumulator {
    fn observe(&mut self, year: i32, result: Option<&PredictionResult>) {
        self.events += 1;
        let Some(result) = result else {
            return;
        };
        self.samples += 1;
        if result.is_correct {
            self.correct += 1;
        }
        self.confidence_sum += result.confidence_score;
        if let Some(extracted) = result.extracted_year {
            self.year_errors
                .push((i64::from(extracted) - i64::from(year)).unsigned_abs());
        }
    }

    fn finish(mut self) -> AggregateMetrics {
        let mean = |sum: f64, n: usize| (n > 0).then(|| sum / n as f64);
        let error_sum: u64 = self.year_errors.iter().sum();
        AggregateMetrics {
            sample_count: self.samples,
            event_count: self.events,
            correct_count: self.correct,
            accuracy: mean(self.correct as f64, self.samples),
            avg_confidence: mean(self.confidence_sum, self.samples),
            avg_year_error: mean(error_sum as f64, self.year_errors.len()),
            median_year_error: median(&mut self.year_errors),
        }
    }
}

fn median(values: &mut [u64]) -> Option<f64> {
    values.sort_unstable();
    let mid = values.len() / 2;
    match values.len() {
        0 => None,
        n if n % 2 == 1 => Some(values[mid] as f64),
        _ => Some((values[mid - 1] + values[mid]) as f64 / 2.0),
    }
}

/// One value of the grouping dimension and every model's metrics for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub value: String,
    /// Shared denominator: every model's `event_count` equals this.
    pub event_count: usize,
    pub models: BTreeMap<String, AggregateMetrics>,
}

/// Metrics grouped by the values of one dimension.
///
/// Partitions follow enumeration order; values with no matching events are
/// omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedMetrics {
    pub dimension: Dimension,
    pub partitions: Vec<Partition>,
}

impl GroupedMetrics {
    pub fn partition(&self, value: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.value == value)
    }

    /// Metrics for (`value`, `model_id`).
    pub fn get(&self, value: &str, model_id: &str) -> Option<&AggregateMetrics> {
        self.partition(value).and_then(|p| p.models.get(model_id))
    }

    /// Nested `value -> model -> metrics` view.
    pub fn to_map(&self) -> BTreeMap<String, BTreeMap<String, AggregateMetrics>> {
        self.partitions
            .iter()
            .map(|p| (p.value.clone(), p.models.clone()))
            .collect()
    }
}

/// Metrics for `model_id` over `events` in a single pass.
pub fn compute(
    catalog: &EventCatalog,
    store: &ResultStore,
    model_id: &str,
    events: &[EventRef],
) -> Result<AggregateMetrics> {
    let slots = store.model(model_id)?;
    let mut acc = Accumulator::default();
    for handle in events {
        let result = slots.get(handle.index()).and_then(Option::as_ref);
        acc.observe(catalog.event(*handle).year, result);
    }
    Ok(acc.finish())
}

/// Metrics for every model in `model_ids`, partitioned by `dimension`.
///
/// One traversal of `events` feeds all models, so each partition's
/// `event_count` is identical across models.
pub fn compute_grouped(
    catalog: &EventCatalog,
    store: &ResultStore,
    model_ids: &[String],
    events: &[EventRef],
    dimension: Dimension,
) -> Result<GroupedMetrics> {
    let slots = model_ids
        .iter()
        .map(|m| store.model(m))
        .collect::<Result<Vec<_>>>()?;

    // acc[code][model]
    let mut acc = vec![vec![Accumulator::default(); model_ids.len()]; dimension.cardinality()];
    let mut counts = vec![0usize; dimension.cardinality()];

    for handle in events {
        let code = catalog.code(*handle, dimension) as usize;
        let year = catalog.event(*handle).year;
        counts[code] += 1;
        for (m, model_slots) in slots.iter().enumerate() {
            let result = model_slots.get(handle.index()).and_then(Option::as_ref);
            acc[code][m].observe(year, result);
        }
    }

    let partitions = acc
        .into_iter()
        .zip(counts)
        .enumerate()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(code, (per_model, count))| Partition {
            value: dimension.value_of(code as u16).to_string(),
            event_count: count,
            models: model_ids
                .iter()
                .cloned()
                .zip(per_model.into_iter().map(Accumulator::finish))
                .collect(),
        })
        .collect();

    Ok(GroupedMetrics {
        dimension,
        partitions,
    })
}

//! Per-model prediction outcomes keyed by (model, event).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{EventCatalog, EventRef};
use crate::error::{EngineError, Result};

/// One model's answer for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(alias = "model_name")]
    pub model_id: String,
    pub event_id: String,
    /// `None` when the model produced no parseable year.
    #[serde(default)]
    pub extracted_year: Option<i32>,
    pub is_correct: bool,
    /// In `[0, 1]`.
    pub confidence_score: f64,
}

/// Group a flat list of results by `model_id`, preserving per-model order.
pub fn group_by_model(results: Vec<PredictionResult>) -> BTreeMap<String, Vec<PredictionResult>> {
    let mut grouped: BTreeMap<String, Vec<PredictionResult>> = BTreeMap::new();
    for result in results {
        grouped
            .entry(result.model_id.clone())
            .or_default()
            .push(result);
    }
    grouped
}

/// Read-only store of prediction results.
///
/// Results reference events by id and are resolved through the catalog at
/// load time; each model's results are held densely by [`EventRef`].
#[derive(Debug, Default)]
pub struct ResultStore {
    models: BTreeMap<String, Vec<Option<PredictionResult>>>,
    total: usize,
}

impl ResultStore {
    /// Validate and index `results_per_model` against `catalog`.
    ///
    /// A model listed with no results is still known to the store.
    pub fn load<I>(catalog: &EventCatalog, results_per_model: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<PredictionResult>)>,
    {
        let mut models = BTreeMap::new();
        let mut total = 0;

        for (model_id, results) in results_per_model {
            if model_id.is_empty() {
                return Err(EngineError::validation("<empty model id>", "model_id", ""));
            }
            let mut slots: Vec<Option<PredictionResult>> = vec![None; catalog.len()];

            for result in results {
                let record = format!("{}/{}", model_id, result.event_id);
                if result.model_id != model_id {
                    return Err(EngineError::validation(record, "model_id", &result.model_id));
                }
                if !result.confidence_score.is_finite()
                    || !(0.0..=1.0).contains(&result.confidence_score)
                {
                    return Err(EngineError::validation(
                        record,
                        "confidence_score",
                        result.confidence_score.to_string(),
                    ));
                }
                let handle = catalog
                    .lookup(&result.event_id)
                    .map_err(|_| EngineError::validation(&record, "event_id", &result.event_id))?;

                let slot = &mut slots[handle.index()];
                if slot.is_some() {
                    return Err(EngineError::validation(record, "event_id", &result.event_id));
                }
                *slot = Some(result);
                total += 1;
            }

            if models.insert(model_id.clone(), slots).is_some() {
                return Err(EngineError::validation(&model_id, "model_id", &model_id));
            }
        }

        Ok(Self { models, total })
    }

    /// The result for (`model_id`, `event`), if the model answered it.
    pub fn get(&self, model_id: &str, event: EventRef) -> Option<&PredictionResult> {
        self.models
            .get(model_id)
            .and_then(|slots| slots.get(event.index()))
            .and_then(Option::as_ref)
    }

    /// All result slots for a model, indexed by [`EventRef`].
    pub fn model(&self, model_id: &str) -> Result<&[Option<PredictionResult>]> {
        self.models
            .get(model_id)
            .map(Vec::as_slice)
            .ok_or_else(|| EngineError::model_not_found(model_id))
    }

    pub fn contains_model(&self, model_id: &str) -> bool {
        self.models.contains_key(model_id)
    }

    /// Model ids in ascending order.
    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Total number of stored results across models.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

//! The analysis engine: dataset generations, cached queries and
//! suggestions.
//!
//! Each successful [`AnalysisEngine::load_dataset`] builds an immutable
//! [`Dataset`] under a new generation number and makes it current. Callers
//! query through a [`GenerationHandle`], so a handle keeps answering from the
//! snapshot it was issued for even after a reload. Cached results are keyed
//! by generation and older generations are dropped from the cache on reload.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, Instrument};

use crate::aggregate::{self, AggregateMetrics, GroupedMetrics};
use crate::cache::{CacheStats, QueryCache};
use crate::catalog::{Event, EventCatalog};
use crate::config::EngineConfig;
use crate::correlation::{CorrelationAdvisor, CorrelationEntry, SuggestionPolicy};
use crate::dimension::Dimension;
use crate::error::{EngineError, Result};
use crate::filter::{self, FilterSpec};
use crate::fingerprint::Fingerprint;
use crate::metrics::METRICS;
use crate::obs;
use crate::results::{PredictionResult, ResultStore};

/// Everything built from one successful load.
#[derive(Debug)]
pub struct Dataset {
    generation: u64,
    catalog: EventCatalog,
    results: ResultStore,
    advisor: CorrelationAdvisor,
}

impl Dataset {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn advisor(&self) -> &CorrelationAdvisor {
        &self.advisor
    }
}

/// Cheap, cloneable reference to one dataset generation.
#[derive(Debug, Clone)]
pub struct GenerationHandle(Arc<Dataset>);

impl GenerationHandle {
    pub fn generation(&self) -> u64 {
        self.0.generation
    }

    pub fn dataset(&self) -> &Dataset {
        &self.0
    }

    /// Model ids in ascending order.
    pub fn model_ids(&self) -> Vec<String> {
        self.0.results.model_ids().map(str::to_string).collect()
    }
}

/// What the query cache stores.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Metrics(AggregateMetrics),
    Grouped(GroupedMetrics),
}

/// One matching event with every model's result for it, by model id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub event: Event,
    pub results: Vec<PredictionResult>,
}

pub struct AnalysisEngine {
    config: EngineConfig,
    current: RwLock<Option<Arc<Dataset>>>,
    generations: AtomicU64,
    cache: QueryCache<QueryOutput>,
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("config", &self.config)
            .field("current", &self.current().map(|h| h.generation()))
            .finish_non_exhaustive()
    }
}

impl AnalysisEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let cache = QueryCache::new(config.cache_capacity)?;
        Ok(Self {
            config,
            current: RwLock::new(None),
            generations: AtomicU64::new(0),
            cache,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate and install a new dataset generation.
    ///
    /// On any validation error nothing changes: the previous generation, if
    /// any, stays current and its handles remain valid.
    pub async fn load_dataset<I>(
        &self,
        events: Vec<Event>,
        results_per_model: I,
    ) -> Result<GenerationHandle>
    where
        I: IntoIterator<Item = (String, Vec<PredictionResult>)>,
    {
        let built = EventCatalog::load(events).and_then(|catalog| {
            let results = ResultStore::load(&catalog, results_per_model)?;
            Ok((catalog, results))
        });
        let (catalog, results) = match built {
            Ok(parts) => parts,
            Err(error) => {
                METRICS.inc_loads_rejected();
                obs::emit_load_rejected(&error);
                return Err(error);
            }
        };

        let advisor = CorrelationAdvisor::build(&catalog, SuggestionPolicy::from(&self.config));
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let dataset = Arc::new(Dataset {
            generation,
            catalog,
            results,
            advisor,
        });

        let installed = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            // Concurrent loads may finish out of order; never go backwards.
            let newer = current
                .as_ref()
                .map_or(true, |active| active.generation < generation);
            if newer {
                *current = Some(Arc::clone(&dataset));
            }
            newer
        };

        if installed {
            self.cache.retain_generation(generation).await;
        } else {
            debug!(generation, "superseded by a newer load before install");
        }

        METRICS.inc_datasets_loaded();
        let model_count = dataset.results.model_ids().count();
        obs::emit_dataset_loaded(
            generation,
            dataset.catalog.len(),
            model_count,
            dataset.results.len(),
        );
        Ok(GenerationHandle(dataset))
    }

    /// Handle to the current generation, if a dataset has been loaded.
    pub fn current(&self) -> Option<GenerationHandle> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|dataset| GenerationHandle(Arc::clone(dataset)))
    }

    /// Accuracy and confidence of `model_id` over events matching `filter`.
    pub async fn query_accuracy(
        &self,
        handle: &GenerationHandle,
        model_id: &str,
        filter: &FilterSpec,
    ) -> Result<AggregateMetrics> {
        let dataset = Arc::clone(&handle.0);
        dataset.results.model(model_id)?;
        filter.validate()?;

        let models = vec![model_id.to_string()];
        let key = Fingerprint::for_query(dataset.generation, &models, filter, None)?;
        let span = obs::query_span(dataset.generation, "accuracy");

        let output = {
            let dataset = Arc::clone(&dataset);
            let filter = filter.clone();
            let model_id = model_id.to_string();
            self.cache
                .get_or_compute(key.clone(), move || async move {
                    let matched = filter::resolve(&dataset.catalog, &filter)?;
                    let metrics =
                        aggregate::compute(&dataset.catalog, &dataset.results, &model_id, &matched)?;
                    Ok(QueryOutput::Metrics(metrics))
                })
                .instrument(span)
                .await?
        };

        match output.as_ref() {
            QueryOutput::Metrics(metrics) => {
                METRICS.inc_queries_served();
                obs::emit_query_served(
                    dataset.generation,
                    "accuracy",
                    key.short(),
                    metrics.event_count,
                );
                Ok(metrics.clone())
            }
            QueryOutput::Grouped(_) => Err(mismatched_output(&key)),
        }
    }

    /// Metrics for every model in `model_ids`, partitioned by the values of
    /// `dimension` among events matching `filter`.
    ///
    /// The filter is resolved once and the same event sequence feeds every
    /// model, so each partition has one `event_count` shared by all models.
    pub async fn query_accuracy_grouped(
        &self,
        handle: &GenerationHandle,
        model_ids: &[String],
        filter: &FilterSpec,
        dimension: Dimension,
    ) -> Result<GroupedMetrics> {
        let dataset = Arc::clone(&handle.0);
        let mut models = model_ids.to_vec();
        models.sort_unstable();
        models.dedup();
        for model_id in &models {
            dataset.results.model(model_id)?;
        }
        filter.validate()?;

        let key = Fingerprint::for_query(dataset.generation, &models, filter, Some(dimension))?;
        let span = obs::query_span(dataset.generation, "grouped");

        let output = {
            let dataset = Arc::clone(&dataset);
            let filter = filter.clone();
            self.cache
                .get_or_compute(key.clone(), move || async move {
                    let matched = filter::resolve(&dataset.catalog, &filter)?;
                    let grouped = aggregate::compute_grouped(
                        &dataset.catalog,
                        &dataset.results,
                        &models,
                        &matched,
                        dimension,
                    )?;
                    Ok(QueryOutput::Grouped(grouped))
                })
                .instrument(span)
                .await?
        };

        match output.as_ref() {
            QueryOutput::Grouped(grouped) => {
                METRICS.inc_queries_served();
                let matched = grouped.partitions.iter().map(|p| p.event_count).sum();
                obs::emit_query_served(dataset.generation, "grouped", key.short(), matched);
                Ok(grouped.clone())
            }
            QueryOutput::Metrics(_) => Err(mismatched_output(&key)),
        }
    }

    /// Refinements for dimensions `filter` leaves unconstrained.
    ///
    /// Purely advisory: never cached and never applied to `filter`.
    pub fn suggest_correlated(
        &self,
        handle: &GenerationHandle,
        filter: &FilterSpec,
    ) -> Result<Vec<CorrelationEntry>> {
        let dataset = &handle.0;
        let _span = obs::QuerySpan::enter(dataset.generation, "suggest");
        let matched = filter::resolve(&dataset.catalog, filter)?;
        let suggestions = dataset.advisor.suggest(&dataset.catalog, filter, &matched);
        obs::emit_suggestions(dataset.generation, matched.len(), suggestions.len());
        Ok(suggestions)
    }

    /// Matching events in canonical order, each with its results.
    pub fn export_filtered(
        &self,
        handle: &GenerationHandle,
        filter: &FilterSpec,
    ) -> Result<Vec<ExportRow>> {
        let dataset = &handle.0;
        let _span = obs::QuerySpan::enter(dataset.generation, "export");
        let matched = filter::resolve(&dataset.catalog, filter)?;

        let rows: Vec<ExportRow> = matched
            .iter()
            .map(|event_ref| ExportRow {
                event: dataset.catalog.event(*event_ref).clone(),
                results: dataset
                    .results
                    .model_ids()
                    .filter_map(|model_id| dataset.results.get(model_id, *event_ref))
                    .cloned()
                    .collect(),
            })
            .collect();
        info!(generation = dataset.generation, rows = rows.len(), "export built");
        Ok(rows)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

fn mismatched_output(key: &Fingerprint) -> EngineError {
    EngineError::Serialization(format!("cached output for {key} has the wrong shape"))
}

//! ChronoRecall - historical year-recall analysis CLI
//!
//! The `chronorecall` command loads a classified event dataset plus model
//! results and answers accuracy questions about them.
//!
//! ## Commands
//!
//! - `summary`: dataset size and overall metrics per model
//! - `query`: accuracy of one model over a filtered event set
//! - `grouped`: per-value comparison of several models along one dimension
//! - `suggest`: correlated refinements for a filter
//! - `export`: matching events with their results
//! - `score`: turn raw model answers into result records
//! - `dimensions`: list dimensions and their values

use anyhow::{bail, Context, Result};
use chronorecall_core::{
    group_by_model, score_responses, AggregateMetrics, AnalysisEngine, CorrelationEntry,
    Dimension, EngineConfig, Event, EventCatalog, ExportRow, FilterSpec, GenerationHandle,
    GroupedMetrics, PredictionResult, RawResponse, CORRELATED_PAIRS, METRICS,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};

#[derive(Parser)]
#[command(name = "chronorecall")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Analyse how well language models recall when historical events happened", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Event dataset (JSON array of event records)
    #[arg(long, global = true)]
    events: Option<PathBuf>,

    /// Result files (JSON arrays of result records, any mix of models)
    #[arg(long, global = true, num_args = 1..)]
    results: Vec<PathBuf>,

    #[command(flatten)]
    tuning: Tuning,

    #[command(subcommand)]
    command: Commands,
}

/// Flags layered over `EngineConfig::from_env`, so `CHRONORECALL_*` variables
/// apply unless a flag is given.
#[derive(Args, Debug, Default)]
struct Tuning {
    /// Maximum number of cached query results
    #[arg(long, global = true)]
    cache_capacity: Option<usize>,

    /// Minimum conditional frequency (exclusive) for a suggestion
    #[arg(long, global = true)]
    suggest_threshold: Option<f64>,

    /// Maximum suggestions per selected value
    #[arg(long, global = true)]
    suggest_top_k: Option<usize>,
}

impl Tuning {
    fn config(&self) -> Result<EngineConfig> {
        let mut config =
            EngineConfig::from_env().context("Invalid engine configuration in environment")?;
        if let Some(v) = self.cache_capacity {
            config.cache_capacity = v;
        }
        if let Some(v) = self.suggest_threshold {
            config.suggest_threshold = v;
        }
        if let Some(v) = self.suggest_top_k {
            config.suggest_top_k = v;
        }
        config.validate().context("Invalid engine configuration")?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Dataset size and overall metrics for every model
    Summary,

    /// Accuracy of one model over the events matching a filter
    Query {
        /// Model id
        #[arg(short, long)]
        model: String,

        /// Filter clause `dimension=value1,value2` (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },

    /// Compare models across the values of one dimension
    Grouped {
        /// Model ids (default: every loaded model)
        #[arg(short, long = "model")]
        models: Vec<String>,

        /// Dimension to group by
        #[arg(short, long)]
        by: String,

        /// Filter clause `dimension=value1,value2` (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },

    /// Suggest correlated refinements for a filter
    Suggest {
        /// Filter clause `dimension=value1,value2` (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },

    /// Whole-catalog conditional frequencies for every correlated pair
    Correlations,

    /// Write matching events and their results as JSON
    Export {
        /// Filter clause `dimension=value1,value2` (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score raw model responses against the event dataset
    Score {
        /// JSON array of {model_id, event_id, response}
        #[arg(long)]
        responses: PathBuf,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List dimensions and their values
    Dimensions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    chronorecall_core::init_tracing(cli.json, level);

    let outcome = run(cli).await;
    METRICS.flush();
    outcome
}

async fn run(cli: Cli) -> Result<()> {
    let events = cli.events.as_deref();
    match cli.command {
        Commands::Dimensions => write_json(&cmd_dimensions(), None),
        Commands::Score { responses, output } => {
            let scored = cmd_score(require_events(events)?, &responses)?;
            write_json(&scored, output.as_deref())
        }
        Commands::Summary => {
            let (engine, handle) = open(&cli.tuning, events, &cli.results).await?;
            write_json(&cmd_summary(&engine, &handle).await?, None)
        }
        Commands::Query { model, filters } => {
            let (engine, handle) = open(&cli.tuning, events, &cli.results).await?;
            let metrics = cmd_query(&engine, &handle, &model, &filters).await?;
            write_json(&metrics, None)
        }
        Commands::Grouped {
            models,
            by,
            filters,
        } => {
            let (engine, handle) = open(&cli.tuning, events, &cli.results).await?;
            let grouped = cmd_grouped(&engine, &handle, &models, &by, &filters).await?;
            write_json(&grouped, None)
        }
        Commands::Suggest { filters } => {
            let (engine, handle) = open(&cli.tuning, events, &cli.results).await?;
            write_json(&cmd_suggest(&engine, &handle, &filters)?, None)
        }
        Commands::Correlations => {
            let (_engine, handle) = open(&cli.tuning, events, &cli.results).await?;
            write_json(&cmd_correlations(&handle), None)
        }
        Commands::Export { filters, output } => {
            let (engine, handle) = open(&cli.tuning, events, &cli.results).await?;
            let rows = cmd_export(&engine, &handle, &filters)?;
            write_json(&rows, output.as_deref())
        }
    }
}

fn require_events(events: Option<&Path>) -> Result<&Path> {
    match events {
        Some(path) => Ok(path),
        None => bail!("--events <FILE> is required for this command"),
    }
}

async fn open(
    tuning: &Tuning,
    events: Option<&Path>,
    results: &[PathBuf],
) -> Result<(AnalysisEngine, GenerationHandle)> {
    open_engine(tuning.config()?, require_events(events)?, results).await
}

/// Load the dataset files into a fresh engine.
async fn open_engine(
    config: EngineConfig,
    events_path: &Path,
    results_paths: &[PathBuf],
) -> Result<(AnalysisEngine, GenerationHandle)> {
    let events: Vec<Event> = read_json_file(events_path)?;
    let mut results: Vec<PredictionResult> = Vec::new();
    for path in results_paths {
        let batch: Vec<PredictionResult> = read_json_file(path)?;
        debug!(path = %path.display(), records = batch.len(), "read results");
        results.extend(batch);
    }

    let engine = AnalysisEngine::new(config).context("Failed to create analysis engine")?;
    let handle = engine
        .load_dataset(events, group_by_model(results))
        .await
        .with_context(|| format!("Rejected dataset {:?}", events_path))?;
    info!(
        generation = handle.generation(),
        models = handle.model_ids().len(),
        "dataset ready"
    );
    Ok((engine, handle))
}

/// Parse `dimension=value1,value2` clauses. Repeating a dimension adds
/// values to it.
fn parse_filter(clauses: &[String]) -> Result<FilterSpec> {
    let mut pairs: Vec<(String, Vec<String>)> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let (dimension, values) = clause
            .split_once('=')
            .with_context(|| format!("Filter clause {clause:?} is not dimension=values"))?;
        let values: Vec<String> = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if values.is_empty() {
            bail!("Filter clause {clause:?} selects no values");
        }
        pairs.push((dimension.trim().to_string(), values));
    }
    let spec = FilterSpec::from_named(pairs)?;
    spec.validate()?;
    Ok(spec)
}

#[derive(Debug, Serialize)]
struct Summary {
    generation: u64,
    events: usize,
    results: usize,
    models: BTreeMap<String, AggregateMetrics>,
}

async fn cmd_summary(engine: &AnalysisEngine, handle: &GenerationHandle) -> Result<Summary> {
    let all = FilterSpec::all();
    let mut models = BTreeMap::new();
    for model in handle.model_ids() {
        let metrics = engine.query_accuracy(handle, &model, &all).await?;
        models.insert(model, metrics);
    }
    let dataset = handle.dataset();
    Ok(Summary {
        generation: handle.generation(),
        events: dataset.catalog().len(),
        results: dataset.results().len(),
        models,
    })
}

async fn cmd_query(
    engine: &AnalysisEngine,
    handle: &GenerationHandle,
    model: &str,
    filters: &[String],
) -> Result<AggregateMetrics> {
    let spec = parse_filter(filters)?;
    engine
        .query_accuracy(handle, model, &spec)
        .await
        .with_context(|| format!("Query for model {model:?} failed"))
}

async fn cmd_grouped(
    engine: &AnalysisEngine,
    handle: &GenerationHandle,
    models: &[String],
    by: &str,
    filters: &[String],
) -> Result<GroupedMetrics> {
    let dimension: Dimension = by.parse()?;
    let spec = parse_filter(filters)?;
    let models = if models.is_empty() {
        handle.model_ids()
    } else {
        models.to_vec()
    };
    Ok(engine
        .query_accuracy_grouped(handle, &models, &spec, dimension)
        .await?)
}

fn cmd_suggest(
    engine: &AnalysisEngine,
    handle: &GenerationHandle,
    filters: &[String],
) -> Result<Vec<CorrelationEntry>> {
    let spec = parse_filter(filters)?;
    Ok(engine.suggest_correlated(handle, &spec)?)
}

#[derive(Debug, Serialize)]
struct PairTable {
    source: Dimension,
    target: Dimension,
    entries: Vec<CorrelationEntry>,
}

fn cmd_correlations(handle: &GenerationHandle) -> Vec<PairTable> {
    let dataset = handle.dataset();
    CORRELATED_PAIRS
        .iter()
        .filter_map(|&(source, target)| {
            let entries = dataset.advisor().table(source, target)?;
            Some(PairTable {
                source,
                target,
                entries,
            })
        })
        .collect()
}

fn cmd_export(
    engine: &AnalysisEngine,
    handle: &GenerationHandle,
    filters: &[String],
) -> Result<Vec<ExportRow>> {
    let spec = parse_filter(filters)?;
    Ok(engine.export_filtered(handle, &spec)?)
}

fn cmd_score(events_path: &Path, responses_path: &Path) -> Result<Vec<PredictionResult>> {
    let events: Vec<Event> = read_json_file(events_path)?;
    let catalog = EventCatalog::load(events)
        .with_context(|| format!("Rejected dataset {:?}", events_path))?;
    let responses: Vec<RawResponse> = read_json_file(responses_path)?;
    let scored = score_responses(&catalog, &responses)?;
    let correct = scored.iter().filter(|r| r.is_correct).count();
    info!(responses = scored.len(), correct, "scored responses");
    Ok(scored)
}

#[derive(Debug, Serialize)]
struct DimensionInfo {
    name: &'static str,
    values: &'static [&'static str],
}

fn cmd_dimensions() -> Vec<DimensionInfo> {
    Dimension::ALL
        .iter()
        .map(|d| DimensionInfo {
            name: d.name(),
            values: d.values(),
        })
        .collect()
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

/// Pretty JSON to `output`, or stdout when `None`.
fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{rendered}\n"))
                .with_context(|| format!("Failed to write {:?}", path))?;
            info!(path = %path.display(), "wrote output");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_json(id: &str, year: i32, continent: &str, region: &str) -> serde_json::Value {
        json!({
            "id": id,
            "text": format!("event {id}"),
            "year": year,
            "primary_category": "Politics & Government",
            "violence_level": "peaceful",
            "scale": "national",
            "human_impact": "mass population",
            "continent": continent,
            "cultural_region": region,
            "development_status": "developed",
            "colonial_status": "independent",
            "century": "1900-1999",
            "decade": "1950s",
            "historical_period": "Modern",
            "season": "Spring"
        })
    }

    /// Writes an events file and one results file mixing two models.
    fn dataset(dir: &Path) -> (PathBuf, PathBuf) {
        let events = dir.join("events.json");
        let results = dir.join("results.json");
        std::fs::write(
            &events,
            json!([
                event_json("e1", 1952, "Europe", "Western"),
                event_json("e2", 1958, "Asia", "Eastern"),
                event_json("e3", 1955, "Europe", "Western"),
            ])
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            &results,
            json!([
                {"model_id": "m1", "event_id": "e1", "extracted_year": 1952,
                 "is_correct": true, "confidence_score": 1.0},
                {"model_id": "m1", "event_id": "e3", "extracted_year": 1950,
                 "is_correct": false, "confidence_score": 0.6},
                {"model_name": "m2", "event_id": "e2", "extracted_year": 1958,
                 "is_correct": true, "confidence_score": 1.0}
            ])
            .to_string(),
        )
        .unwrap();
        (events, results)
    }

    #[test]
    fn test_parse_filter_clauses() {
        let spec = parse_filter(&[
            "continent=Europe, Asia".to_string(),
            "decade=1950s".to_string(),
            "continent=Africa".to_string(),
        ])
        .unwrap();
        let continents: Vec<&str> = spec
            .selected(Dimension::Continent)
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(continents, vec!["Africa", "Asia", "Europe"]);
        assert!(spec.is_constrained(Dimension::Decade));
    }

    #[test]
    fn test_parse_filter_rejects_malformed_clauses() {
        for bad in ["continent", "continent=", "planet=Mars", "continent=Atlantis"] {
            assert!(parse_filter(&[bad.to_string()]).is_err(), "{bad} accepted");
        }
        assert!(parse_filter(&[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_and_query_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let (events, results) = dataset(dir.path());
        let (engine, handle) = open_engine(EngineConfig::default(), &events, &[results])
            .await
            .unwrap();

        let summary = cmd_summary(&engine, &handle).await.unwrap();
        assert_eq!(summary.events, 3);
        assert_eq!(summary.results, 3);
        assert_eq!(summary.models["m1"].accuracy, Some(0.5));
        assert_eq!(summary.models["m2"].sample_count, 1);

        let metrics = cmd_query(&engine, &handle, "m1", &["continent=Europe".to_string()])
            .await
            .unwrap();
        assert_eq!(metrics.event_count, 2);
        assert_eq!(metrics.avg_year_error, Some(2.5));
        assert_eq!(metrics.median_year_error, Some(2.5));

        let err = cmd_query(&engine, &handle, "nobody", &[]).await.unwrap_err();
        assert!(format!("{err:#}").contains("nobody"));
    }

    #[tokio::test]
    async fn test_grouped_defaults_to_every_model() {
        let dir = tempfile::tempdir().unwrap();
        let (events, results) = dataset(dir.path());
        let (engine, handle) = open_engine(EngineConfig::default(), &events, &[results])
            .await
            .unwrap();

        let grouped = cmd_grouped(&engine, &handle, &[], "continental", &[])
            .await
            .unwrap();
        assert_eq!(grouped.dimension, Dimension::Continent);
        assert_eq!(grouped.partitions.len(), 2);
        assert_eq!(grouped.partitions[0].models.len(), 2);
    }

    #[tokio::test]
    async fn test_correlations_lists_every_pair() {
        let dir = tempfile::tempdir().unwrap();
        let (events, results) = dataset(dir.path());
        let (_engine, handle) = open_engine(EngineConfig::default(), &events, &[results])
            .await
            .unwrap();

        let tables = cmd_correlations(&handle);
        assert_eq!(tables.len(), CORRELATED_PAIRS.len());
        assert_eq!(tables[0].source, Dimension::Continent);
        assert_eq!(tables[0].target, Dimension::CulturalRegion);

        let regions: Vec<(&str, &str, f64)> = tables[0]
            .entries
            .iter()
            .map(|e| {
                (
                    e.source_value.as_str(),
                    e.suggested_value.as_str(),
                    e.confidence,
                )
            })
            .collect();
        assert_eq!(regions.len(), 2);
        assert!(regions.contains(&("Europe", "Western", 1.0)));
        assert!(regions.contains(&("Asia", "Eastern", 1.0)));
    }

    #[tokio::test]
    async fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let (events, results) = dataset(dir.path());
        let (engine, handle) = open_engine(EngineConfig::default(), &events, &[results])
            .await
            .unwrap();

        let rows = cmd_export(&engine, &handle, &["continent=Asia".to_string()]).unwrap();
        let out = dir.path().join("export.json");
        write_json(&rows, Some(&out)).unwrap();

        let written: Vec<ExportRow> = read_json_file(&out).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].event.id, "e2");
        assert_eq!(written[0].results[0].model_id, "m2");
    }

    #[tokio::test]
    async fn test_rejected_dataset_reports_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let events = dir.path().join("events.json");
        std::fs::write(
            &events,
            json!([event_json("e1", 1952, "Atlantis", "Western")]).to_string(),
        )
        .unwrap();

        let err = open_engine(EngineConfig::default(), &events, &[])
            .await
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Rejected dataset"), "unexpected error: {msg}");
        assert!(msg.contains("Atlantis"), "unexpected error: {msg}");
    }

    #[test]
    fn test_score_command() {
        let dir = tempfile::tempdir().unwrap();
        let (events, _) = dataset(dir.path());
        let responses = dir.path().join("responses.json");
        std::fs::write(
            &responses,
            json!([
                {"model_id": "m3", "event_id": "e1", "response": "It was 1952."},
                {"model_id": "m3", "event_id": "e2", "response": "Probably 1960"}
            ])
            .to_string(),
        )
        .unwrap();

        let scored = cmd_score(&events, &responses).unwrap();
        assert_eq!(scored.len(), 2);
        assert!(scored[0].is_correct);
        assert_eq!(scored[1].confidence_score, 0.6);
    }

    #[test]
    fn test_tuning_overrides_and_validation() {
        let tuning = Tuning {
            cache_capacity: Some(8),
            suggest_threshold: None,
            suggest_top_k: Some(1),
        };
        let config = tuning.config().unwrap();
        assert_eq!(config.cache_capacity, 8);
        assert_eq!(config.suggest_top_k, 1);
        assert_eq!(config.suggest_threshold, 0.4);

        let bad = Tuning {
            suggest_threshold: Some(2.0),
            ..Default::default()
        };
        assert!(bad.config().is_err());
    }

    #[test]
    fn test_tuning_layers_flags_over_environment() {
        // Other tests leave the cache capacity to a flag or accept any valid value.
        std::env::set_var(chronorecall_core::config::ENV_CACHE_CAPACITY, "5");
        let from_env = Tuning::default().config().unwrap();
        let flagged = Tuning {
            cache_capacity: Some(9),
            ..Default::default()
        }
        .config()
        .unwrap();
        std::env::remove_var(chronorecall_core::config::ENV_CACHE_CAPACITY);

        assert_eq!(from_env.cache_capacity, 5);
        assert_eq!(flagged.cache_capacity, 9);
    }

    #[test]
    fn test_dimensions_listing() {
        let dims = cmd_dimensions();
        assert_eq!(dims.len(), 12);
        assert_eq!(dims[4].name, "continent");
        assert!(dims[4].values.contains(&"Oceania"));
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "chronorecall",
            "query",
            "--model",
            "m1",
            "--filter",
            "continent=Europe",
            "--events",
            "events.json",
            "--results",
            "a.json",
            "b.json",
        ])
        .unwrap();
        assert_eq!(cli.results.len(), 2);
        assert!(matches!(cli.command, Commands::Query { .. }));
    }
}

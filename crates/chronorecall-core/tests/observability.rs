//! Structured log events emitted by the engine lifecycle.

mod common;

use chronorecall_core::{AnalysisEngine, Dimension, EngineConfig, FilterSpec, METRICS};
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn load_and_query_emit_lifecycle_events() {
    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    let handle = engine
        .load_dataset(
            common::three_events(),
            vec![("m1".to_string(), vec![common::result("m1", "e1", true)])],
        )
        .await
        .unwrap();
    assert!(logs_contain("dataset.loaded"));

    let filter = FilterSpec::all().with(Dimension::Continent, ["Europe"]);
    engine.query_accuracy(&handle, "m1", &filter).await.unwrap();
    engine.query_accuracy(&handle, "m1", &filter).await.unwrap();
    assert!(logs_contain("query.served"));
    assert!(logs_contain("cache miss"));
    assert!(logs_contain("cache hit"));

    engine.suggest_correlated(&handle, &filter).unwrap();
    assert!(logs_contain("query.suggested"));
}

#[tokio::test]
#[traced_test]
async fn rejected_load_is_a_warning() {
    let engine = AnalysisEngine::new(EngineConfig::default()).unwrap();
    let mut bad = common::three_events();
    bad[1].season = "Monsoon".to_string();

    assert!(engine.load_dataset(bad, Vec::new()).await.is_err());
    assert!(logs_contain("dataset.rejected"));
    assert!(logs_contain("Monsoon"));
}

#[traced_test]
#[test]
fn metrics_flush_reports_counters() {
    METRICS.inc_queries_served();
    METRICS.flush();
    assert!(logs_contain("metric=\"flush\""));
    assert!(METRICS.snapshot().queries_served >= 1);
}

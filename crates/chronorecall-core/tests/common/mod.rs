//! Shared dataset fixtures for the integration tests.

#![allow(dead_code)]

use chronorecall_core::{Dimension, Event, PredictionResult};
use serde_json::{json, Map, Value};

/// Build an event from JSON, filling every dimension not in `overrides`
/// with a fixed valid value.
pub fn event(id: &str, year: i32, overrides: Value) -> Event {
    let mut record = Map::new();
    record.insert("id".into(), json!(id));
    record.insert("text".into(), json!(format!("event {id}")));
    record.insert("year".into(), json!(year));
    for dimension in Dimension::ALL {
        record.insert(dimension.name().into(), json!(dimension.values()[0]));
    }
    if let Value::Object(fields) = overrides {
        record.extend(fields);
    }
    serde_json::from_value(Value::Object(record)).expect("fixture event is valid")
}

/// `count` events whose dimension values cycle at different rates, so that
/// every dimension has several populated values and filters intersect
/// non-trivially.
pub fn synthetic_events(count: usize) -> Vec<Event> {
    const STRIDES: [usize; Dimension::COUNT] = [3, 1, 5, 2, 7, 3, 1, 11, 5, 1, 3, 7];
    (0..count)
        .map(|i| {
            let mut overrides = Map::new();
            for (dimension, stride) in Dimension::ALL.into_iter().zip(STRIDES) {
                let values = dimension.values();
                overrides.insert(
                    dimension.name().into(),
                    json!(values[(i * stride + i / 4) % values.len()]),
                );
            }
            event(&format!("ev{i:03}"), 1500 + (i as i32 * 13) % 520, Value::Object(overrides))
        })
        .collect()
}

/// One result per event for `model`; every `modulo`-th event is answered
/// correctly and every seventh event is skipped.
pub fn synthetic_results(model: &str, events: &[Event], modulo: usize) -> Vec<PredictionResult> {
    events
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 7 != 6)
        .map(|(i, e)| {
            let correct = i % modulo == 0;
            PredictionResult {
                model_id: model.to_string(),
                event_id: e.id.clone(),
                extracted_year: Some(if correct { e.year } else { e.year + 3 }),
                is_correct: correct,
                confidence_score: if correct { 1.0 } else { 0.6 },
            }
        })
        .collect()
}

pub fn result(model: &str, event_id: &str, correct: bool) -> PredictionResult {
    PredictionResult {
        model_id: model.to_string(),
        event_id: event_id.to_string(),
        extracted_year: None,
        is_correct: correct,
        confidence_score: if correct { 1.0 } else { 0.2 },
    }
}

/// The three-event dataset from the usage scenarios.
pub fn three_events() -> Vec<Event> {
    vec![
        event(
            "e1",
            1952,
            json!({"continent": "Europe", "primary_category": "Politics & Government",
                   "century": "1900-1999", "decade": "1950s"}),
        ),
        event(
            "e2",
            1980,
            json!({"continent": "Asia", "primary_category": "Military & Warfare",
                   "century": "1900-1999", "decade": "1980s"}),
        ),
        event(
            "e3",
            1990,
            json!({"continent": "Europe", "primary_category": "Science & Technology",
                   "century": "1900-1999", "decade": "1990s"}),
        ),
    ]
}

//! Turn free-text model answers into [`PredictionResult`]s.
//!
//! A year is pulled from the response and compared with the event's true
//! year; the distance maps to a coarse confidence tier.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::EventCatalog;
use crate::error::Result;
use crate::results::PredictionResult;

/// Extracted years outside this range are ignored.
pub const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 1500..=2024;

/// One model's raw answer to "what year did this event occur?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    #[serde(alias = "model_name")]
    pub model_id: String,
    pub event_id: String,
    #[serde(default)]
    pub response: String,
}

static MODERN_YEAR_RE: OnceLock<Regex> = OnceLock::new();
static ANY_YEAR_RE: OnceLock<Regex> = OnceLock::new();

/// The year a response names, if any.
///
/// Years 1500-2029 are preferred over other four-digit numbers. Only the
/// first match of each pattern is considered.
pub fn extract_year(response: &str) -> Option<i32> {
    let modern = MODERN_YEAR_RE.get_or_init(|| {
        Regex::new(r"\b(1[5-9]\d{2}|20[0-2]\d)\b").expect("modern year pattern is valid")
    });
    let any = ANY_YEAR_RE
        .get_or_init(|| Regex::new(r"\b(\d{4})\b").expect("four-digit pattern is valid"));

    [modern, any].into_iter().find_map(|re| {
        re.captures(response)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .filter(|year| PLAUSIBLE_YEARS.contains(year))
    })
}

/// `(is_correct, confidence)` for an extracted year against the truth.
pub fn score_year(extracted: Option<i32>, truth: i32) -> (bool, f64) {
    let Some(year) = extracted else {
        return (false, 0.0);
    };
    let confidence = match (i64::from(year) - i64::from(truth)).unsigned_abs() {
        0 => 1.0,
        1 => 0.8,
        2..=5 => 0.6,
        6..=10 => 0.4,
        11..=50 => 0.2,
        _ => 0.1,
    };
    (year == truth, confidence)
}

/// Score every response against `catalog`.
///
/// Output order follows input order. An unknown event id fails the batch.
pub fn score_responses(
    catalog: &EventCatalog,
    responses: &[RawResponse],
) -> Result<Vec<PredictionResult>> {
    responses
        .iter()
        .map(|raw| {
            let truth = catalog.get(&raw.event_id)?.year;
            let extracted_year = extract_year(&raw.response);
            let (is_correct, confidence_score) = score_year(extracted_year, truth);
            Ok(PredictionResult {
                model_id: raw.model_id.clone(),
                event_id: raw.event_id.clone(),
                extracted_year,
                is_correct,
                confidence_score,
            })
        })
        .collect()
}

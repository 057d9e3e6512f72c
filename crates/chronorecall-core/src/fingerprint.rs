//! Canonical query fingerprints used as cache keys.
//!
//! A fingerprint is the SHA-256 of the canonical JSON encoding of
//! `(generation, model ids, filter, group-by dimension)`:
//! - object keys sorted recursively
//! - model ids sorted and deduplicated
//! - filter values sorted, unconstrained dimensions omitted
//!
//! The generation is also kept in clear so stale entries can be dropped
//! without decoding the digest.

use std::fmt;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::dimension::Dimension;
use crate::error::Result;
use crate::filter::FilterSpec;

/// Cache key for one query against one dataset generation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    generation: u64,
    digest: String,
}

impl Fingerprint {
    /// Fingerprint a query. Model order and duplicates do not matter.
    pub fn for_query(
        generation: u64,
        model_ids: &[String],
        filter: &FilterSpec,
        group_by: Option<Dimension>,
    ) -> Result<Self> {
        let mut models: Vec<&str> = model_ids.iter().map(String::as_str).collect();
        models.sort_unstable();
        models.dedup();

        let value = json!({
            "generation": generation,
            "models": models,
            "filter": serde_json::to_value(filter)?,
            "group_by": group_by,
        });
        let canonical = canonical_json(&value)?;
        let digest = hex::encode(Sha256::digest(canonical.as_bytes()));
        Ok(Self { generation, digest })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Hex-encoded SHA-256 of the canonical encoding.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        &self.digest[..12.min(self.digest.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}:{}", self.generation, self.digest)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint(g{}:{})", self.generation, self.short())
    }
}

/// Recursively sort object keys. Arrays keep their order.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.clone(), sort_keys(v));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Compact JSON with sorted keys.
pub fn canonical_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&sort_keys(value))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let a = json!({"b": {"z": 1, "y": 2}, "a": [3, 1]});
        let b = json!({"a": [3, 1], "b": {"y": 2, "z": 1}});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
        assert_eq!(canonical_json(&a).unwrap(), r#"{"a":[3,1],"b":{"y":2,"z":1}}"#);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let filter = FilterSpec::all().with(Dimension::Continent, ["Europe", "Asia"]);
        let a = Fingerprint::for_query(1, &models(&["m1"]), &filter, None).unwrap();
        let b = Fingerprint::for_query(1, &models(&["m1"]), &filter, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_value_insertion_order_does_not_matter() {
        let a = FilterSpec::all().with(Dimension::Continent, ["Europe", "Asia"]);
        let b = FilterSpec::all()
            .with_value(Dimension::Continent, "Asia")
            .with_value(Dimension::Continent, "Europe");
        let fa = Fingerprint::for_query(1, &models(&["m1"]), &a, None).unwrap();
        let fb = Fingerprint::for_query(1, &models(&["m1"]), &b, None).unwrap();
        assert_eq!(fa, fb);
    }

    #[test]
    fn test_deserialized_empty_selection_matches_all() {
        let parsed: FilterSpec =
            serde_json::from_str(r#"{"selections":{"continent":[]}}"#).unwrap();
        let a = Fingerprint::for_query(1, &models(&["m1"]), &parsed, None).unwrap();
        let b = Fingerprint::for_query(1, &models(&["m1"]), &FilterSpec::all(), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_model_order_and_duplicates_do_not_matter() {
        let f = FilterSpec::all();
        let a = Fingerprint::for_query(1, &models(&["m2", "m1"]), &f, None).unwrap();
        let b = Fingerprint::for_query(1, &models(&["m1", "m2", "m1"]), &f, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_component_changes_the_fingerprint() {
        let f = FilterSpec::all().with(Dimension::Season, ["Winter"]);
        let base = Fingerprint::for_query(1, &models(&["m1"]), &f, None).unwrap();

        let other_gen = Fingerprint::for_query(2, &models(&["m1"]), &f, None).unwrap();
        let other_model = Fingerprint::for_query(1, &models(&["m2"]), &f, None).unwrap();
        let other_filter =
            Fingerprint::for_query(1, &models(&["m1"]), &FilterSpec::all(), None).unwrap();
        let grouped =
            Fingerprint::for_query(1, &models(&["m1"]), &f, Some(Dimension::Decade)).unwrap();

        for other in [&other_gen, &other_model, &other_filter, &grouped] {
            assert_ne!(&base, other);
            assert_ne!(base.digest(), other.digest());
        }
        assert_eq!(other_gen.generation(), 2);
    }

    #[test]
    fn test_display_includes_generation() {
        let f = Fingerprint::for_query(7, &models(&["m1"]), &FilterSpec::all(), None).unwrap();
        assert!(f.to_string().starts_with("g7:"));
        assert_eq!(f.short().len(), 12);
    }
}

//! Filter specifications and their resolution against the catalog indices.
//!
//! Values selected within one dimension combine with OR; constrained
//! dimensions combine with AND. A dimension with no selected values is
//! unconstrained.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::{EventCatalog, EventRef};
use crate::dimension::Dimension;
use crate::error::Result;

/// Per-dimension value selections. Immutable; builders return new values.
///
/// Empty selections are never stored, so two specs that constrain the same
/// values compare equal regardless of how they were built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default, deserialize_with = "non_empty_selections")]
    selections: BTreeMap<Dimension, BTreeSet<String>>,
}

/// Deserialized specs obey the same rule as built ones: an empty set is no
/// constraint and is dropped.
fn non_empty_selections<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<Dimension, BTreeSet<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut selections = BTreeMap::<Dimension, BTreeSet<String>>::deserialize(deserializer)?;
    selections.retain(|_, values| !values.is_empty());
    Ok(selections)
}

impl FilterSpec {
    /// A spec that constrains nothing.
    pub fn all() -> Self {
        Self::default()
    }

    /// Replace the selection for `dimension`. An empty `values` removes the
    /// constraint.
    pub fn with<I, S>(&self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        let mut next = self.clone();
        if values.is_empty() {
            next.selections.remove(&dimension);
        } else {
            next.selections.insert(dimension, values);
        }
        next
    }

    /// Add one value to the selection for `dimension`.
    pub fn with_value(&self, dimension: Dimension, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.selections
            .entry(dimension)
            .or_default()
            .insert(value.into());
        next
    }

    /// Drop the constraint on `dimension`.
    pub fn without(&self, dimension: Dimension) -> Self {
        let mut next = self.clone();
        next.selections.remove(&dimension);
        next
    }

    /// Build a spec from dimension names, failing on unknown dimensions.
    pub fn from_named<I, K, V, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = Self::all();
        for (name, values) in pairs {
            let dimension: Dimension = name.as_ref().parse()?;
            for value in values {
                spec = spec.with_value(dimension, value);
            }
        }
        Ok(spec)
    }

    /// Selected values for `dimension`, or `None` when unconstrained.
    pub fn selected(&self, dimension: Dimension) -> Option<&BTreeSet<String>> {
        self.selections.get(&dimension)
    }

    pub fn is_constrained(&self, dimension: Dimension) -> bool {
        self.selections.contains_key(&dimension)
    }

    /// Constrained dimensions in declaration order.
    pub fn constrained(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.selections.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Fail on the first selected value outside its enumeration.
    pub fn validate(&self) -> Result<()> {
        for (dimension, values) in &self.selections {
            for value in values {
                dimension.require_code(value)?;
            }
        }
        Ok(())
    }
}

/// Resolve `spec` to matching events in canonical order.
///
/// An empty intersection is a normal, successful outcome.
pub fn resolve(catalog: &EventCatalog, spec: &FilterSpec) -> Result<Vec<EventRef>> {
    let mut unions = Vec::with_capacity(spec.selections.len());
    for (dimension, values) in &spec.selections {
        unions.push(union_of(catalog, *dimension, values)?);
    }

    if unions.is_empty() {
        return Ok(catalog.all());
    }

    unions.sort_by_key(Vec::len);
    let mut iter = unions.into_iter();
    let mut matched = iter.next().unwrap_or_default();
    for next in iter {
        if matched.is_empty() {
            break;
        }
        matched = intersect_sorted(&matched, &next);
    }
    Ok(matched)
}

/// Union of the postings for `values` in one dimension.
fn union_of(
    catalog: &EventCatalog,
    dimension: Dimension,
    values: &BTreeSet<String>,
) -> Result<Vec<EventRef>> {
    let mut union = Vec::new();
    for value in values {
        let code = dimension.require_code(value)?;
        union.extend_from_slice(catalog.postings(dimension, code));
    }
    // An event holds exactly one value per dimension, so postings are
    // disjoint and sorting is enough to restore canonical order.
    union.sort_unstable();
    Ok(union)
}

/// Intersection of two ascending sequences.
fn intersect_sorted(small: &[EventRef], large: &[EventRef]) -> Vec<EventRef> {
    let mut out = Vec::with_capacity(small.len().min(large.len()));
    let (mut i, mut j) = (0, 0);
    while i < small.len() && j < large.len() {
        match small[i].cmp(&large[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(small[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

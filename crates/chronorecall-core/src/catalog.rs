//! Immutable event catalog with per-dimension inverted indices.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dimension::{Dimension, ValueCode};
use crate::error::{EngineError, Result};

/// A classified historical event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub text: String,
    /// Negative for BCE.
    pub year: i32,
    #[serde(default)]
    pub date: Option<NaiveDate>,

    pub primary_category: String,
    pub violence_level: String,
    pub scale: String,
    pub human_impact: String,

    #[serde(alias = "continental")]
    pub continent: String,
    pub cultural_region: String,
    pub development_status: String,
    pub colonial_status: String,

    pub century: String,
    pub decade: String,
    pub historical_period: String,
    #[serde(alias = "seasonal")]
    pub season: String,
}

impl Event {
    /// The raw value of one categorical attribute.
    pub fn attribute(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::PrimaryCategory => &self.primary_category,
            Dimension::ViolenceLevel => &self.violence_level,
            Dimension::Scale => &self.scale,
            Dimension::HumanImpact => &self.human_impact,
            Dimension::Continent => &self.continent,
            Dimension::CulturalRegion => &self.cultural_region,
            Dimension::Century => &self.century,
            Dimension::Decade => &self.decade,
            Dimension::HistoricalPeriod => &self.historical_period,
            Dimension::DevelopmentStatus => &self.development_status,
            Dimension::ColonialStatus => &self.colonial_status,
            Dimension::Season => &self.season,
        }
    }
}

/// Catalog-local handle to an event.
///
/// Handles are dense positions in canonical (ascending id) order, so sorting
/// handles sorts by event id. A handle is only meaningful for the catalog
/// that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventRef(u32);

impl EventRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

type Codes = [ValueCode; Dimension::COUNT];

/// Read-only store of canonical events.
#[derive(Debug)]
pub struct EventCatalog {
    events: Vec<Event>,
    codes: Vec<Codes>,
    by_id: HashMap<String, EventRef>,
    /// `postings[dimension][code]` = ascending handles holding that value.
    postings: Vec<Vec<Vec<EventRef>>>,
}

impl EventCatalog {
    /// Validate `events` and build the catalog.
    ///
    /// The first invalid record rejects the whole load.
    pub fn load(events: Vec<Event>) -> Result<Self> {
        validate_in_input_order(&events)?;

        let mut events = events;
        events.sort_by(|a, b| a.id.cmp(&b.id));

        let mut codes = Vec::with_capacity(events.len());
        let mut by_id = HashMap::with_capacity(events.len());
        let mut postings: Vec<Vec<Vec<EventRef>>> = Dimension::ALL
            .iter()
            .map(|d| vec![Vec::new(); d.cardinality()])
            .collect();

        for (pos, event) in events.iter().enumerate() {
            let handle = EventRef(pos as u32);
            by_id.insert(event.id.clone(), handle);

            let mut row: Codes = [0; Dimension::COUNT];
            for dimension in Dimension::ALL {
                let value = event.attribute(dimension);
                let code = dimension.code_of(value).ok_or_else(|| {
                    EngineError::validation(&event.id, dimension.name(), value)
                })?;
                row[dimension.index()] = code;
                postings[dimension.index()][code as usize].push(handle);
            }
            codes.push(row);
        }

        Ok(Self {
            events,
            codes,
            by_id,
            postings,
        })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Look up an event by id.
    pub fn get(&self, id: &str) -> Result<&Event> {
        self.lookup(id).map(|handle| self.event(handle))
    }

    /// Resolve an event id to its handle.
    pub fn lookup(&self, id: &str) -> Result<EventRef> {
        self.by_id
            .get(id)
            .copied()
            .ok_or_else(|| EngineError::event_not_found(id))
    }

    pub fn event(&self, handle: EventRef) -> &Event {
        &self.events[handle.index()]
    }

    /// Reverse lookup: the value code `handle` holds in `dimension`.
    pub fn code(&self, handle: EventRef, dimension: Dimension) -> ValueCode {
        self.codes[handle.index()][dimension.index()]
    }

    /// Ascending handles of events holding `code` in `dimension`.
    pub fn postings(&self, dimension: Dimension, code: ValueCode) -> &[EventRef] {
        &self.postings[dimension.index()][code as usize]
    }

    /// Every handle in canonical order.
    pub fn all(&self) -> Vec<EventRef> {
        (0..self.events.len() as u32).map(EventRef).collect()
    }

    /// Event ids for a handle sequence, preserving order.
    pub fn ids(&self, handles: &[EventRef]) -> Vec<&str> {
        handles
            .iter()
            .map(|h| self.event(*h).id.as_str())
            .collect()
    }

    /// Events in canonical order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

/// Check ids and attribute values before sorting, so errors name the first bad
/// record as the caller ordered them.
fn validate_in_input_order(events: &[Event]) -> Result<()> {
    let mut seen = HashSet::with_capacity(events.len());
    for event in events {
        if event.id.is_empty() {
            return Err(EngineError::validation("<empty id>", "id", ""));
        }
        if !seen.insert(event.id.as_str()) {
            return Err(EngineError::validation(&event.id, "id", &event.id));
        }
        for dimension in Dimension::ALL {
            let value = event.attribute(dimension);
            if dimension.code_of(value).is_none() {
                return Err(EngineError::validation(&event.id, dimension.name(), value));
            }
        }
    }
    Ok(())
}

//! Error taxonomy for the analysis engine.

/// Errors produced by dataset loading and queries.
///
/// `Clone` so that every caller attached to a coalesced computation receives
/// the same error value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid dataset record {record}: field {field} has value {value:?}")]
    Validation {
        record: String,
        field: String,
        value: String,
    },

    #[error("unknown value {value:?} for dimension {dimension}")]
    UnknownFilterValue { dimension: String, value: String },

    #[error("unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    pub(crate) fn validation(
        record: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            record: record.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub(crate) fn event_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "event",
            id: id.to_string(),
        }
    }

    pub(crate) fn model_not_found(id: &str) -> Self {
        Self::NotFound {
            kind: "model",
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

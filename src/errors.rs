use std::io;

use thiserror::Error;

/// Error type for store access, schema validation, and builder configuration failures.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A store could not be opened or reached.
    #[error("store '{store}' is unavailable: {reason}")]
    StoreUnavailable {
        /// Store name.
        store: String,
        /// Underlying cause.
        reason: String,
    },
    /// A store operation failed after opening.
    #[error("store failure: {0}")]
    Store(String),
    /// A document did not match its expected schema.
    #[error("{schema} document '{id}' failed validation: {details}")]
    Validation {
        /// Schema name, e.g. `molecule` or `task`.
        schema: &'static str,
        /// Identifier of the offending document.
        id: String,
        /// What was wrong.
        details: String,
    },
    /// Invalid builder settings or query.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BuildError {
    pub(crate) fn validation(
        schema: &'static str,
        id: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::Validation {
            schema,
            id: id.into(),
            details: details.into(),
        }
    }

    /// Returns `true` for schema validation failures, which fail a single group only.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

//! Error types for the ORM.

use thiserror::Error;

/// ORM-specific errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database error from sqlx, never retried.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An opaque column held text that is not JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// More than one row matched when exactly one was expected.
    #[error("{model}: more than one retrieved")]
    Cardinality {
        /// Model name.
        model: String,
    },

    /// No row matched when exactly one was expected.
    #[error("{model}: none retrieved")]
    NotFound {
        /// Model name.
        model: String,
    },

    /// A write had nothing to narrow it down.
    #[error("{model}: nothing to {action} from")]
    NoTarget {
        /// Model name.
        model: String,
        /// The refused action, `update` or `delete`.
        action: String,
    },

    /// A parent relation names a model that is not registered.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// A criterion or value names a field the model does not have.
    #[error("{model}: invalid field: {field}")]
    InvalidField {
        /// Model name.
        model: String,
        /// Field name.
        field: String,
    },
}

impl OrmError {
    pub(crate) fn no_target(model: &str, action: &str) -> Self {
        Self::NoTarget {
            model: model.to_string(),
            action: action.to_string(),
        }
    }
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;

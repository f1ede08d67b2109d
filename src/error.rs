//! Error types for sweepctl
//!
//! There are two error types: `SweepError` (main error enum) and `ConfigError`
//! (configuration-specific).
//!
//! ## Error Handling Philosophy
//!
//! Library code uses `crate::error::Result<T>` which returns `SweepError`.
//! The binary maps the error to an exit code at the very end (see
//! `src/exit_codes.rs`), so nothing below `main` ever calls `process::exit`.
//!
//! ## No Retries
//!
//! Remote calls are issued at most once. A failed listing, tagging, stop or
//! start call propagates and aborts the run. The only failures that do not
//! abort are per-item deletes, which the action executor records as
//! `ItemOutcome::Failed` values instead of returning an error.
//!
//! ## When to Use Which Error
//!
//! - `ConfigError`: configuration parsing and validation issues, including
//!   bad environment overrides. Raised before any remote call.
//!
//! - `Query`: a read against the remote API failed (paginated listing,
//!   describe, metric statistics, cost and usage, caller identity).
//!
//! - `Action`: a mutating call failed (create tags, stop, start, delete).
//!
//! - `Validation`: user input that is well-formed but unusable, e.g. an
//!   output file with an unsupported extension or an unknown schedule action.

use crate::provider::ResourceId;
use thiserror::Error;

/// Main error type for sweepctl
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A listing, metric or cost query failed. Surfaced as-is, never
    /// retried; a failed page ends the whole listing.
    #[error("Query failed: {operation} - {message}")]
    Query { operation: String, message: String },

    #[error("Action failed: {action} on {} - {message}", .resource_id.as_deref().unwrap_or("<batch>"))]
    Action {
        action: String,
        resource_id: Option<ResourceId>,
        message: String,
    },

    #[error("Validation error: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SweepError {
    /// Shorthand for a failed remote read
    pub fn query(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        SweepError::Query {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Shorthand for a failed mutating call
    pub fn action(
        action: impl Into<String>,
        resource_id: Option<&str>,
        err: impl std::fmt::Display,
    ) -> Self {
        SweepError::Action {
            action: action.into(),
            resource_id: resource_id.map(str::to_string),
            message: err.to_string(),
        }
    }
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SweepError>;

//! Typed errors for the connectors crate.

use thiserror::Error;

/// Errors that can occur while executing a query.
#[derive(Debug, Error)]
pub enum QueryExecutionError {
    /// No database URL was configured, or it could not be parsed.
    #[error("database is not configured: {0}")]
    NotConfigured(String),

    /// The engine rejected the statement or the connection failed.
    #[error("{0}")]
    Database(#[from] sqlx::Error),
}

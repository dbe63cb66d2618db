//! sqlchat Connectors - Database gateway
//!
//! Executes caller-supplied SQL text against PostgreSQL and returns rows as
//! JSON-ready maps keyed by column name.

pub mod error;
pub mod postgres;

pub use error::QueryExecutionError;
pub use postgres::{redact_database_url, PostgresGateway};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Columns and rows produced by a single statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// Column names in the order the engine reported them.
    pub columns: Vec<String>,
    /// Rows in the order the engine returned them.
    pub rows: Vec<Row>,
}

/// Trait for gateways that run literal SQL text.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `sql` verbatim and collect every row.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult, QueryExecutionError>;
}

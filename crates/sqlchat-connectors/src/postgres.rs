//! PostgreSQL gateway
//!
//! Runs literal SQL text through a lazily connected `sqlx` pool and converts
//! each `PgRow` into a JSON object, choosing the JSON representation from the
//! runtime type of every column.
//!
//! Text is sent with the simple query protocol, so it may hold several
//! statements; a script reports the rows of its last statement.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::{Column, Connection, Either, Executor, Row as _, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use crate::error::QueryExecutionError;
use crate::{QueryExecutor, QueryResult, Row};

/// Gateway to a single PostgreSQL database.
///
/// Construction never touches the network. A missing or unparseable URL is
/// remembered and reported by every [`QueryExecutor::execute_query`] call.
#[derive(Debug, Clone)]
pub struct PostgresGateway {
    /// `Err` holds the reason no pool could be built.
    pool: Result<PgPool, String>,
}

impl PostgresGateway {
    /// Build a gateway whose connections are opened on first use.
    pub fn connect_lazy(database_url: Option<&str>, max_connections: u32) -> Self {
        let pool = match database_url {
            Some(url) if !url.trim().is_empty() => {
                match PgPoolOptions::new()
                    .max_connections(max_connections)
                    .connect_lazy(url)
                {
                    Ok(pool) => {
                        info!(
                            "Database pool configured for {} (max {} connections)",
                            redact_database_url(url),
                            max_connections
                        );
                        Ok(pool)
                    }
                    Err(e) => {
                        warn!("Invalid DATABASE_URL: {}", e);
                        Err(format!("invalid database URL: {}", e))
                    }
                }
            }
            _ => {
                info!("DATABASE_URL not set. Queries will fail until it is configured.");
                Err("DATABASE_URL is not set".to_string())
            }
        };

        Self { pool }
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool: Ok(pool) }
    }

    fn pool(&self) -> Result<&PgPool, QueryExecutionError> {
        self.pool
            .as_ref()
            .map_err(|reason| QueryExecutionError::NotConfigured(reason.clone()))
    }
}

#[async_trait]
impl QueryExecutor for PostgresGateway {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult, QueryExecutionError> {
        let mut conn = self.pool()?.acquire().await?;
        debug!("Executing query: {}", sql);

        let pg_rows = run_script(&mut conn, sql).await?;

        let columns = match pg_rows.first() {
            Some(row) => column_names(row.columns()),
            None => describe_columns(&mut conn, sql).await,
        };
        let rows: Vec<Row> = pg_rows.iter().map(row_to_json).collect();

        debug!("Query returned {} rows, {} columns", rows.len(), columns.len());
        Ok(QueryResult { columns, rows })
    }
}

fn column_names<C: Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

/// Run `sql` with the simple query protocol and return the rows of its last
/// statement.
///
/// Nothing is prepared, so the connection's statement cache is untouched.
async fn run_script(conn: &mut PgConnection, sql: &str) -> Result<Vec<PgRow>, sqlx::Error> {
    let mut results = conn.fetch_many(sql);
    let mut current = Vec::new();
    let mut last = Vec::new();
    while let Some(step) = results.try_next().await? {
        match step {
            // One per completed statement.
            Either::Left(_) => last = std::mem::take(&mut current),
            Either::Right(row) => current.push(row),
        }
    }
    Ok(if current.is_empty() { last } else { current })
}

/// Column names for a statement that produced no rows.
///
/// The statement has already run, so a describe failure is logged and treated
/// as "no columns" rather than failing the request. Multi-statement text
/// cannot be described and reports no columns.
async fn describe_columns(conn: &mut PgConnection, sql: &str) -> Vec<String> {
    let columns = match (&mut *conn).describe(sql).await {
        Ok(describe) => column_names(describe.columns()),
        Err(e) => {
            warn!("Could not describe result columns: {}", e);
            Vec::new()
        }
    };

    // Describe caches a prepared statement; a later schema change would make
    // it stale.
    if let Err(e) = conn.clear_cached_statements().await {
        warn!("Could not clear cached statements: {}", e);
    }
    columns
}

/// Convert a PostgreSQL row into a JSON object keyed by column name.
fn row_to_json(row: &PgRow) -> Row {
    let mut map = Map::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), pg_value_to_json(row, i));
    }
    map
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<T, _>(idx).ok()
}

/// Map one column value to JSON based on its PostgreSQL type name.
fn pg_value_to_json(row: &PgRow, idx: usize) -> Value {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let value = match type_name.as_str() {
        "INT2" => get::<i16>(row, idx).map(Value::from),
        "INT4" => get::<i32>(row, idx).map(Value::from),
        "INT8" => get::<i64>(row, idx).map(Value::from),
        "OID" => get::<sqlx::postgres::types::Oid>(row, idx).map(|o| Value::from(o.0)),
        "FLOAT4" => get::<f32>(row, idx).map(|f| Value::from(f as f64)),
        "FLOAT8" => get::<f64>(row, idx).map(Value::from),
        "NUMERIC" => get::<Decimal>(row, idx).map(|d| Value::String(d.to_string())),
        "BOOL" => get::<bool>(row, idx).map(Value::Bool),
        "DATE" => get::<NaiveDate>(row, idx).map(|d| Value::String(d.to_string())),
        "TIME" => get::<NaiveTime>(row, idx)
            .map(|t| Value::String(t.format("%H:%M:%S%.f").to_string())),
        "TIMESTAMP" => get::<NaiveDateTime>(row, idx)
            .map(|ts| Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, idx).map(|ts| Value::String(ts.to_rfc3339())),
        "UUID" => get::<uuid::Uuid>(row, idx).map(|u| Value::String(u.to_string())),
        "JSON" | "JSONB" => get::<Value>(row, idx),
        _ => {
            let text = get::<String>(row, idx).map(Value::String);
            if text.is_none() {
                debug!("No JSON mapping for column type {}; returning null", type_name);
            }
            text
        }
    };

    value.unwrap_or(Value::Null)
}

/// Render a connection URI for logs with the password masked.
pub fn redact_database_url(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(mut url) => {
            if url.password().is_some() {
                // Only fails for cannot-be-a-base URLs, which carry no password.
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => "<unparseable database url>".to_string(),
    }
}

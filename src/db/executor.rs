//! SELECT execution against the pooled store.
//!
//! All DuckDB work happens on a blocking worker thread; the async side only
//! waits, bounded by the configured wall-clock budget. Results are
//! materialized as JSON rows with the configured row ceiling applied.

use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::config::DatabaseConfig;
use crate::db::pool::DbPool;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
    pub max_rows: usize,
    pub timeout: Duration,
}

impl QueryLimits {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            max_rows: config.max_result_rows,
            timeout: Duration::from_millis(config.query_timeout_ms),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    /// Pool checkout failed within the acquire budget.
    #[error("no database connection available: {0}")]
    PoolExhausted(String),

    #[error("query exceeded the {0} ms execution budget")]
    Timeout(u64),

    /// The statement itself failed (unknown table, bad syntax, ...).
    #[error("query execution failed: {0}")]
    Statement(String),

    #[error("execution worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub truncated: bool,
    pub elapsed_ms: u64,
}

pub async fn run_select(
    pool: &DbPool,
    sql: &str,
    limits: QueryLimits,
) -> Result<ExecutionOutput, ExecError> {
    let pool = pool.clone();
    let sql = sql.to_string();
    let max_rows = limits.max_rows;

    let worker = tokio::task::spawn_blocking(move || -> Result<ExecutionOutput, ExecError> {
        let conn = pool
            .get()
            .map_err(|e| ExecError::PoolExhausted(e.to_string()))?;
        let started = Instant::now();

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ExecError::Statement(e.to_string()))?;

        let column_count = stmt.column_count();
        let mut columns = Vec::with_capacity(column_count);
        for i in 0..column_count {
            match stmt.column_name(i) {
                Ok(name) => columns.push(name.to_string()),
                Err(_) => columns.push(format!("column_{i}")),
            }
        }

        let mut rows = stmt
            .query([])
            .map_err(|e| ExecError::Statement(e.to_string()))?;
        let mut collected = Vec::new();
        let mut truncated = false;
        while let Some(row) = rows
            .next()
            .map_err(|e| ExecError::Statement(e.to_string()))?
        {
            if collected.len() == max_rows {
                truncated = true;
                break;
            }
            let mut mapped = Map::new();
            for (i, name) in columns.iter().enumerate() {
                mapped.insert(name.clone(), read_value(row, i));
            }
            collected.push(mapped);
        }

        let row_count = collected.len();
        Ok(ExecutionOutput {
            columns,
            rows: collected,
            row_count,
            truncated,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    });

    match tokio::time::timeout(limits.timeout, worker).await {
        // Budget exhausted. The worker keeps running detached; its
        // connection rejoins the pool once the statement finishes.
        Err(_) => Err(ExecError::Timeout(limits.timeout.as_millis() as u64)),
        Ok(Err(join_err)) => Err(ExecError::Worker(join_err.to_string())),
        Ok(Ok(result)) => result,
    }
}

fn read_value(row: &duckdb::Row<'_>, idx: usize) -> Value {
    use duckdb::types::ValueRef;

    match row.get_ref(idx) {
        Ok(ValueRef::Null) => Value::Null,
        Ok(ValueRef::Boolean(v)) => Value::Bool(v),
        Ok(ValueRef::TinyInt(v)) => Value::from(v),
        Ok(ValueRef::SmallInt(v)) => Value::from(v),
        Ok(ValueRef::Int(v)) => Value::from(v),
        Ok(ValueRef::BigInt(v)) => Value::from(v),
        Ok(ValueRef::HugeInt(v)) => i64::try_from(v)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(v.to_string())),
        Ok(ValueRef::UTinyInt(v)) => Value::from(v),
        Ok(ValueRef::USmallInt(v)) => Value::from(v),
        Ok(ValueRef::UInt(v)) => Value::from(v),
        Ok(ValueRef::UBigInt(v)) => Value::from(v),
        Ok(ValueRef::Float(v)) => float_value(f64::from(v)),
        Ok(ValueRef::Double(v)) => float_value(v),
        Ok(ValueRef::Decimal(v)) => v
            .to_string()
            .parse::<serde_json::Number>()
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(v.to_string())),
        Ok(ValueRef::Text(bytes)) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        Ok(ValueRef::Date32(days)) => date_value(days),
        Ok(ValueRef::Timestamp(unit, raw)) => timestamp_value(unit, raw),
        Ok(ValueRef::Time64(unit, raw)) => time_value(unit, raw),
        // Everything else goes through DuckDB's own string rendering.
        Ok(_) => row
            .get::<_, String>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}

fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn date_value(days_since_epoch: i32) -> Value {
    chrono::DateTime::from_timestamp(i64::from(days_since_epoch) * 86_400, 0)
        .map(|dt| Value::String(dt.date_naive().to_string()))
        .unwrap_or(Value::Null)
}

fn unit_to_micros(unit: duckdb::types::TimeUnit, raw: i64) -> i64 {
    use duckdb::types::TimeUnit;

    match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    }
}

fn timestamp_value(unit: duckdb::types::TimeUnit, raw: i64) -> Value {
    chrono::DateTime::from_timestamp_micros(unit_to_micros(unit, raw))
        .map(|dt| Value::String(dt.naive_utc().to_string()))
        .unwrap_or(Value::Null)
}

fn time_value(unit: duckdb::types::TimeUnit, raw: i64) -> Value {
    let micros = unit_to_micros(unit, raw).max(0);
    let secs = (micros / 1_000_000) as u32;
    let nanos = ((micros % 1_000_000) * 1_000) as u32;
    chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .map(|t| Value::String(t.to_string()))
        .unwrap_or(Value::Null)
}

/// Stand-in rows for when live execution fails: keeps the explanation stage
/// reachable with something themed to the statement. Callers must mark the
/// result as synthetic; these rows never masquerade as live data.
pub fn synthetic_rows(sql: &str) -> Vec<Row> {
    let lowered = sql.to_lowercase();
    let rows = if lowered.contains("customer") {
        json!([
            {"id": 1, "name": "John Doe", "email": "john@example.com"},
            {"id": 2, "name": "Jane Smith", "email": "jane@example.com"}
        ])
    } else if lowered.contains("order") {
        json!([
            {"id": 101, "customer_id": 1, "amount": 99.99, "status": "completed"},
            {"id": 102, "customer_id": 2, "amount": 149.99, "status": "pending"}
        ])
    } else if lowered.contains("product") {
        json!([
            {"id": 201, "name": "Laptop", "price": 999.99, "category": "Electronics"},
            {"id": 202, "name": "Mouse", "price": 24.99, "category": "Accessories"}
        ])
    } else {
        json!([{"notice": "query produced no live results"}])
    };

    match rows {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

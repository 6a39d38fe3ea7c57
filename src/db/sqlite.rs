//! SQLite database client implementation.

use crate::db::{ColumnInfo, ConnectOptions, DatabaseClient, QueryResult, Row, Value};
use crate::error::{InflightError, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo, ValueRef};
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

/// SQLite client owning a single connection.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Opens a single-connection pool to `target` (`sqlite::memory:`,
    /// `sqlite://path/to/file.db`, ...). Missing files are not created.
    pub async fn connect(target: &str, options: &ConnectOptions) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(target)
            .map_err(|e| InflightError::connection(format!("Invalid SQLite target: {e}")))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(options.connect_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| InflightError::connection(format!("Cannot open {target}: {e}")))?;

        debug!("Connected to {}", target);
        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    async fn execute_query(&self, sql: &str, max_rows: usize) -> Result<QueryResult> {
        let start = Instant::now();

        let mut stream = sqlx::query(sql).fetch(&self.pool);
        let mut columns: Vec<ColumnInfo> = Vec::new();
        let mut rows: Vec<Row> = Vec::new();
        let mut total_rows = 0usize;

        while let Some(row) = stream
            .try_next()
            .await
            .map_err(|e| InflightError::execution(e.to_string()))?
        {
            if total_rows == 0 {
                columns = row
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect();
            }
            if rows.len() < max_rows {
                rows.push(convert_row(&row));
            }
            total_rows += 1;
        }

        let row_count = rows.len();
        Ok(QueryResult {
            columns,
            rows,
            execution_time: start.elapsed(),
            row_count,
            total_rows,
            was_truncated: total_rows > row_count,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

/// Converts a single column value using the storage class of the value itself,
/// since SQLite columns are dynamically typed.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let Ok(raw) = row.try_get_raw(index) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_uppercase();

    match type_name.as_str() {
        "BOOLEAN" => row
            .try_get::<bool, _>(index)
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INTEGER" | "INT" | "BIGINT" => row
            .try_get::<i64, _>(index)
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" => row
            .try_get::<f64, _>(index)
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        "DATETIME" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(Value::Time)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

//! SQL execution gateway
//!
//! Executes a pre-validated query string against the relational store and
//! returns rows as generic JSON records, preserving column order. The gateway
//! trusts its caller: the safety filter ([`crate::sqlguard`]) must have
//! admitted the statement first. Every execution runs inside its own
//! transaction that is rolled back before any error propagates.

use crate::error::AppError;
use base64::Engine;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

/// Execute a read query and collect every row as a column-name → value map.
///
/// Column order within each row map follows the database result. Values are
/// decoded as the driver reports them: INTEGER → number, REAL → number,
/// TEXT → string, BLOB → base64 string, NULL → null.
pub async fn execute_query(pool: &SqlitePool, query: &str) -> Result<Vec<Map<String, Value>>, AppError> {
    let mut tx = pool.begin().await?;

    let rows = match sqlx::query(query).fetch_all(&mut *tx).await {
        Ok(rows) => rows,
        Err(err) => {
            // Leave no open transaction behind before surfacing the error
            tx.rollback().await.ok();
            return Err(AppError::Execution(err.to_string()));
        }
    };

    tx.commit().await?;

    Ok(rows.iter().map(row_to_map).collect())
}

fn row_to_map(row: &SqliteRow) -> Map<String, Value> {
    let mut map = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), decode_value(row, idx));
    }
    map
}

/// Decode a single cell from its runtime value type. Expression and
/// aggregate columns (COUNT(*), AVG, computed values) carry no declared
/// column type, so the stored value's own type is the only reliable key.
fn decode_value(row: &SqliteRow, idx: usize) -> Value {
    let raw = match row.try_get_raw(idx) {
        Ok(raw) => raw,
        Err(_) => return Value::Null,
    };
    if raw.is_null() {
        return Value::Null;
    }

    match raw.type_info().name() {
        "INTEGER" => row
            .try_get::<i64, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" => row
            .try_get::<f64, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|bytes| Value::String(base64::engine::general_purpose::STANDARD.encode(bytes)))
            .unwrap_or(Value::Null),
        // TEXT, DATE, DATETIME and everything else decodes as text
        _ => row
            .try_get::<String, _>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

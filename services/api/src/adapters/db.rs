//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `QueryExecutionService` port from the `core` crate. It runs arbitrary SQL
//! against PostgreSQL using `sqlx` and turns the result set into a `QueryTable`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use sql_assistant_core::domain::{CellValue, QueryTable};
use sql_assistant_core::ports::{PortError, PortResult, QueryExecutionService};
use sqlx::postgres::PgRow;
use sqlx::{Column, Either, Executor, PgPool, Row, TypeInfo, ValueRef};
use tracing::{debug, warn};
use uuid::Uuid;

/// Demonstration join over orders, customers and products.
pub const SAMPLE_JOIN_QUERY: &str = r#"SELECT
    o.orderid,
    c.firstname || ' ' || c.lastname AS customer,
    p.productname,
    o.quantityordered,
    o.orderdate
FROM orderdetail o
JOIN customer c ON o.customerid = c.customerid
JOIN product  p ON o.productid = p.productid
ORDER BY o.orderid
LIMIT 20;"#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `QueryExecutionService` port.
#[derive(Clone)]
pub struct PgQueryAdapter {
    pool: PgPool,
}

impl PgQueryAdapter {
    /// Creates a new `PgQueryAdapter` over a shared pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_last_result_set(&self, sql: &str) -> Result<Vec<PgRow>, sqlx::Error> {
        let mut results = (&self.pool).fetch_many(sql);
        let mut current = Vec::new();
        let mut last = Vec::new();
        while let Some(step) = results.try_next().await? {
            match step {
                Either::Left(_) if !current.is_empty() => last = std::mem::take(&mut current),
                Either::Left(_) => {}
                Either::Right(row) => current.push(row),
            }
        }
        if !current.is_empty() {
            last = current;
        }
        Ok(last)
    }

    /// Column names for a statement that produced no rows.
    async fn describe_columns(&self, sql: &str) -> Vec<String> {
        match (&self.pool).describe(sql).await {
            Ok(description) => description
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            Err(e) => {
                // DDL such as DROP TABLE can no longer be described once it has run.
                debug!("Could not describe statement columns: {}", e);
                Vec::new()
            }
        }
    }
}

//=========================================================================================
// Row Decoding
//=========================================================================================

fn decode_cell(row: &PgRow, idx: usize, type_name: &str) -> Result<CellValue, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(CellValue::Null);
    }

    let value = match type_name {
        "BOOL" => CellValue::Bool(row.try_get::<bool, _>(idx)?),
        "INT2" => CellValue::Int(row.try_get::<i16, _>(idx)? as i64),
        "INT4" => CellValue::Int(row.try_get::<i32, _>(idx)? as i64),
        "INT8" => CellValue::Int(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => CellValue::Float(row.try_get::<f32, _>(idx)? as f64),
        "FLOAT8" => CellValue::Float(row.try_get::<f64, _>(idx)?),
        "NUMERIC" => match row.try_get::<Decimal, _>(idx) {
            Ok(decimal) => CellValue::Text(decimal.to_string()),
            // NaN and +/-Infinity have no Decimal form; keep PostgreSQL's own spelling.
            Err(_) => CellValue::Text(row.try_get_unchecked::<String, _>(idx)?),
        },
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "UNKNOWN" => {
            CellValue::Text(row.try_get::<String, _>(idx)?)
        }
        "DATE" => CellValue::Text(row.try_get::<NaiveDate, _>(idx)?.to_string()),
        "TIMESTAMP" => CellValue::Text(row.try_get::<NaiveDateTime, _>(idx)?.to_string()),
        "TIMESTAMPTZ" => CellValue::Text(row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339()),
        "UUID" => CellValue::Text(row.try_get::<Uuid, _>(idx)?.to_string()),
        "JSON" | "JSONB" => CellValue::Text(row.try_get::<serde_json::Value, _>(idx)?.to_string()),
        other => CellValue::Text(format!("<{}>", other)),
    };
    Ok(value)
}

fn to_table(rows: &[PgRow]) -> Result<QueryTable, sqlx::Error> {
    let Some(first) = rows.first() else {
        return Ok(QueryTable::default());
    };

    let columns: Vec<String> = first.columns().iter().map(|c| c.name().to_string()).collect();
    let type_names: Vec<String> = first
        .columns()
        .iter()
        .map(|c| c.type_info().name().to_string())
        .collect();

    let mut table_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let mut cells = Vec::with_capacity(type_names.len());
        for (idx, type_name) in type_names.iter().enumerate() {
            cells.push(decode_cell(row, idx, type_name)?);
        }
        table_rows.push(cells);
    }

    Ok(QueryTable {
        columns,
        rows: table_rows,
    })
}

//=========================================================================================
// `QueryExecutionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl QueryExecutionService for PgQueryAdapter {
    /// Sends `sql` unprepared, so text holding several statements runs as a whole.
    /// The rows of the last statement that returned any are kept.
    async fn execute(&self, sql: &str) -> PortResult<QueryTable> {
        let rows = self.fetch_last_result_set(sql).await.map_err(|e| {
            warn!("Query execution failed: {}", e);
            PortError::Execution(e.to_string())
        })?;

        let mut table = to_table(&rows).map_err(|e| PortError::Execution(e.to_string()))?;
        if rows.is_empty() {
            table.columns = self.describe_columns(sql).await;
        }

        debug!("Query returned {} rows", table.row_count());
        Ok(table)
    }
}

//! MySQL adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::{ConnectionConfig, DbType, Row, RowSet};

use super::sql::{self, binary_value, decimal_value, float_value, id_from_row, SqlBackend};
use super::{Adapter, Operation};
use crate::normalizer::sql::{SqlDialect, Statement};

pub struct MySqlAdapter {
    pool: MySqlPool,
}

impl MySqlAdapter {
    pub async fn connect(config: &ConnectionConfig, settings: &AppConfig) -> AppResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .connect(&config.url())
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
        Ok(Self { pool })
    }
}

fn bind_params<'q>(stmt: &'q Statement) -> Query<'q, MySql, MySqlArguments> {
    stmt.params
        .iter()
        .fold(sqlx::query(&stmt.sql), |query, param| match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(u) = n.as_u64() {
                    query.bind(u)
                } else {
                    query.bind(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => query.bind(s.as_str()),
            nested => query.bind(nested.to_string()),
        })
}

fn row_to_json(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|col| {
            let value = decode(row, col.ordinal(), col.type_info().name());
            (col.name().to_string(), value)
        })
        .collect()
}

fn decode(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    match type_name {
        "BOOLEAN" => {
            return row
                .try_get::<bool, _>(index)
                .map(Value::Bool)
                .unwrap_or(Value::Null)
        }
        "JSON" => return row.try_get::<Value, _>(index).unwrap_or(Value::Null),
        _ => {}
    }

    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<u64, _>(index) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return float_value(v);
    }
    if let Ok(v) = row.try_get::<f32, _>(index) {
        return float_value(v as f64);
    }
    if let Ok(v) = row.try_get::<sqlx::types::Decimal, _>(index) {
        return decimal_value(v);
    }
    if let Ok(v) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(index) {
        return Value::String(v.to_rfc3339());
    }
    if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(index) {
        return Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(index) {
        return Value::String(v.to_string());
    }
    if let Ok(v) = row.try_get::<chrono::NaiveTime, _>(index) {
        return Value::String(v.to_string());
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return match String::from_utf8(v) {
            Ok(text) => Value::String(text),
            Err(e) => binary_value(e.as_bytes()),
        };
    }
    Value::Null
}

#[async_trait]
impl SqlBackend for MySqlAdapter {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::MySql
    }

    async fn fetch(&self, stmt: &Statement) -> AppResult<RowSet> {
        let rows = bind_params(stmt).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn run(&self, stmt: &Statement) -> AppResult<u64> {
        let result = bind_params(stmt).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn insert(&self, stmt: &Statement, row: &Row) -> AppResult<Value> {
        let result = bind_params(stmt).execute(&self.pool).await?;
        match result.last_insert_id() {
            0 => Ok(id_from_row(None, row)),
            id => Ok(Value::from(id)),
        }
    }
}

#[async_trait]
impl Adapter for MySqlAdapter {
    fn engine(&self) -> DbType {
        DbType::MySQL
    }

    async fn execute(&self, op: &Operation) -> AppResult<RowSet> {
        sql::execute(self, op).await
    }

    async fn list_targets(&self) -> AppResult<Vec<String>> {
        let rows = sqlx::query("SHOW TABLES").fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                row.try_get::<String, _>(0)
                    .or_else(|_| {
                        row.try_get::<Vec<u8>, _>(0)
                            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    })
                    .map_err(AppError::from)
            })
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

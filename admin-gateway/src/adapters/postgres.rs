//! PostgreSQL adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::{ConnectionConfig, DbType, Row, RowSet};

use super::sql::{
    self, binary_value, decimal_value, describe_types, float_value, id_from_row, SqlBackend,
};
use super::{Adapter, Operation};
use crate::normalizer::sql::{ColumnTypes, SqlDialect, Statement};

pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    pub async fn connect(config: &ConnectionConfig, settings: &AppConfig) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .connect(&config.url())
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
        Ok(Self { pool })
    }
}

fn bind_params<'q>(stmt: &'q Statement) -> Query<'q, Postgres, PgArguments> {
    stmt.params
        .iter()
        .fold(sqlx::query(&stmt.sql), |query, param| match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            // no unsigned integers on the wire; anything past i64 goes as float
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s.as_str()),
            nested => query.bind(nested.to_string()),
        })
}

fn row_to_json(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .map(|col| {
            let value = decode(row, col.ordinal(), col.type_info().name());
            (col.name().to_string(), value)
        })
        .collect()
}

fn decode(row: &PgRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    let value = match type_name {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::Bool).ok(),
        "INT2" => row.try_get::<i16, _>(index).map(Value::from).ok(),
        "INT4" => row.try_get::<i32, _>(index).map(Value::from).ok(),
        "INT8" => row.try_get::<i64, _>(index).map(Value::from).ok(),
        "FLOAT4" => row.try_get::<f32, _>(index).map(|v| float_value(v as f64)).ok(),
        "FLOAT8" => row.try_get::<f64, _>(index).map(float_value).ok(),
        "NUMERIC" => row
            .try_get::<sqlx::types::Decimal, _>(index)
            .map(decimal_value)
            .ok(),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index).ok(),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
            .map(|v| Value::String(v.to_rfc3339()))
            .ok(),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .map(|v| Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .ok(),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(index)
            .map(|v| Value::String(v.to_string()))
            .ok(),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(index)
            .map(|v| Value::String(v.to_string()))
            .ok(),
        "UUID" => row
            .try_get::<sqlx::types::Uuid, _>(index)
            .map(|v| Value::String(v.to_string()))
            .ok(),
        "BYTEA" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|v| binary_value(&v))
            .ok(),
        _ => None,
    };

    // enums, citext and friends share the text wire format
    value
        .or_else(|| row.try_get::<String, _>(index).map(Value::String).ok())
        .or_else(|| {
            row.try_get_unchecked::<String, _>(index)
                .map(Value::String)
                .ok()
        })
        .unwrap_or(Value::Null)
}

#[async_trait]
impl SqlBackend for PostgresAdapter {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
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
        let returned = bind_params(stmt).fetch_optional(&self.pool).await?;
        let returned = returned.as_ref().map(row_to_json);
        Ok(id_from_row(returned.as_ref(), row))
    }

    async fn column_types(&self, table: &str) -> AppResult<ColumnTypes> {
        describe_types(self, table).await
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn engine(&self) -> DbType {
        DbType::Postgres
    }

    async fn execute(&self, op: &Operation) -> AppResult<RowSet> {
        sql::execute(self, op).await
    }

    async fn list_targets(&self) -> AppResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT table_name::text AS name FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(AppError::from))
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

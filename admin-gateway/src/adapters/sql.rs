//! Execution shared by the relational adapters.

use async_trait::async_trait;
use serde_json::Value;

use common::errors::AppResult;
use common::models::row::{scalar_row, scalar_value};
use common::models::{Row, RowSet};
use common::utils::SqlValidator;

use super::{Operation, OperationKind, AFFECTED_ROWS, DELETED_COUNT, INSERTED_ID, TOTAL};
use crate::normalizer::sql::{self, ColumnTypes, SqlDialect, Statement};
use crate::normalizer::{prepare_insert, Criteria};

/// Driver-level primitives a relational adapter provides.
#[async_trait]
pub trait SqlBackend: Send + Sync {
    fn dialect(&self) -> SqlDialect;

    /// Runs a statement that returns rows.
    async fn fetch(&self, stmt: &Statement) -> AppResult<RowSet>;

    /// Runs a statement and returns the affected row count.
    async fn run(&self, stmt: &Statement) -> AppResult<u64>;

    /// Runs an insert and returns the generated id, or `Null`.
    async fn insert(&self, stmt: &Statement, row: &Row) -> AppResult<Value>;

    /// Types to cast bound values to. Empty when the driver infers them.
    async fn column_types(&self, _table: &str) -> AppResult<ColumnTypes> {
        Ok(ColumnTypes::new())
    }
}

/// Executes one operation through a relational backend.
pub async fn execute<B>(backend: &B, op: &Operation) -> AppResult<RowSet>
where
    B: SqlBackend + ?Sized,
{
    let dialect = backend.dialect();
    let table = op.target.as_str();

    match &op.kind {
        OperationKind::Find(find) => {
            let types = filter_types(backend, table, &find.criteria).await?;
            backend.fetch(&sql::select(dialect, table, find, &types)).await
        }
        OperationKind::Count(criteria) => {
            let types = filter_types(backend, table, criteria).await?;
            let rows = backend.fetch(&sql::count(dialect, table, criteria, &types)).await?;
            let total = scalar_value(&rows, TOTAL).and_then(Value::as_u64).unwrap_or(0);
            Ok(scalar_row(TOTAL, total))
        }
        OperationKind::Insert(row) => {
            let row = prepare_insert(row.clone(), false);
            let types = backend.column_types(table).await?;
            let stmt = sql::insert(dialect, table, &row, &types);
            let id = backend.insert(&stmt, &row).await?;
            Ok(scalar_row(INSERTED_ID, id))
        }
        OperationKind::Update { id, changes } => {
            let types = backend.column_types(table).await?;
            let stmt = sql::update(dialect, table, id, changes, &types)?;
            let affected = backend.run(&stmt).await?;
            Ok(scalar_row(AFFECTED_ROWS, affected))
        }
        OperationKind::Delete { ids } => {
            if ids.is_empty() {
                return Ok(scalar_row(DELETED_COUNT, 0u64));
            }
            let deleted = backend.run(&sql::delete(dialect, table, ids)).await?;
            Ok(scalar_row(DELETED_COUNT, deleted))
        }
        OperationKind::Describe => backend.fetch(&sql::describe(dialect, table)).await,
        OperationKind::Raw { statement, limit } => {
            SqlValidator::validate(statement)?;
            let stmt = Statement::raw(statement.as_str());
            if SqlValidator::returns_rows(statement) {
                let mut rows = backend.fetch(&stmt).await?;
                rows.truncate(*limit);
                Ok(rows)
            } else {
                let affected = backend.run(&stmt).await?;
                Ok(scalar_row(AFFECTED_ROWS, affected))
            }
        }
    }
}

/// Column types for filter casts, looked up only when there are filters.
async fn filter_types<B>(backend: &B, table: &str, criteria: &Criteria) -> AppResult<ColumnTypes>
where
    B: SqlBackend + ?Sized,
{
    if criteria.filters.is_empty() {
        return Ok(ColumnTypes::new());
    }
    backend.column_types(table).await
}

/// Reads `column -> data_type` pairs from a describe result.
pub async fn describe_types<B>(backend: &B, table: &str) -> AppResult<ColumnTypes>
where
    B: SqlBackend + ?Sized,
{
    let rows = backend
        .fetch(&sql::describe(backend.dialect(), table))
        .await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let column = row.get("column")?.as_str()?;
            let ty = row.get("data_type")?.as_str()?;
            Some((column.to_string(), ty.to_string()))
        })
        .collect())
}

/// Generated id taken from a returned row, falling back to the id the
/// caller supplied.
pub fn id_from_row(returned: Option<&Row>, supplied: &Row) -> Value {
    returned
        .and_then(|row| row.get(sql::ID_COLUMN))
        .or_else(|| supplied.get(sql::ID_COLUMN))
        .cloned()
        .unwrap_or(Value::Null)
}

/// JSON number for a float, `null` for NaN and infinities.
pub fn float_value(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Decimals become numbers when they fit a float and strings otherwise.
pub fn decimal_value(value: sqlx::types::Decimal) -> Value {
    let text = value.to_string();
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => float_value(f),
        _ => Value::String(text),
    }
}

pub fn binary_value(bytes: &[u8]) -> Value {
    Value::String(format!("<binary {} bytes>", bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records statements and answers with canned results.
    struct Recorder {
        dialect: SqlDialect,
        fetched: Mutex<Vec<Statement>>,
        ran: Mutex<Vec<Statement>>,
        rows: RowSet,
        affected: u64,
        types: ColumnTypes,
    }

    impl Recorder {
        fn new(dialect: SqlDialect) -> Self {
            Self {
                dialect,
                fetched: Mutex::new(Vec::new()),
                ran: Mutex::new(Vec::new()),
                rows: Vec::new(),
                affected: 0,
                types: ColumnTypes::new(),
            }
        }
    }

    #[async_trait]
    impl SqlBackend for Recorder {
        fn dialect(&self) -> SqlDialect {
            self.dialect
        }

        async fn fetch(&self, stmt: &Statement) -> AppResult<RowSet> {
            self.fetched.lock().unwrap().push(stmt.clone());
            Ok(self.rows.clone())
        }

        async fn run(&self, stmt: &Statement) -> AppResult<u64> {
            self.ran.lock().unwrap().push(stmt.clone());
            Ok(self.affected)
        }

        async fn insert(&self, stmt: &Statement, row: &Row) -> AppResult<Value> {
            self.ran.lock().unwrap().push(stmt.clone());
            Ok(id_from_row(None, row))
        }

        async fn column_types(&self, _table: &str) -> AppResult<ColumnTypes> {
            Ok(self.types.clone())
        }
    }

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_count_is_wrapped_as_total() {
        let mut backend = Recorder::new(SqlDialect::MySql);
        backend.rows = vec![row(json!({"total": 42}))];
        let rows = execute(&backend, &Operation::new("t", OperationKind::Count(Default::default())))
            .await
            .unwrap();
        assert_eq!(scalar_value(&rows, TOTAL), Some(&json!(42)));
    }

    #[tokio::test]
    async fn test_find_casts_filters_to_column_types() {
        let mut backend = Recorder::new(SqlDialect::Postgres);
        backend.types = [("zip".to_string(), "varchar".to_string())].into();
        let find = crate::normalizer::FindParams {
            criteria: Criteria::matching("zip", json!(12345)),
            ..Default::default()
        };
        execute(&backend, &Operation::new("addresses", OperationKind::Find(find)))
            .await
            .unwrap();
        let fetched = backend.fetched.lock().unwrap();
        assert_eq!(
            fetched[0].sql,
            "SELECT * FROM \"addresses\" WHERE \"zip\" = CAST($1 AS \"varchar\")"
        );
        assert_eq!(fetched[0].params, vec![json!("12345")]);
    }

    #[tokio::test]
    async fn test_insert_drops_placeholder_id() {
        let backend = Recorder::new(SqlDialect::MySql);
        let op = Operation::new("t", OperationKind::Insert(row(json!({"id": "new", "a": 1}))));
        let rows = execute(&backend, &op).await.unwrap();
        assert_eq!(scalar_value(&rows, INSERTED_ID), Some(&Value::Null));
        let ran = backend.ran.lock().unwrap();
        assert_eq!(ran[0].sql, "INSERT INTO `t` (`a`) VALUES (?)");
    }

    #[tokio::test]
    async fn test_empty_delete_skips_the_database() {
        let backend = Recorder::new(SqlDialect::Postgres);
        let op = Operation::new("t", OperationKind::Delete { ids: vec![] });
        let rows = execute(&backend, &op).await.unwrap();
        assert_eq!(scalar_value(&rows, DELETED_COUNT), Some(&json!(0)));
        assert!(backend.ran.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_raw_select_is_truncated_to_limit() {
        let mut backend = Recorder::new(SqlDialect::MySql);
        backend.rows = (0..5).map(|i| row(json!({"n": i}))).collect();
        let op = Operation::new(
            "",
            OperationKind::Raw {
                statement: "SELECT n FROM t".into(),
                limit: 2,
            },
        );
        assert_eq!(execute(&backend, &op).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_raw_modification_reports_affected_rows() {
        let mut backend = Recorder::new(SqlDialect::Postgres);
        backend.affected = 3;
        let op = Operation::new(
            "",
            OperationKind::Raw {
                statement: "UPDATE t SET a = 1".into(),
                limit: 10,
            },
        );
        let rows = execute(&backend, &op).await.unwrap();
        assert_eq!(scalar_value(&rows, AFFECTED_ROWS), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_raw_drop_never_reaches_the_database() {
        let backend = Recorder::new(SqlDialect::MySql);
        let op = Operation::new(
            "",
            OperationKind::Raw {
                statement: "drop table users".into(),
                limit: 10,
            },
        );
        assert!(execute(&backend, &op).await.is_err());
        assert!(backend.ran.lock().unwrap().is_empty());
        assert!(backend.fetched.lock().unwrap().is_empty());
    }

    #[test]
    fn test_decimal_and_float_conversion() {
        assert_eq!(decimal_value("12.50".parse().unwrap()), json!(12.5));
        assert_eq!(float_value(f64::NAN), Value::Null);
    }
}

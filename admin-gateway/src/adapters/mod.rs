//! Engine adapters.
//!
//! Every backend exposes the same small surface: execute one normalized
//! operation and return a row-set. Scalar results (generated id, affected
//! count, total) come back as a single-row row-set built with
//! [`common::models::row::scalar_row`] under the keys below.

pub mod mongo;
pub mod mysql;
pub mod postgres;
pub mod sql;

use async_trait::async_trait;

use common::errors::AppResult;
use common::models::{DbType, Row, RowSet};

use crate::normalizer::{Criteria, FindParams};

pub use mongo::MongoAdapter;
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;

/// Key of the generated id returned by an insert.
pub const INSERTED_ID: &str = "insertedId";
/// Key of the matched row count returned by an update or raw statement.
pub const AFFECTED_ROWS: &str = "affectedRows";
/// Key of the removed row count returned by a delete.
pub const DELETED_COUNT: &str = "deletedCount";
/// Key of the row count returned by a count.
pub const TOTAL: &str = "total";

/// What to do against a table or collection.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    Find(FindParams),
    Insert(Row),
    Update { id: String, changes: Row },
    Delete { ids: Vec<String> },
    Count(Criteria),
    /// One row per column with `column` and `data_type` fields.
    Describe,
    /// Native statement. SQL text for relational engines, a JSON
    /// `{"collection", "filter"}` document for MongoDB.
    Raw { statement: String, limit: usize },
}

/// A normalized request bound to its target.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub target: String,
    pub kind: OperationKind,
}

impl Operation {
    pub fn new(target: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            target: target.into(),
            kind,
        }
    }
}

/// Uniform interface over one open backend connection.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn engine(&self) -> DbType;

    async fn execute(&self, op: &Operation) -> AppResult<RowSet>;

    /// Tables or collections visible on this connection.
    async fn list_targets(&self) -> AppResult<Vec<String>>;

    /// Releases the underlying pool or client.
    async fn close(&self);
}

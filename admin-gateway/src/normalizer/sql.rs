//! SQL rendering for MySQL and PostgreSQL.
//!
//! Identifiers are always quoted and values are always bound as parameters.
//! `NULL` is written as a literal so that no typed null has to be bound.

use std::collections::HashMap;

use serde_json::Value;

use common::errors::{AppError, AppResult};
use common::models::Row;

use super::{Criteria, FindParams};

/// Column name to engine type name, used for PostgreSQL casts.
pub type ColumnTypes = HashMap<String, String>;

/// Primary key column assumed by update and delete.
pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    MySql,
    Postgres,
}

impl SqlDialect {
    pub fn quote_ident(self, name: &str) -> String {
        match self {
            SqlDialect::MySql => format!("`{}`", name.replace('`', "``")),
            SqlDialect::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    fn placeholder(self, index: usize) -> String {
        match self {
            SqlDialect::MySql => "?".to_string(),
            SqlDialect::Postgres => format!("${}", index),
        }
    }
}

/// A rendered statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// Statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

struct Builder {
    dialect: SqlDialect,
    params: Vec<Value>,
}

impl Builder {
    fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn ident(&self, name: &str) -> String {
        self.dialect.quote_ident(name)
    }

    /// Registers a parameter and returns its placeholder.
    fn bind(&mut self, value: Value) -> String {
        let value = match value {
            Value::Null => return "NULL".to_string(),
            Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
            scalar => scalar,
        };
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    /// Like [`Builder::bind`], casting to the column type on PostgreSQL.
    fn bind_typed(&mut self, value: Value, column: &str, types: &ColumnTypes) -> String {
        let placeholder = self.bind(value);
        match (self.dialect, types.get(column)) {
            (SqlDialect::Postgres, Some(ty)) if placeholder != "NULL" => {
                format!("CAST({} AS {})", placeholder, self.ident(ty))
            }
            _ => placeholder,
        }
    }

    fn equals(&mut self, column: &str, value: Value, types: &ColumnTypes) -> String {
        let col = self.ident(column);
        match (&value, self.dialect, types.get(column)) {
            (Value::Null, _, _) => format!("{} IS NULL", col),
            (Value::String(_), SqlDialect::Postgres, _) => {
                format!("{}::text = {}", col, self.bind(value))
            }
            // sent as text and read through the column's own input function
            (_, SqlDialect::Postgres, Some(ty)) => {
                let ty = self.ident(ty);
                let placeholder = self.bind(Value::String(value.to_string()));
                format!("{} = CAST({} AS {})", col, placeholder, ty)
            }
            _ => format!("{} = {}", col, self.bind(value)),
        }
    }

    fn contains(&mut self, column: &str, term: &str) -> String {
        let col = self.ident(column);
        let pattern = Value::String(format!("%{}%", escape_like(term)));
        match self.dialect {
            SqlDialect::MySql => format!(
                "LOWER(CAST({} AS CHAR)) LIKE LOWER({})",
                col,
                self.bind(pattern)
            ),
            SqlDialect::Postgres => format!("CAST({} AS TEXT) ILIKE {}", col, self.bind(pattern)),
        }
    }

    fn where_clause(&mut self, criteria: &Criteria, types: &ColumnTypes) -> String {
        let mut parts = Vec::new();
        if let Some(search) = &criteria.search {
            let alternatives: Vec<String> = search
                .columns
                .iter()
                .map(|column| self.contains(column, &search.term))
                .collect();
            if !alternatives.is_empty() {
                parts.push(format!("({})", alternatives.join(" OR ")));
            }
        }
        for (column, value) in &criteria.filters {
            parts.push(self.equals(column, value.clone(), types));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        }
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }
}

/// Escapes LIKE wildcards so the term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Filter values are cast to the column types in `types` on PostgreSQL.
pub fn select(
    dialect: SqlDialect,
    table: &str,
    find: &FindParams,
    types: &ColumnTypes,
) -> Statement {
    let mut b = Builder::new(dialect);
    let mut sql = format!("SELECT * FROM {}", b.ident(table));
    sql.push_str(&b.where_clause(&find.criteria, types));
    if let Some(sort) = &find.sort {
        sql.push_str(&format!(" ORDER BY {} {}", b.ident(&sort.column), sort.order.as_sql()));
    }
    if let Some(page) = find.page {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit, page.offset));
    }
    b.finish(sql)
}

pub fn count(
    dialect: SqlDialect,
    table: &str,
    criteria: &Criteria,
    types: &ColumnTypes,
) -> Statement {
    let mut b = Builder::new(dialect);
    let mut sql = format!("SELECT COUNT(*) AS total FROM {}", b.ident(table));
    sql.push_str(&b.where_clause(criteria, types));
    b.finish(sql)
}

/// Insert statement; PostgreSQL returns the stored row.
pub fn insert(dialect: SqlDialect, table: &str, row: &Row, types: &ColumnTypes) -> Statement {
    let mut b = Builder::new(dialect);
    let target = b.ident(table);
    let mut sql = if row.is_empty() {
        match dialect {
            SqlDialect::MySql => format!("INSERT INTO {} () VALUES ()", target),
            SqlDialect::Postgres => format!("INSERT INTO {} DEFAULT VALUES", target),
        }
    } else {
        let columns: Vec<String> = row.keys().map(|c| b.ident(c)).collect();
        let values: Vec<String> = row
            .iter()
            .map(|(column, value)| b.bind_typed(value.clone(), column, types))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            target,
            columns.join(", "),
            values.join(", ")
        )
    };
    if dialect == SqlDialect::Postgres {
        sql.push_str(" RETURNING *");
    }
    b.finish(sql)
}

pub fn update(
    dialect: SqlDialect,
    table: &str,
    id: &str,
    changes: &Row,
    types: &ColumnTypes,
) -> AppResult<Statement> {
    if changes.is_empty() {
        return Err(AppError::Validation("No fields to update".into()));
    }
    let mut b = Builder::new(dialect);
    let assignments: Vec<String> = changes
        .iter()
        .map(|(column, value)| {
            let target = b.ident(column);
            format!("{} = {}", target, b.bind_typed(value.clone(), column, types))
        })
        .collect();
    let condition = b.equals(ID_COLUMN, Value::String(id.to_string()), types);
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        b.ident(table),
        assignments.join(", "),
        condition
    );
    Ok(b.finish(sql))
}

/// Delete by id; ids are compared as text on PostgreSQL.
pub fn delete(dialect: SqlDialect, table: &str, ids: &[String]) -> Statement {
    let mut b = Builder::new(dialect);
    let placeholders: Vec<String> = ids
        .iter()
        .map(|id| b.bind(Value::String(id.clone())))
        .collect();
    let column = match dialect {
        SqlDialect::MySql => b.ident(ID_COLUMN),
        SqlDialect::Postgres => format!("{}::text", b.ident(ID_COLUMN)),
    };
    let sql = format!(
        "DELETE FROM {} WHERE {} IN ({})",
        b.ident(table),
        column,
        placeholders.join(", ")
    );
    b.finish(sql)
}

/// Column listing from `information_schema`, one row per column with
/// `column` and `data_type` fields.
pub fn describe(dialect: SqlDialect, table: &str) -> Statement {
    let mut b = Builder::new(dialect);
    let sql = match dialect {
        SqlDialect::MySql => format!(
            "SELECT CAST(column_name AS CHAR) AS `column`, CAST(data_type AS CHAR) AS data_type \
             FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = {} \
             ORDER BY ordinal_position",
            b.bind(Value::String(table.to_string()))
        ),
        SqlDialect::Postgres => format!(
            "SELECT column_name::text AS \"column\", udt_name::text AS data_type \
             FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = {} \
             ORDER BY ordinal_position",
            b.bind(Value::String(table.to_string()))
        ),
    };
    b.finish(sql)
}

//! Query normalization.
//!
//! Turns query-string input into engine-neutral [`FindParams`]. The
//! submodules render those parameters for a concrete engine: [`sql`] for the
//! two relational dialects and [`document`] for MongoDB.

pub mod document;
pub mod sql;

use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;

use common::errors::{AppError, AppResult};
use common::models::Row;

/// Page size used when `limit` is absent.
pub const DEFAULT_LIMIT: u64 = 10;

/// Raw listing parameters from `GET /data/{table}`.
///
/// Every field stays a string here so that parse failures surface as
/// validation errors instead of extractor rejections.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Page size (default 10).
    pub limit: Option<String>,
    /// Rows to skip (default 0).
    pub offset: Option<String>,
    /// Alias of `offset`.
    pub skip: Option<String>,
    /// Column to sort by.
    pub sort: Option<String>,
    /// `ASC` or `DESC` (default `ASC`).
    pub order: Option<String>,
    /// Case-insensitive substring matched against every column.
    pub search: Option<String>,
    /// JSON object of column to exact value.
    pub filters: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(str::trim) {
            None | Some("") => Ok(SortOrder::Asc),
            Some(value) if value.eq_ignore_ascii_case("asc") => Ok(SortOrder::Asc),
            Some(value) if value.eq_ignore_ascii_case("desc") => Ok(SortOrder::Desc),
            Some(other) => Err(AppError::Validation(format!(
                "order must be ASC or DESC, got \"{}\"",
                other
            ))),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub column: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

/// Free-text search over a fixed set of columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    pub term: String,
    pub columns: Vec<String>,
}

/// Row selection shared by find and count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub search: Option<Search>,
    /// Exact-match conditions, in request order.
    pub filters: Vec<(String, Value)>,
}

impl Criteria {
    /// Single equality condition.
    pub fn matching(column: impl Into<String>, value: Value) -> Self {
        Self {
            search: None,
            filters: vec![(column.into(), value)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.filters.is_empty()
    }
}

/// Normalized parameters of a find operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindParams {
    pub criteria: Criteria,
    pub sort: Option<Sort>,
    /// `None` reads every row.
    pub page: Option<Page>,
}

impl FindParams {
    /// Unfiltered, unpaginated read.
    pub fn all() -> Self {
        Self::default()
    }

    /// One-row sample used for column discovery.
    pub fn sample() -> Self {
        Self {
            page: Some(Page { limit: 1, offset: 0 }),
            ..Self::default()
        }
    }

    /// Builds find parameters from listing input.
    ///
    /// `columns` is the column set observed in a one-row sample of `table`;
    /// filters must name one of them and search spans all of them.
    pub fn from_list_params(table: &str, params: &ListParams, columns: &[String]) -> AppResult<Self> {
        let limit = parse_count("limit", params.limit.as_deref(), DEFAULT_LIMIT)?;
        let offset_raw = params.offset.as_deref().or(params.skip.as_deref());
        let offset = parse_count("offset", offset_raw, 0)?;

        let order = SortOrder::parse(params.order.as_deref())?;
        let sort = params
            .sort
            .as_deref()
            .map(str::trim)
            .filter(|column| columns.iter().any(|c| c == *column))
            .map(|column| Sort {
                column: column.to_string(),
                order,
            });

        let search = params
            .search
            .as_deref()
            .filter(|term| !term.is_empty() && !columns.is_empty())
            .map(|term| Search {
                term: term.to_string(),
                columns: columns.to_vec(),
            });

        let filters = match params.filters.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(raw) => parse_filters(table, raw, columns)?,
        };

        Ok(Self {
            criteria: Criteria { search, filters },
            sort,
            page: Some(Page { limit, offset }),
        })
    }
}

/// Largest accepted `limit` or `offset`. Every engine takes a signed 64-bit count.
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// Parses a non-negative integer parameter; absent or blank means `default`.
fn parse_count(name: &str, raw: Option<&str>, default: u64) -> AppResult<u64> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<u64>()
            .ok()
            .filter(|count| *count <= MAX_COUNT)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "{} must be an integer between 0 and {}, got \"{}\"",
                    name, MAX_COUNT, value
                ))
            }),
    }
}

fn parse_filters(table: &str, raw: &str, columns: &[String]) -> AppResult<Vec<(String, Value)>> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|e| AppError::Validation(format!("filters is not valid JSON: {}", e)))?;
    let Value::Object(map) = parsed else {
        return Err(AppError::Validation(
            "filters must be a JSON object of column to value".into(),
        ));
    };

    map.into_iter()
        .map(|(column, value)| {
            if columns.iter().any(|c| *c == column) {
                Ok((column, value))
            } else {
                Err(AppError::UnknownColumn {
                    column,
                    table: table.to_string(),
                })
            }
        })
        .collect()
}

/// Removes placeholder identifiers before an insert.
///
/// An `id` of `"new"` or any falsy value is dropped so the engine generates
/// one; `_id` is always dropped for the document store.
pub fn prepare_insert(mut row: Row, document_store: bool) -> Row {
    let placeholder_id = row.get("id").map(is_placeholder_id).unwrap_or(false);
    if placeholder_id {
        row.shift_remove("id");
    }
    if document_store {
        row.shift_remove("_id");
    }
    row
}

fn is_placeholder_id(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "new",
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Converts the ids of a delete request to strings.
pub fn normalize_ids(ids: &[Value]) -> AppResult<Vec<String>> {
    ids.iter()
        .map(|id| match id {
            Value::String(s) if !s.is_empty() => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(AppError::InvalidIdentifier(other.to_string())),
        })
        .collect()
}

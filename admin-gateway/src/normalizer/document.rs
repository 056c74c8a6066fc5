//! MongoDB filter and sort documents.

use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use serde_json::Value;

use common::errors::{AppError, AppResult};
use common::models::Row;

use super::{Criteria, Sort, SortOrder};

/// Field holding the document identifier.
pub const ID_FIELD: &str = "_id";

/// Parses a 24-character hex string into an `ObjectId`.
pub fn object_id(raw: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::InvalidIdentifier(raw.to_string()))
}

/// Builds the query filter for a find or count.
///
/// Search becomes an `$or` of case-insensitive regex clauses with the term
/// escaped; filters become exact-match fields.
pub fn filter(criteria: &Criteria) -> AppResult<Document> {
    let mut filter = Document::new();

    if let Some(search) = &criteria.search {
        let pattern = regex::escape(&search.term);
        let clauses: Vec<Document> = search
            .columns
            .iter()
            .map(|column| {
                let mut clause = Document::new();
                clause.insert(column.clone(), doc! { "$regex": pattern.clone(), "$options": "i" });
                clause
            })
            .collect();
        if !clauses.is_empty() {
            filter.insert("$or", clauses);
        }
    }

    for (field, value) in &criteria.filters {
        filter.insert(field.clone(), field_value(field, value)?);
    }
    Ok(filter)
}

/// Converts a filter value, turning string ids into `ObjectId`s.
fn field_value(field: &str, value: &Value) -> AppResult<Bson> {
    match value {
        Value::String(raw) if field == ID_FIELD => object_id(raw).map(Bson::ObjectId),
        other => bson::to_bson(other).map_err(|e| AppError::Internal(e.to_string())),
    }
}

pub fn sort(sort: &Sort) -> Document {
    let direction = match sort.order {
        SortOrder::Asc => 1,
        SortOrder::Desc => -1,
    };
    let mut doc = Document::new();
    doc.insert(sort.column.clone(), direction);
    doc
}

/// Converts a JSON row into a document for insertion or `$set`.
pub fn to_document(row: &Row) -> AppResult<Document> {
    bson::to_document(row).map_err(|e| AppError::Validation(format!("invalid document: {}", e)))
}

/// Converts a stored document to a JSON row.
pub fn to_row(document: &Document) -> Row {
    document
        .iter()
        .map(|(key, value)| (key.clone(), bson_to_json(value)))
        .collect()
}

/// Converts BSON to JSON, rendering ids and dates as strings.
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(
            dt.try_to_rfc3339_string()
                .unwrap_or_else(|_| dt.timestamp_millis().to_string()),
        ),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => Value::Object(to_row(doc)),
        Bson::Binary(bin) => Value::String(format!("<binary {} bytes>", bin.bytes.len())),
        Bson::Timestamp(ts) => Value::from(ts.time),
        other => Value::String(other.to_string()),
    }
}

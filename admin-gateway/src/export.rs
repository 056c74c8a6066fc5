//! Table export as JSON or CSV.

use std::str::FromStr;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use common::errors::{AppError, AppResult};
use common::models::row::column_names;
use common::models::RowSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(AppError::Validation(format!(
                "format must be json or csv, got \"{}\"",
                other
            ))),
        }
    }
}

/// Renders rows as CSV.
///
/// The header is the first row's columns in order. Later rows fill missing
/// columns with empty cells and lose columns the first row lacks. Every
/// record ends with a newline. No rows gives an empty document.
pub fn to_csv(rows: &RowSet) -> AppResult<String> {
    let header = column_names(rows);
    if header.is_empty() {
        return Ok(String::new());
    }

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&header).map_err(csv_error)?;
    for row in rows {
        let record = header
            .iter()
            .map(|column| row.get(column).map(cell).unwrap_or_default());
        wtr.write_record(record).map_err(csv_error)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV is not UTF-8: {}", e)))
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Internal(format!("CSV write failed: {}", e))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builds the download response for `table`.
pub fn render(table: &str, format: ExportFormat, rows: &RowSet) -> AppResult<Response> {
    let body = match format {
        ExportFormat::Json => serde_json::to_string(rows)
            .map_err(|e| AppError::Internal(format!("JSON export failed: {}", e)))?,
        ExportFormat::Csv => to_csv(rows)?,
    };
    let filename = table.replace(['"', '\\', '/', '\r', '\n'], "_");
    let disposition = format!(
        "attachment; filename=\"{}.{}\"",
        filename,
        format.extension()
    );

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> RowSet {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_csv_header_and_rows() {
        let csv = to_csv(&rows(json!([{"a": 1, "b": 2}, {"a": 3, "b": 4}]))).unwrap();
        assert_eq!(csv, "a,b\n1,2\n3,4\n");
    }

    #[test]
    fn test_csv_quotes_and_escapes() {
        let csv = to_csv(&rows(json!([{"name": "Smith, J", "note": "say \"hi\""}]))).unwrap();
        assert_eq!(csv, "name,note\n\"Smith, J\",\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn test_csv_columns_come_from_first_row() {
        let csv = to_csv(&rows(json!([
            {"a": 1, "b": null},
            {"b": "x", "extra": true}
        ])))
        .unwrap();
        assert_eq!(csv, "a,b\n1,\n,x\n");
    }

    #[test]
    fn test_csv_nested_values_are_json() {
        let csv = to_csv(&rows(json!([{"tags": ["a", "b"]}]))).unwrap();
        assert_eq!(csv, "tags\n\"[\"\"a\"\",\"\"b\"\"]\"\n");
    }

    #[test]
    fn test_empty_export_is_empty() {
        assert_eq!(to_csv(&Vec::new()).unwrap(), "");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_render_sets_attachment_headers() {
        let response = render("users", ExportFormat::Csv, &Vec::new()).unwrap();
        let headers = response.headers();
        assert!(headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv"));
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"users.csv\""
        );
    }
}

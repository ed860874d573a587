//! JSON documents.
//!
//! Three shapes are understood:
//!
//! - an array of objects (one row per object, columns in first-seen order),
//! - an object of such arrays, one of which is picked by name
//!   (`{"correct_data": [...], "incorrect_data": [...]}`),
//! - an object of scalars, read as a two-column `key`/`value` table
//!   (the shape served by the ranking endpoints).

use super::{ParsedTable, SkippedRow};
use crate::error::SourceError;
use crate::table::{Table, Value};
use serde_json::Value as Json;

/// Parse a JSON document, optionally selecting a named dataset.
pub fn parse_json(
    identifier: &str,
    bytes: &[u8],
    dataset: Option<&str>,
) -> Result<ParsedTable, SourceError> {
    let document: Json =
        serde_json::from_slice(bytes).map_err(|e| SourceError::parse(identifier, e))?;

    let selected = match dataset {
        Some(name) => document.get(name).ok_or_else(|| {
            SourceError::parse(identifier, format!("dataset '{}' not found", name))
        })?,
        None => &document,
    };

    match selected {
        Json::Array(items) => Ok(records_to_table(items)),
        Json::Object(map) if map.values().all(is_scalar) => {
            let rows = map
                .iter()
                .map(|(key, value)| vec![Value::from(key.as_str()), Value::from_json(value)])
                .collect();
            Ok(ParsedTable {
                table: Table::from_rows(["key", "value"], rows),
                skipped: Vec::new(),
            })
        }
        Json::Object(map) => {
            let names: Vec<&str> = map.keys().map(String::as_str).collect();
            Err(SourceError::parse(
                identifier,
                format!(
                    "document holds several datasets ({}); select one with '#name'",
                    names.join(", ")
                ),
            ))
        }
        other => Err(SourceError::parse(
            identifier,
            format!("expected an array or object, found {}", json_kind(other)),
        )),
    }
}

fn is_scalar(value: &Json) -> bool {
    !matches!(value, Json::Array(_) | Json::Object(_))
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

fn records_to_table(items: &[Json]) -> ParsedTable {
    let mut columns: Vec<String> = Vec::new();
    for item in items {
        if let Json::Object(record) = item {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let mut table = Table::new(columns.iter().map(String::as_str));
    let mut skipped = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match item {
            Json::Object(record) => {
                let row = columns
                    .iter()
                    .map(|c| record.get(c).map(Value::from_json).unwrap_or(Value::Null))
                    .collect();
                table.push_row(row);
            }
            other => skipped.push(SkippedRow {
                line: index as u64 + 1,
                reason: format!("expected an object, found {}", json_kind(other)),
            }),
        }
    }

    ParsedTable { table, skipped }
}

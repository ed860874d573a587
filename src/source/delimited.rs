//! CSV parsing.
//!
//! Parsing is lenient: a record with the wrong number of fields, or one that
//! is not valid UTF-8, is recorded as skipped and the rest of the file still
//! loads. Only a missing header or an I/O failure aborts the whole document.

use super::{ParsedTable, SkippedRow};
use crate::error::SourceError;
use crate::table::{Table, Value};
use csv::{ReaderBuilder, Trim};
use std::io::Read;

/// Parse a CSV document with a header row.
pub fn parse_csv<R: Read>(identifier: &str, input: R) -> Result<ParsedTable, SourceError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| SourceError::parse(identifier, e))?
        .clone();

    if headers.is_empty() {
        return Err(SourceError::parse(identifier, "missing header row"));
    }

    let mut table = Table::new(headers.iter());
    let mut skipped = Vec::new();

    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => table.push_row(record.iter().map(Value::parse).collect()),
            Err(e) if e.is_io_error() => {
                return Err(SourceError::unavailable(identifier, e));
            }
            Err(e) => {
                // Header is line 1, so the n-th record is at least on line n + 2.
                let line = e
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(index as u64 + 2);
                skipped.push(SkippedRow {
                    line,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(ParsedTable { table, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_types() {
        let input = "customer_id,quantity,price,date\nC1,3,9.5,2024-01-05\nC2,,NA,\n";
        let parsed = parse_csv("orders.csv", input.as_bytes()).unwrap();

        assert!(parsed.skipped.is_empty());
        let table = parsed.table;
        assert_eq!(table.columns(), ["customer_id", "quantity", "price", "date"]);
        assert_eq!(table.value(0, "quantity"), Some(&Value::Int(3)));
        assert_eq!(table.value(0, "price"), Some(&Value::Float(9.5)));
        assert!(matches!(table.value(0, "date"), Some(Value::Date(_))));
        assert_eq!(table.value(1, "quantity"), Some(&Value::Null));
        assert_eq!(table.value(1, "price"), Some(&Value::Null));
        assert_eq!(table.value(1, "date"), Some(&Value::Null));
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let input = "customer_id,quantity\nA,3\nB,4,extra\nC,5\n";
        let parsed = parse_csv("orders.csv", input.as_bytes()).unwrap();

        assert_eq!(parsed.table.num_rows(), 2);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line, 3);
        assert_eq!(parsed.table.value(1, "customer_id"), Some(&Value::from("C")));
    }

    #[test]
    fn test_invalid_utf8_row_is_skipped() {
        let mut input = b"customer_id,quantity\nA,1\n".to_vec();
        input.extend_from_slice(b"\xff\xfe,2\nB,3\n");
        let parsed = parse_csv("orders.csv", input.as_slice()).unwrap();

        assert_eq!(parsed.table.num_rows(), 2);
        assert_eq!(parsed.skipped.len(), 1);
    }

    #[test]
    fn test_empty_document_is_a_parse_error() {
        let err = parse_csv("empty.csv", "".as_bytes()).unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[test]
    fn test_header_only() {
        let parsed = parse_csv("orders.csv", "customer_id,quantity\n".as_bytes()).unwrap();
        assert!(parsed.table.is_empty());
        assert_eq!(parsed.table.num_columns(), 2);
    }
}

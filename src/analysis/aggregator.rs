//! Table aggregation.
//!
//! Every function here is a pure transform from one table to a new one:
//! grouped sums, top-N selection, frequency tables, threshold filters,
//! missing-value summaries and validity classification. Failures are atomic;
//! an operation either returns a complete table or an `AggregateError`.

use crate::error::AggregateError;
use crate::table::{parse_date, Table, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Name of the column appended by [`classify_validity`].
pub const VALIDITY_COLUMN: &str = "is_valid";

/// Name of the count column produced by counting operations.
pub const COUNT_COLUMN: &str = "count";

/// Name of the proportion column produced by a normalized [`frequency`].
pub const PROPORTION_COLUMN: &str = "proportion";

/// Running sum that stays integral until a float shows up.
#[derive(Debug, Default)]
struct Sum {
    int: i128,
    float: f64,
    is_float: bool,
}

impl Sum {
    /// Adds a cell. Returns the offending type name for non-numeric cells.
    fn add(&mut self, value: &Value) -> Result<(), &'static str> {
        match value {
            Value::Null => {}
            Value::Int(i) => {
                self.int += i128::from(*i);
                self.float += *i as f64;
            }
            Value::Float(x) => {
                self.float += x;
                self.is_float = true;
            }
            other => return Err(other.type_name()),
        }
        Ok(())
    }

    fn into_value(self) -> Value {
        if self.is_float {
            return Value::Float(self.float);
        }
        match i64::try_from(self.int) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Float(self.float),
        }
    }
}

fn type_mismatch(column: &str, row: usize, found: &str) -> AggregateError {
    AggregateError::TypeMismatch {
        column: column.to_string(),
        row,
        found: found.to_string(),
    }
}

/// Sum `value_column` per distinct combination of `key_columns`.
///
/// Nulls contribute nothing to the sum. Output rows are ordered by ascending
/// key, key columns first and the sum last under the value column's name.
pub fn group_sum(
    table: &Table,
    key_columns: &[&str],
    value_column: &str,
) -> Result<Table, AggregateError> {
    if key_columns.is_empty() {
        return Err(AggregateError::EmptyInput(
            "group_sum needs at least one key column".to_string(),
        ));
    }

    let key_idx = key_columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<Vec<_>, _>>()?;
    let value_idx = table.column_index(value_column)?;

    let mut groups: BTreeMap<Vec<Value>, Sum> = BTreeMap::new();

    for (row_no, row) in table.rows().iter().enumerate() {
        let key: Vec<Value> = key_idx.iter().map(|&i| row[i].clone()).collect();
        groups
            .entry(key)
            .or_default()
            .add(&row[value_idx])
            .map_err(|found| type_mismatch(value_column, row_no, found))?;
    }

    let mut result = Table::new(key_columns.iter().copied().chain([value_column]));
    for (mut key, sum) in groups {
        key.push(sum.into_value());
        result.push_row(key);
    }

    Ok(result)
}

/// Null-last comparison in either direction.
fn compare_nulls_last(a: &Value, b: &Value, descending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ if descending => b.cmp(a),
        _ => a.cmp(b),
    }
}

/// First `n` rows after a stable sort on `by_column`.
///
/// Rows with equal sort values keep their input order. Asking for more rows
/// than exist returns them all.
pub fn top_n(
    result: &Table,
    n: usize,
    by_column: &str,
    descending: bool,
) -> Result<Table, AggregateError> {
    let idx = result.column_index(by_column)?;

    let mut rows = result.rows().to_vec();
    rows.sort_by(|a, b| compare_nulls_last(&a[idx], &b[idx], descending));
    rows.truncate(n);

    Ok(result.with_rows(rows))
}

/// Stable sort on one column without a row limit.
pub fn sort_by(table: &Table, column: &str, descending: bool) -> Result<Table, AggregateError> {
    top_n(table, usize::MAX, column, descending)
}

/// Count rows per distinct value of `column`, null included.
///
/// With `normalize`, counts become proportions of the total row count.
/// Rows come out most frequent first; equal counts keep first-seen order.
pub fn frequency(table: &Table, column: &str, normalize: bool) -> Result<Table, AggregateError> {
    let mut positions: BTreeMap<&Value, usize> = BTreeMap::new();
    let mut counts: Vec<(Value, usize)> = Vec::new();

    for value in table.column(column)? {
        match positions.get(value) {
            Some(&pos) => counts[pos].1 += 1,
            None => {
                positions.insert(value, counts.len());
                counts.push((value.clone(), 1));
            }
        }
    }

    counts.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

    let total = table.num_rows() as f64;
    let measure = if normalize {
        PROPORTION_COLUMN
    } else {
        COUNT_COLUMN
    };

    let mut result = Table::new([column, measure]);
    for (value, count) in counts {
        let measured = if normalize {
            Value::Float(count as f64 / total)
        } else {
            Value::from(count)
        };
        result.push_row(vec![value, measured]);
    }

    Ok(result)
}

/// Keep rows whose `proportion_column` is strictly greater than `min_proportion`.
///
/// Rows with a null in that column are dropped. Proportions are not
/// renormalized: they stay relative to the table they were computed from.
pub fn threshold_filter(
    result: &Table,
    proportion_column: &str,
    min_proportion: f64,
) -> Result<Table, AggregateError> {
    let idx = result.column_index(proportion_column)?;
    let mut kept = Vec::new();

    for (row_no, row) in result.rows().iter().enumerate() {
        let cell = &row[idx];
        if cell.is_null() {
            continue;
        }
        let value = cell
            .as_f64()
            .ok_or_else(|| type_mismatch(proportion_column, row_no, cell.type_name()))?;
        if value > min_proportion {
            kept.push(row.clone());
        }
    }

    Ok(result.with_rows(kept))
}

/// Null count and percentage of rows for every column, in column order.
///
/// An empty table reports 0 percent everywhere.
pub fn missing_summary(table: &Table) -> Table {
    let total = table.num_rows();
    let mut summary = Table::new(["column", "missing", "percent"]);

    for (idx, name) in table.columns().iter().enumerate() {
        let missing = table.rows().iter().filter(|row| row[idx].is_null()).count();
        let percent = if total == 0 {
            0.0
        } else {
            missing as f64 / total as f64 * 100.0
        };
        summary.push_row(vec![
            Value::from(name.as_str()),
            Value::from(missing),
            Value::Float(percent),
        ]);
    }

    summary
}

/// Append [`VALIDITY_COLUMN`]: true when `reason_column` is null.
pub fn classify_validity(table: &Table, reason_column: &str) -> Result<Table, AggregateError> {
    let cells = table
        .column(reason_column)?
        .map(|reason| Value::Bool(reason.is_null()))
        .collect();

    Ok(table.with_appended_column(VALIDITY_COLUMN, cells))
}

/// Row counts per observed `(col_a, col_b)` pair, ascending by pair.
///
/// Pairs that never occur are not listed.
pub fn group_by_pair_count(
    table: &Table,
    col_a: &str,
    col_b: &str,
) -> Result<Table, AggregateError> {
    let a = table.column_index(col_a)?;
    let b = table.column_index(col_b)?;

    let mut pairs: BTreeMap<(&Value, &Value), usize> = BTreeMap::new();
    for row in table.rows() {
        *pairs.entry((&row[a], &row[b])).or_default() += 1;
    }

    let mut result = Table::new([col_a, col_b, COUNT_COLUMN]);
    for ((va, vb), count) in pairs {
        result.push_row(vec![va.clone(), vb.clone(), Value::from(count)]);
    }

    Ok(result)
}

/// Append `output = left * right` for every row. A null operand gives null.
pub fn derive_product(
    table: &Table,
    left: &str,
    right: &str,
    output: &str,
) -> Result<Table, AggregateError> {
    let l = table.column_index(left)?;
    let r = table.column_index(right)?;
    let mut cells = Vec::with_capacity(table.num_rows());

    for (row_no, row) in table.rows().iter().enumerate() {
        let cell = match (&row[l], &row[r]) {
            (Value::Null, _) | (_, Value::Null) => Value::Null,
            (Value::Int(x), Value::Int(y)) => match x.checked_mul(*y) {
                Some(p) => Value::Int(p),
                None => Value::Float(*x as f64 * *y as f64),
            },
            (x, y) => {
                let x = x
                    .as_f64()
                    .ok_or_else(|| type_mismatch(left, row_no, x.type_name()))?;
                let y = y
                    .as_f64()
                    .ok_or_else(|| type_mismatch(right, row_no, y.type_name()))?;
                Value::Float(x * y)
            }
        };
        cells.push(cell);
    }

    Ok(table.with_appended_column(output, cells))
}

/// Turn a column into dates; cells that do not parse become null.
pub fn coerce_dates(table: &Table, column: &str) -> Result<Table, AggregateError> {
    let cells = table
        .column(column)?
        .map(|cell| match cell {
            Value::Date(d) => Value::Date(*d),
            Value::Str(s) => parse_date(s).map(Value::Date).unwrap_or(Value::Null),
            _ => Value::Null,
        })
        .collect();

    Ok(table.with_appended_column(column, cells))
}

/// Remove rows holding a null in any of `columns`.
pub fn drop_nulls(table: &Table, columns: &[&str]) -> Result<Table, AggregateError> {
    let idx = columns
        .iter()
        .map(|c| table.column_index(c))
        .collect::<Result<Vec<_>, _>>()?;

    let rows = table
        .rows()
        .iter()
        .filter(|row| idx.iter().all(|&i| !row[i].is_null()))
        .cloned()
        .collect();

    Ok(table.with_rows(rows))
}

/// Headline data quality figures: records, null cells and negative numbers.
pub fn quality_metrics(table: &Table) -> Table {
    let cells = || table.rows().iter().flatten();
    let missing = cells().filter(|v| v.is_null()).count();
    let negative = cells()
        .filter(|v| v.as_f64().is_some_and(|x| x < 0.0))
        .count();

    Table::from_rows(
        ["metric", "value"],
        vec![
            vec![Value::from("records"), Value::from(table.num_rows())],
            vec![Value::from("missing_values"), Value::from(missing)],
            vec![Value::from("negative_values"), Value::from(negative)],
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Table {
        Table::from_rows(
            ["customer_id", "quantity"],
            vec![
                vec![Value::from("A"), Value::from(3)],
                vec![Value::from("B"), Value::from(10)],
                vec![Value::from("A"), Value::from(5)],
            ],
        )
    }

    fn column_values(table: &Table, column: &str) -> Vec<Value> {
        table.column(column).unwrap().cloned().collect()
    }

    #[test]
    fn test_group_sum_then_top_n() {
        let sums = group_sum(&orders(), &["customer_id"], "quantity").unwrap();
        assert_eq!(sums.columns(), ["customer_id", "quantity"]);
        assert_eq!(
            sums.rows(),
            [
                vec![Value::from("A"), Value::Int(8)],
                vec![Value::from("B"), Value::Int(10)],
            ]
        );

        let top = top_n(&sums, 2, "quantity", true).unwrap();
        assert_eq!(
            top.rows(),
            [
                vec![Value::from("B"), Value::Int(10)],
                vec![Value::from("A"), Value::Int(8)],
            ]
        );
    }

    #[test]
    fn test_group_sum_ignores_nulls_and_promotes_floats() {
        let table = Table::from_rows(
            ["category", "price"],
            vec![
                vec![Value::from("toys"), Value::Null],
                vec![Value::from("toys"), Value::from(2)],
                vec![Value::from("food"), Value::from(1.5)],
                vec![Value::from("food"), Value::from(1)],
            ],
        );

        let sums = group_sum(&table, &["category"], "price").unwrap();
        assert_eq!(sums.value(0, "category"), Some(&Value::from("food")));
        assert!(matches!(sums.value(0, "price"), Some(Value::Float(x)) if *x == 2.5));
        assert!(matches!(sums.value(1, "price"), Some(Value::Int(2))));
    }

    #[test]
    fn test_group_sum_all_null_group_is_zero() {
        let table = Table::from_rows(
            ["k", "v"],
            vec![vec![Value::from("x"), Value::Null]],
        );
        let sums = group_sum(&table, &["k"], "v").unwrap();
        assert_eq!(sums.value(0, "v"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_group_sum_type_mismatch() {
        let table = Table::from_rows(
            ["customer_id", "quantity"],
            vec![
                vec![Value::from("A"), Value::from(1)],
                vec![Value::from("B"), Value::from("lots")],
            ],
        );

        let err = group_sum(&table, &["customer_id"], "quantity").unwrap_err();
        assert_eq!(
            err,
            AggregateError::TypeMismatch {
                column: "quantity".to_string(),
                row: 1,
                found: "string".to_string(),
            }
        );
    }

    #[test]
    fn test_group_sum_requires_columns() {
        assert!(matches!(
            group_sum(&orders(), &[], "quantity"),
            Err(AggregateError::EmptyInput(_))
        ));
        assert_eq!(
            group_sum(&orders(), &["product_id"], "quantity"),
            Err(AggregateError::ColumnNotFound("product_id".to_string()))
        );
    }

    #[test]
    fn test_group_sum_multiple_keys() {
        let table = Table::from_rows(
            ["carrier", "status", "refund_amount"],
            vec![
                vec![Value::from("UPS"), Value::from("late"), Value::from(4)],
                vec![Value::from("DHL"), Value::from("ok"), Value::from(1)],
                vec![Value::from("UPS"), Value::from("late"), Value::from(6)],
            ],
        );
        let sums = group_sum(&table, &["carrier", "status"], "refund_amount").unwrap();
        assert_eq!(sums.num_rows(), 2);
        assert_eq!(sums.columns(), ["carrier", "status", "refund_amount"]);
        assert_eq!(sums.rows()[1][2], Value::Int(10));
    }

    #[test]
    fn test_top_five_of_many() {
        let rows = (0..12)
            .map(|i| vec![Value::from(format!("C{:02}", i)), Value::from((i * 7) % 12)])
            .collect();
        let table = Table::from_rows(["customer_id", "quantity"], rows);

        let sums = group_sum(&table, &["customer_id"], "quantity").unwrap();
        let top = top_n(&sums, 5, "quantity", true).unwrap();

        let mut all: Vec<i64> = column_values(&sums, "quantity")
            .iter()
            .map(|v| v.as_f64().unwrap() as i64)
            .collect();
        all.sort_unstable_by(|a, b| b.cmp(a));

        let picked: Vec<i64> = column_values(&top, "quantity")
            .iter()
            .map(|v| v.as_f64().unwrap() as i64)
            .collect();
        assert_eq!(picked, all[..5]);
    }

    #[test]
    fn test_top_n_is_stable_and_tolerates_large_n() {
        let table = Table::from_rows(
            ["id", "n"],
            vec![
                vec![Value::from("first"), Value::from(1)],
                vec![Value::from("second"), Value::from(2)],
                vec![Value::from("third"), Value::from(1)],
                vec![Value::from("fourth"), Value::Null],
            ],
        );

        let top = top_n(&table, 10, "n", true).unwrap();
        assert_eq!(
            column_values(&top, "id"),
            vec![
                Value::from("second"),
                Value::from("first"),
                Value::from("third"),
                Value::from("fourth"),
            ]
        );

        let asc = top_n(&table, 2, "n", false).unwrap();
        assert_eq!(
            column_values(&asc, "id"),
            vec![Value::from("first"), Value::from("third")]
        );
    }

    #[test]
    fn test_group_sum_top_n_is_deterministic() {
        let table = orders();
        let run = || top_n(&group_sum(&table, &["customer_id"], "quantity").unwrap(), 5, "quantity", true).unwrap();
        assert_eq!(run(), run());
    }

    #[test]
    fn test_frequency_counts_null_bucket() {
        let table = Table::from_rows(
            ["category"],
            vec![
                vec![Value::from("toys")],
                vec![Value::Null],
                vec![Value::from("food")],
                vec![Value::from("food")],
            ],
        );

        let counts = frequency(&table, "category", false).unwrap();
        assert_eq!(counts.columns(), ["category", "count"]);
        assert_eq!(
            counts.rows(),
            [
                vec![Value::from("food"), Value::Int(2)],
                vec![Value::from("toys"), Value::Int(1)],
                vec![Value::Null, Value::Int(1)],
            ]
        );
    }

    #[test]
    fn test_frequency_proportions_sum_to_one() {
        let rows = (0..7)
            .map(|i| vec![if i % 3 == 0 { Value::Null } else { Value::from(i % 2) }])
            .collect();
        let table = Table::from_rows(["bucket"], rows);

        let proportions = frequency(&table, "bucket", true).unwrap();
        let total: f64 = column_values(&proportions, PROPORTION_COLUMN)
            .iter()
            .map(|v| v.as_f64().unwrap())
            .sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_frequency_of_empty_table() {
        let table = Table::new(["category"]);
        let proportions = frequency(&table, "category", true).unwrap();
        assert!(proportions.is_empty());
    }

    #[test]
    fn test_threshold_filter_is_strict() {
        let table = Table::from_rows(
            ["category", "proportion"],
            vec![
                vec![Value::from("a"), Value::from(0.5)],
                vec![Value::from("b"), Value::from(0.01)],
                vec![Value::from("c"), Value::from(0.009)],
                vec![Value::from("d"), Value::from(0.0101)],
                vec![Value::from("e"), Value::Null],
            ],
        );

        let kept = threshold_filter(&table, "proportion", 0.01).unwrap();
        assert_eq!(
            column_values(&kept, "category"),
            vec![Value::from("a"), Value::from("d")]
        );
        for value in column_values(&kept, "proportion") {
            assert!(value.as_f64().unwrap() > 0.01);
        }
    }

    #[test]
    fn test_threshold_filter_keeps_original_denominator() {
        let rows = (0..200)
            .map(|i| vec![Value::from(if i == 0 { "rare" } else { "common" })])
            .collect();
        let table = Table::from_rows(["category"], rows);

        let proportions = frequency(&table, "category", true).unwrap();
        let kept = threshold_filter(&proportions, PROPORTION_COLUMN, 0.01).unwrap();

        assert_eq!(kept.num_rows(), 1);
        assert_eq!(kept.value(0, PROPORTION_COLUMN), Some(&Value::Float(0.995)));
    }

    #[test]
    fn test_threshold_filter_errors_and_empty_result() {
        let table = Table::from_rows(["k", "p"], vec![vec![Value::from("a"), Value::from(0.001)]]);

        assert_eq!(
            threshold_filter(&table, "share", 0.01),
            Err(AggregateError::ColumnNotFound("share".to_string()))
        );

        let empty = threshold_filter(&table, "p", 0.01).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.columns(), ["k", "p"]);

        let bad = Table::from_rows(["p"], vec![vec![Value::from("high")]]);
        assert!(matches!(
            threshold_filter(&bad, "p", 0.01),
            Err(AggregateError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_summary() {
        let table = Table::from_rows(
            ["customer_id", "price"],
            vec![
                vec![Value::from("A"), Value::Null],
                vec![Value::Null, Value::Null],
                vec![Value::from("C"), Value::from(2.0)],
                vec![Value::from("D"), Value::Null],
            ],
        );

        let summary = missing_summary(&table);
        assert_eq!(
            summary.rows(),
            [
                vec![Value::from("customer_id"), Value::Int(1), Value::Float(25.0)],
                vec![Value::from("price"), Value::Int(3), Value::Float(75.0)],
            ]
        );
    }

    #[test]
    fn test_missing_summary_of_empty_table_is_zero() {
        let table = Table::new(["customer_id", "price"]);
        let summary = missing_summary(&table);

        assert_eq!(summary.num_rows(), 2);
        for percent in column_values(&summary, "percent") {
            let percent = percent.as_f64().unwrap();
            assert!(!percent.is_nan());
            assert_eq!(percent, 0.0);
        }
    }

    #[test]
    fn test_validity_share() {
        let rows = (0..10)
            .map(|i| {
                let reason = if i < 3 { Value::from("bad price") } else { Value::Null };
                vec![Value::from(format!("P{}", i)), reason]
            })
            .collect();
        let table = Table::from_rows(["product_id", "validation_reason"], rows);

        let classified = classify_validity(&table, "validation_reason").unwrap();
        assert_eq!(classified.columns().last().map(String::as_str), Some(VALIDITY_COLUMN));

        let share = frequency(&classified, VALIDITY_COLUMN, true).unwrap();
        assert_eq!(
            share.rows(),
            [
                vec![Value::Bool(true), Value::Float(0.7)],
                vec![Value::Bool(false), Value::Float(0.3)],
            ]
        );
    }

    #[test]
    fn test_classify_validity_missing_column() {
        assert_eq!(
            classify_validity(&orders(), "validation_reason"),
            Err(AggregateError::ColumnNotFound("validation_reason".to_string()))
        );
    }

    #[test]
    fn test_pair_count_only_observed_pairs() {
        let table = Table::from_rows(
            ["carrier", "status"],
            vec![
                vec![Value::from("UPS"), Value::from("delivered")],
                vec![Value::from("DHL"), Value::from("late")],
                vec![Value::from("UPS"), Value::from("delivered")],
            ],
        );

        let counts = group_by_pair_count(&table, "carrier", "status").unwrap();
        assert_eq!(
            counts.rows(),
            [
                vec![Value::from("DHL"), Value::from("late"), Value::Int(1)],
                vec![Value::from("UPS"), Value::from("delivered"), Value::Int(2)],
            ]
        );
    }

    #[test]
    fn test_derive_product() {
        let table = Table::from_rows(
            ["quantity", "price"],
            vec![
                vec![Value::from(2), Value::from(3)],
                vec![Value::from(2), Value::from(1.25)],
                vec![Value::Null, Value::from(4)],
            ],
        );

        let spend = derive_product(&table, "quantity", "price", "spend").unwrap();
        assert_eq!(
            column_values(&spend, "spend"),
            vec![Value::Int(6), Value::Float(2.5), Value::Null]
        );

        let bad = Table::from_rows(["quantity", "price"], vec![vec![Value::from(1), Value::from("x")]]);
        assert!(matches!(
            derive_product(&bad, "quantity", "price", "spend"),
            Err(AggregateError::TypeMismatch { column, .. }) if column == "price"
        ));
    }

    #[test]
    fn test_coerce_dates_then_drop_nulls() {
        let table = Table::from_rows(
            ["date", "refund_amount"],
            vec![
                vec![Value::from("2024-01-02"), Value::from(5)],
                vec![Value::from("not a date"), Value::from(7)],
                vec![Value::from("2024-01-01 08:00:00"), Value::from(1)],
            ],
        );

        let dated = coerce_dates(&table, "date").unwrap();
        let cleaned = drop_nulls(&dated, &["date"]).unwrap();
        assert_eq!(cleaned.num_rows(), 2);

        let returns = group_sum(&cleaned, &["date"], "refund_amount").unwrap();
        assert_eq!(returns.rows()[0][1], Value::Int(1));
        assert_eq!(returns.rows()[1][1], Value::Int(5));
    }

    #[test]
    fn test_sort_by_descending() {
        let summary = Table::from_rows(
            ["column", "missing"],
            vec![
                vec![Value::from("a"), Value::from(1)],
                vec![Value::from("b"), Value::from(4)],
            ],
        );
        let sorted = sort_by(&summary, "missing", true).unwrap();
        assert_eq!(sorted.value(0, "column"), Some(&Value::from("b")));
    }

    #[test]
    fn test_quality_metrics() {
        let table = Table::from_rows(
            ["quantity", "price"],
            vec![
                vec![Value::from(-1), Value::Null],
                vec![Value::from(2), Value::from(-0.5)],
            ],
        );

        let metrics = quality_metrics(&table);
        assert_eq!(
            column_values(&metrics, "value"),
            vec![Value::Int(2), Value::Int(1), Value::Int(2)]
        );
    }
}

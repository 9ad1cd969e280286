//! Data-cleaning pre-pass applied before or between enrichment stages.
use std::collections::HashMap;

use serde_json::Value;

use crate::dates;
use crate::table::EventTable;

/// Add every listed column the table lacks, filled with zeros.
pub fn fill_missing_fields<S: AsRef<str>>(mut table: EventTable, columns: &[S]) -> EventTable {
    for column in columns {
        let column = column.as_ref();
        if !table.has_column(column) {
            let zeros = vec![Value::from(0); table.len()];
            table.set_column(column, zeros);
        }
    }
    table
}

/// Coerce the listed columns to RFC 3339 strings; cells that do not parse become null.
pub fn format_dates<S: AsRef<str>>(mut table: EventTable, columns: &[S]) -> EventTable {
    for column in columns {
        let column = column.as_ref();
        let Some(values) = table.column(column) else {
            continue;
        };
        let formatted = values
            .iter()
            .map(|v| match v {
                Value::String(s) => dates::normalize(s).map_or(Value::Null, Value::String),
                _ => Value::Null,
            })
            .collect();
        table.set_column(column, formatted);
    }
    table
}

/// Rename columns per `mapping` (old name to new name); absent old names are skipped.
pub fn update_field_names(mut table: EventTable, mapping: &HashMap<String, String>) -> EventTable {
    for (from, to) in mapping {
        table.rename_column(from, to);
    }
    table
}

pub fn remove_columns<S: AsRef<str>>(mut table: EventTable, columns: &[S]) -> EventTable {
    for column in columns {
        table.drop_column(column.as_ref());
    }
    table
}

/// Replace every null cell in the table with `value`.
pub fn fill_nulls(mut table: EventTable, value: &Value) -> EventTable {
    let columns: Vec<String> = table.column_names().into_iter().map(String::from).collect();
    table.fill_nulls_in(&columns, value);
    table
}

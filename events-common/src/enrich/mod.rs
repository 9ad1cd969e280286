//! Column enrichers.
//!
//! Every enricher declares the columns it reads. When the table is empty or lacks any of
//! them the table is handed back untouched, so chains compose in any order.
use serde_json::Value;

use crate::table::EventTable;

mod email;
mod files;
mod flags;
mod gender;
mod joins;
mod rows;
mod stats;
mod utf8;

pub use email::{parse_address, SplitEmail, SplitEmailDomain};
pub use files::{FilePath, FileType};
pub use flags::{EmailFlag, MessageLogFlag};
pub use gender::{Gender, GenderGuess, GenderLookup, GenderLookupError};
pub use joins::{read_csv, Projects, Uuid, UuidLoadError, UuidOptions};
pub use rows::{PairProgramming, SplitLists};
pub use stats::{MaxMin, Onion, TimeDifference};
pub use utf8::ToUtf8;

pub trait Enricher {
    /// Columns that must all be present for the enricher to run.
    fn required_columns(&self) -> Vec<&str>;

    /// Transform a table known to hold every required column and at least one row.
    fn apply(&self, table: EventTable) -> EventTable;

    fn enrich(&self, table: EventTable) -> EventTable {
        if !applies_to(&table, &self.required_columns()) {
            return table;
        }
        self.apply(table)
    }
}

pub(crate) fn applies_to<S: AsRef<str>>(table: &EventTable, required: &[S]) -> bool {
    !table.is_empty() && table.has_columns(required)
}

/// Map one column cell by cell into a new column.
pub(crate) fn derive_column<F>(table: &mut EventTable, source: &str, target: &str, f: F)
where
    F: Fn(&Value) -> Value,
{
    if let Some(values) = table.column(source) {
        let derived = values.iter().map(f).collect();
        table.set_column(target, derived);
    }
}

/// Numeric view of a cell, accepting numeric strings.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

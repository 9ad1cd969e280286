use serde_json::Value;

use super::{derive_column, Enricher};
use crate::table::EventTable;

/// Left behind by lossy decoding of bytes that were not valid UTF-8.
const REPLACEMENT: char = char::REPLACEMENT_CHARACTER;

/// Makes text columns safe to index.
///
/// Store payloads are decoded lossily, so invalid byte sequences surface as U+FFFD. Those
/// characters are replaced with `?`, lists and non-string cells become empty strings.
#[derive(Debug, Clone)]
pub struct ToUtf8 {
    columns: Vec<String>,
}

impl ToUtf8 {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl Enricher for ToUtf8 {
    fn required_columns(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    fn apply(&self, mut table: EventTable) -> EventTable {
        for column in &self.columns {
            derive_column(&mut table, column, column, sanitize);
        }
        table
    }
}

fn needs_repair(text: &str) -> bool {
    text.contains(REPLACEMENT)
}

fn repair(text: &str) -> Value {
    Value::from(text.replace(REPLACEMENT, "?"))
}

fn sanitize(value: &Value) -> Value {
    match value {
        Value::Array(items) if items.len() == 1 => match items[0].as_str() {
            Some(text) if needs_repair(text) => repair(text),
            _ => Value::from(""),
        },
        Value::String(text) if needs_repair(text) => repair(text),
        Value::String(_) => value.clone(),
        _ => Value::from(""),
    }
}

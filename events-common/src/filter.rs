use serde_json::Value;
use thiserror::Error;

use crate::table::EventTable;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("Column {column} not in table columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
}

/// Drops every row where any of the given columns holds `value`.
///
/// Unlike the enrichers this is a validating step: filtering on a column the table does not
/// have is an error rather than a no-op.
#[derive(Debug, Clone)]
pub struct FilterRows {
    columns: Vec<String>,
    value: Value,
}

impl FilterRows {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, value: impl Into<Value>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            value: value.into(),
        }
    }

    pub fn filter(&self, mut table: EventTable) -> Result<EventTable, FilterError> {
        if let Some(missing) = self.columns.iter().find(|c| !table.has_column(c)) {
            return Err(FilterError::MissingColumn {
                column: missing.clone(),
                available: table.column_names().into_iter().map(String::from).collect(),
            });
        }

        for column in &self.columns {
            let keep: Vec<bool> = table
                .column(column)
                .map(|values| values.iter().map(|v| v != &self.value).collect())
                .unwrap_or_default();
            table.retain_rows(&keep);
        }

        Ok(table)
    }
}

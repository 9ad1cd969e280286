use std::collections::HashSet;
use std::io;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use super::Enricher;
use crate::table::EventTable;

/// Marker for a null field in identity exports.
const CSV_NULL: &str = "\\N";

const NOT_AVAILABLE: &str = "notavailable";

#[derive(Error, Debug)]
pub enum UuidLoadError {
    #[error("failed to read identities file: {0}")]
    Io(#[from] io::Error),
    #[error("malformed identities csv: {0}")]
    Csv(#[from] csv::Error),
}

/// Left join against a project mapping table sharing `column` with the data.
#[derive(Debug, Clone)]
pub struct Projects {
    column: String,
    projects: EventTable,
}

impl Projects {
    pub fn new(column: impl Into<String>, projects: EventTable) -> Self {
        Self {
            column: column.into(),
            projects,
        }
    }
}

impl Enricher for Projects {
    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn apply(&self, table: EventTable) -> EventTable {
        if !self.projects.has_column(&self.column) {
            return table;
        }
        table.left_join(&self.projects, &[self.column.as_str()])
    }
}

#[derive(Debug, Clone, Default)]
pub struct UuidOptions {
    /// Identity columns discarded before joining.
    pub drop_columns: Vec<String>,
    /// Columns identifying duplicates; empty means whole-row duplicates.
    pub drop_duplicates: Vec<String>,
}

/// Attaches canonical identities (typically a `uuid` column) by joining on `columns`.
#[derive(Debug, Clone)]
pub struct Uuid {
    identities: EventTable,
    columns: Vec<String>,
}

impl Uuid {
    pub fn new<S: Into<String>>(
        mut identities: EventTable,
        columns: impl IntoIterator<Item = S>,
        options: &UuidOptions,
    ) -> Self {
        for column in &options.drop_columns {
            identities.drop_column(column);
        }

        let key_columns: Vec<&str> = if options.drop_duplicates.is_empty() {
            identities.column_names()
        } else {
            options.drop_duplicates.iter().map(String::as_str).collect()
        };
        let mut seen = HashSet::new();
        let keep: Vec<bool> = (0..identities.len())
            .map(|row| seen.insert(identities.key(row, &key_columns)))
            .collect();
        identities.retain_rows(&keep);

        Self {
            identities,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_csv_path<S: Into<String>>(
        path: impl AsRef<Path>,
        columns: impl IntoIterator<Item = S>,
        options: &UuidOptions,
    ) -> Result<Self, UuidLoadError> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(read_csv(file)?, columns, options))
    }

    pub fn identities(&self) -> &EventTable {
        &self.identities
    }
}

impl Enricher for Uuid {
    fn required_columns(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    fn apply(&self, table: EventTable) -> EventTable {
        if !self.identities.has_columns(&self.columns) {
            return table;
        }

        let original: Vec<String> = table.column_names().into_iter().map(String::from).collect();
        let mut joined = table.left_join(&self.identities, &self.columns);

        let added: Vec<String> = joined
            .column_names()
            .into_iter()
            .filter(|name| !original.iter().any(|o| o == name))
            .map(String::from)
            .collect();
        joined.fill_nulls_in(&added, &Value::from(NOT_AVAILABLE));
        joined
    }
}

/// Read a headed CSV file into a table of strings; `\N` and empty fields are null.
pub fn read_csv<R: io::Read>(reader: R) -> Result<EventTable, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (index, column) in columns.iter_mut().enumerate() {
            let value = match record.get(index) {
                None | Some("") | Some(CSV_NULL) => Value::Null,
                Some(field) => Value::from(field),
            };
            column.push(value);
        }
    }

    let mut table = EventTable::new();
    for (name, values) in headers.into_iter().zip(columns) {
        table.set_column(name, values);
    }
    Ok(table)
}

//! Column-major table of JSON cells shared by the eventizers, filters and enrichers.
use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TableError {
    #[error("column {name} has {found} values but the table has {expected} rows")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    values: Vec<Value>,
}

/// An ordered, rectangular set of event rows.
///
/// Columns keep their insertion order: new columns are appended at the end and assigning an
/// existing column replaces its values in place. Missing cells are `Value::Null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventTable {
    columns: Vec<Column>,
    rows: usize,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from named columns, all of which must have the same length.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, values) in columns {
            let name = name.into();
            if !table.columns.is_empty() && values.len() != table.rows {
                return Err(TableError::LengthMismatch {
                    name,
                    expected: table.rows,
                    found: values.len(),
                });
            }
            table.set_column(name, values);
        }
        Ok(table)
    }

    /// Build a table with the given column order out of JSON objects. Keys not listed in
    /// `columns` are ignored, listed keys absent from a record become null.
    pub fn from_records(columns: &[&str], records: Vec<Map<String, Value>>) -> Self {
        let mut values: Vec<Vec<Value>> = columns
            .iter()
            .map(|_| Vec::with_capacity(records.len()))
            .collect();
        let rows = records.len();

        for mut record in records {
            for (column, name) in values.iter_mut().zip(columns) {
                column.push(record.remove(*name).unwrap_or(Value::Null));
            }
        }

        Self {
            columns: columns
                .iter()
                .zip(values)
                .map(|(name, values)| Column {
                    name: name.to_string(),
                    values,
                })
                .collect(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn has_columns<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.iter().all(|name| self.has_column(name.as_ref()))
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.position(name)
            .map(|index| self.columns[index].values.as_slice())
    }

    /// Assign a column, replacing it in place when it already exists.
    ///
    /// # Panics
    ///
    /// When the table already has columns and `values` does not match its row count.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<Value>) {
        let name = name.into();
        if self.columns.is_empty() {
            self.rows = values.len();
        }
        assert_eq!(
            values.len(),
            self.rows,
            "column {name} does not match the table length"
        );

        match self.position(&name) {
            Some(index) => self.columns[index].values = values,
            None => self.columns.push(Column { name, values }),
        }
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Vec<Value>> {
        let index = self.position(name)?;
        Some(self.columns.remove(index).values)
    }

    /// Rename `from` to `to`, returning whether a column was renamed. An existing column
    /// called `to` is replaced.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if !self.has_column(from) {
            return false;
        }
        if from != to {
            if let Some(existing) = self.position(to) {
                self.columns.remove(existing);
            }
        }
        if let Some(index) = self.position(from) {
            self.columns[index].name = to.to_string();
        }
        true
    }

    /// The row at `index` as a JSON object, keys in column order.
    pub fn row(&self, index: usize) -> Option<Map<String, Value>> {
        if index >= self.rows {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|c| (c.name.clone(), c.values[index].clone()))
                .collect(),
        )
    }

    /// Keep only the rows whose entry in `keep` is true.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column
                .values
                .retain(|_| flags.next().copied().unwrap_or(false));
        }
        self.rows = keep.iter().take(self.rows).filter(|k| **k).count();
    }

    /// A new table made of the rows at `indices`, in that order. Indices may repeat.
    pub fn take_rows(&self, indices: &[usize]) -> EventTable {
        EventTable {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: indices.iter().map(|&i| c.values[i].clone()).collect(),
                })
                .collect(),
            rows: indices.len(),
        }
    }

    /// Append the rows of `other` after the rows of this table. Columns only present on one
    /// side are filled with nulls on the other; new columns go after the existing ones.
    pub fn append(&mut self, other: EventTable) {
        let existing = self.rows;
        let incoming = other.rows;

        let mut other_columns: Vec<Option<Column>> = other.columns.into_iter().map(Some).collect();
        for column in &mut self.columns {
            let slot = other_columns
                .iter_mut()
                .find(|c| c.as_ref().is_some_and(|c| c.name == column.name));
            match slot.and_then(Option::take) {
                Some(other) => column.values.extend(other.values),
                None => column
                    .values
                    .extend(std::iter::repeat(Value::Null).take(incoming)),
            }
        }

        for mut column in other_columns.into_iter().flatten() {
            let mut values = vec![Value::Null; existing];
            values.append(&mut column.values);
            self.columns.push(Column {
                name: column.name,
                values,
            });
        }

        self.rows = existing + incoming;
    }

    /// Left join `right` on the `on` columns, both sides must have them.
    ///
    /// Every left row is kept; it is repeated once per matching right row and gets nulls in
    /// the right-hand columns when nothing matches. Non-key columns present on both sides
    /// are suffixed with `_x` (left) and `_y` (right).
    pub fn left_join<S: AsRef<str>>(&self, right: &EventTable, on: &[S]) -> EventTable {
        let on: Vec<&str> = on.iter().map(AsRef::as_ref).collect();

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for row in 0..right.rows {
            index.entry(right.key(row, &on)).or_default().push(row);
        }

        let mut left_rows = Vec::with_capacity(self.rows);
        let mut right_rows = Vec::with_capacity(self.rows);
        for row in 0..self.rows {
            match index.get(&self.key(row, &on)) {
                Some(matches) => {
                    for &m in matches {
                        left_rows.push(row);
                        right_rows.push(Some(m));
                    }
                }
                None => {
                    left_rows.push(row);
                    right_rows.push(None);
                }
            }
        }

        let mut joined = self.take_rows(&left_rows);

        for column in right.columns.iter().filter(|c| !on.contains(&c.name.as_str())) {
            let mut name = column.name.clone();
            if joined.has_column(&name) {
                joined.rename_column(&column.name, &format!("{}_x", column.name));
                name = format!("{}_y", column.name);
            }
            let values = right_rows
                .iter()
                .map(|r| r.map_or(Value::Null, |r| column.values[r].clone()))
                .collect();
            joined.columns.push(Column { name, values });
        }

        joined
    }

    /// Replace every null cell of the listed columns with `value`.
    pub fn fill_nulls_in<S: AsRef<str>>(&mut self, columns: &[S], value: &Value) {
        for column in &mut self.columns {
            if columns.iter().any(|c| c.as_ref() == column.name) {
                for cell in column.values.iter_mut().filter(|v| v.is_null()) {
                    *cell = value.clone();
                }
            }
        }
    }

    /// All rows as JSON objects, keys in column order.
    pub fn to_documents(&self) -> Vec<Map<String, Value>> {
        (0..self.rows).filter_map(|row| self.row(row)).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Stable string key for the given columns of a row, used for joins and grouping.
    pub(crate) fn key(&self, row: usize, columns: &[&str]) -> String {
        columns
            .iter()
            .map(|name| self.column(name).map_or(Value::Null, |c| c[row].clone()))
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }
}

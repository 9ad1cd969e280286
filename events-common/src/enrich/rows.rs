use serde_json::Value;

use super::Enricher;
use crate::table::EventTable;

/// Fans rows out over list-valued columns.
///
/// A row whose first listed column holds a list of N elements is replaced by N rows, the
/// i-th one taking the i-th element of every listed column. The list-holding row itself is
/// removed, so the output never carries both a row and its expansions. Rows holding an
/// empty list are dropped, rows holding a scalar are kept as they are. Expanded rows come
/// after the kept ones.
#[derive(Debug, Clone)]
pub struct SplitLists {
    columns: Vec<String>,
}

impl SplitLists {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl Enricher for SplitLists {
    fn required_columns(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    fn apply(&self, mut table: EventTable) -> EventTable {
        let Some(first) = self.columns.first().and_then(|c| table.column(c)) else {
            return table;
        };

        let mut keep = Vec::with_capacity(table.len());
        let mut sources = Vec::new();
        let mut positions = Vec::new();
        for (row, cell) in first.iter().enumerate() {
            match cell {
                Value::Array(items) => {
                    keep.push(false);
                    for position in 0..items.len() {
                        sources.push(row);
                        positions.push(position);
                    }
                }
                _ => keep.push(true),
            }
        }

        let mut expanded = table.take_rows(&sources);
        for column in &self.columns {
            let Some(lists) = table.column(column) else {
                continue;
            };
            let values = sources
                .iter()
                .zip(&positions)
                .map(|(&row, &position)| match &lists[row] {
                    Value::Array(items) => items.get(position).cloned().unwrap_or(Value::Null),
                    _ => Value::Null,
                })
                .collect();
            expanded.set_column(column.as_str(), values);
        }

        table.retain_rows(&keep);
        table.append(expanded);
        table
    }
}

/// Credits both people of an author/committer pair.
///
/// Every row where the two columns differ is duplicated, the duplicate taking the second
/// column's value in the first column. Duplicates are appended after the original rows.
#[derive(Debug, Clone)]
pub struct PairProgramming {
    column1: String,
    column2: String,
}

impl PairProgramming {
    pub fn new(column1: impl Into<String>, column2: impl Into<String>) -> Self {
        Self {
            column1: column1.into(),
            column2: column2.into(),
        }
    }
}

impl Enricher for PairProgramming {
    fn required_columns(&self) -> Vec<&str> {
        vec![self.column1.as_str(), self.column2.as_str()]
    }

    fn apply(&self, mut table: EventTable) -> EventTable {
        let (Some(first), Some(second)) = (table.column(&self.column1), table.column(&self.column2))
        else {
            return table;
        };

        let differing: Vec<usize> = first
            .iter()
            .zip(second)
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(row, _)| row)
            .collect();
        let replacement: Vec<Value> = differing.iter().map(|&row| second[row].clone()).collect();

        let mut duplicates = table.take_rows(&differing);
        duplicates.set_column(self.column1.as_str(), replacement);

        table.append(duplicates);
        table
    }
}

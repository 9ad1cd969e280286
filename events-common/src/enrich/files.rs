use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{derive_column, Enricher};
use crate::table::EventTable;

/// Suffixes classified as source code.
const CODE_EXTENSIONS: &[&str] = &[
    ".bazel", ".bazelrc", ".bzl", ".c", ".cc", ".cp", ".cpp", ".cxx", ".c++", ".go", ".h", ".js",
    ".mjs", ".java", ".py", ".rs", ".sh", ".tf", ".ts",
];

static REPEATED_SLASHES: Lazy<Regex> = Lazy::new(|| Regex::new("/+").expect("valid regex"));

/// Adds `filetype`: `Code` or `Other`.
#[derive(Debug, Clone)]
pub struct FileType {
    column: String,
}

impl FileType {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Enricher for FileType {
    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn apply(&self, mut table: EventTable) -> EventTable {
        derive_column(&mut table, &self.column, "filetype", |value| {
            let is_code = value
                .as_str()
                .is_some_and(|path| CODE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)));
            Value::from(if is_code { "Code" } else { "Other" })
        });
        table
    }
}

/// Splits a path column into `file_name`, `file_ext`, `file_dir_name` and `file_path_list`.
#[derive(Debug, Clone)]
pub struct FilePath {
    column: String,
}

impl FilePath {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Enricher for FilePath {
    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn apply(&self, mut table: EventTable) -> EventTable {
        let column = self.column.as_str();
        derive_column(&mut table, column, "file_name", |v| file_name(path(v)).into());
        derive_column(&mut table, column, "file_ext", |v| {
            file_ext(file_name(path(v))).into()
        });
        derive_column(&mut table, column, "file_dir_name", |v| {
            dir_name(path(v)).into()
        });
        derive_column(&mut table, column, "file_path_list", |v| {
            Value::from(path_list(path(v)))
        });
        table
    }
}

fn path(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn file_ext(name: &str) -> &str {
    name.rfind('.').map_or("", |dot| &name[dot + 1..])
}

fn dir_name(path: &str) -> String {
    let mut collapsed = REPEATED_SLASHES.replace_all(path, "/").into_owned();
    if !collapsed.starts_with('/') {
        collapsed.insert(0, '/');
    }
    let last = collapsed.rfind('/').unwrap_or(0);
    collapsed.truncate(last + 1);
    collapsed
}

fn path_list(path: &str) -> Vec<String> {
    REPEATED_SLASHES
        .replace_all(path, "/")
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect()
}

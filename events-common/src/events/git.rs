use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{date_cell, email_domain, row, IdentityResolver, Row, SourceData};

const COMMIT_COLUMNS: &[&str] = &[
    "id",
    "eventtype",
    "date",
    "owner",
    "committer",
    "committer_date",
    "repository",
    "message",
    "hash",
    "git_author_domain",
];
const COMMIT_TOTAL_COLUMNS: &[&str] = &["num_files", "num_added_lines", "num_removed_lines"];
const FILE_COLUMNS: &[&str] = &["files", "fileaction", "filepath", "addedlines", "removedlines"];

const EVENT_COMMIT: &str = "COMMIT";
const EVENT_FILE: &str = "FILE_";
const NO_VALUE: &str = "-";

#[derive(Debug, Deserialize)]
pub(super) struct Commit {
    #[serde(rename = "commit")]
    hash: String,
    #[serde(rename = "Author")]
    author: String,
    #[serde(rename = "AuthorDate")]
    author_date: String,
    #[serde(rename = "Commit")]
    committer: String,
    #[serde(rename = "CommitDate")]
    commit_date: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    files: Option<Vec<FileEntry>>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    action: Option<String>,
    file: Option<String>,
    added: Option<Value>,
    removed: Option<Value>,
}

impl Commit {
    fn commit_row(&self, origin: &str, resolver: Option<&dyn IdentityResolver>) -> Row {
        let domain = match resolver {
            Some(resolver) => resolver.identity_domain(&self.author),
            None => email_domain(&self.author),
        };

        row([
            ("id", Value::from(self.hash.as_str())),
            ("eventtype", Value::from(EVENT_COMMIT)),
            ("date", date_cell(&self.author_date)),
            ("owner", Value::from(self.author.as_str())),
            ("committer", Value::from(self.committer.as_str())),
            ("committer_date", date_cell(&self.commit_date)),
            ("repository", Value::from(origin)),
            ("message", Value::from(self.message.as_deref().unwrap_or(""))),
            ("hash", Value::from(self.hash.as_str())),
            ("git_author_domain", Value::from(domain)),
        ])
    }
}

impl SourceData for Commit {
    const MAX_LEVEL: u32 = 2;

    fn columns(level: u32) -> Vec<&'static str> {
        let extra = if level == 1 {
            COMMIT_TOTAL_COLUMNS
        } else {
            FILE_COLUMNS
        };
        COMMIT_COLUMNS.iter().chain(extra).copied().collect()
    }

    fn author(&self) -> Option<&str> {
        Some(&self.author)
    }

    fn creation_date(&self) -> Value {
        date_cell(&self.author_date)
    }

    fn events(
        &self,
        origin: &str,
        level: u32,
        resolver: Option<&dyn IdentityResolver>,
    ) -> Vec<Row> {
        let files = self.files.as_deref();

        if level == 1 {
            let files = files.unwrap_or_default();
            let added: i64 = files.iter().map(|f| line_count(f.added.as_ref())).sum();
            let removed: i64 = files.iter().map(|f| line_count(f.removed.as_ref())).sum();

            let mut commit = self.commit_row(origin, resolver);
            commit.insert("num_files".to_string(), Value::from(files.len()));
            commit.insert("num_added_lines".to_string(), Value::from(added));
            commit.insert("num_removed_lines".to_string(), Value::from(removed));
            return vec![commit];
        }

        let Some(files) = files else {
            info!(commit = %self.hash, "merge found, no file events");
            return Vec::new();
        };
        let with_action = files.iter().filter(|f| f.action.is_some()).count();

        files
            .iter()
            .map(|file| {
                let mut event = self.commit_row(origin, resolver);
                let action = file
                    .action
                    .as_ref()
                    .map_or_else(|| NO_VALUE.to_string(), |a| format!("{EVENT_FILE}{a}"));
                event.extend(row([
                    ("files", Value::from(with_action)),
                    ("fileaction", Value::from(action)),
                    ("filepath", Value::from(file.file.as_deref().unwrap_or(NO_VALUE))),
                    ("addedlines", Value::from(line_count(file.added.as_ref()))),
                    ("removedlines", Value::from(line_count(file.removed.as_ref()))),
                ]));
                event
            })
            .collect()
    }
}

/// Line counts come as numeric strings; `-` marks binary files.
fn line_count(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

use std::collections::HashMap;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::applies_to;
use crate::table::EventTable;

const NO_NAME: &str = "noname";
const UNKNOWN: &str = "Unknown";
const NOT_KNOWN: &str = "NotKnown";
const DEFAULT_CACHE_CAPACITY: u64 = 100_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenderGuess {
    pub gender: Option<String>,
    pub probability: Option<f64>,
    pub count: Option<u64>,
}

#[derive(Error, Debug)]
pub enum GenderLookupError {
    #[error("gender lookup request failed: {0}")]
    Request(String),
    #[error("gender lookup rate limited")]
    RateLimited,
    #[error("invalid gender lookup response: {0}")]
    InvalidResponse(String),
}

/// Name to gender inference service.
#[async_trait]
pub trait GenderLookup: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<GenderGuess, GenderLookupError>;
}

/// Adds `gender_analyzed_name`, `gender_probability`, `gender` and `gender_count` for the
/// first token of a name column.
///
/// Results are memoized per instance, so one `Gender` can be reused across batches and
/// columns. A failed lookup leaves the default values for that name.
pub struct Gender {
    lookup: Arc<dyn GenderLookup>,
    cache: Cache<String, GenderGuess>,
}

impl Gender {
    pub fn new(lookup: Arc<dyn GenderLookup>) -> Self {
        Self::with_capacity(lookup, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(lookup: Arc<dyn GenderLookup>, capacity: u64) -> Self {
        Self {
            lookup,
            cache: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Pre-load the memo cache from `id<TAB>name<TAB>gender` lines. Returns the number of
    /// names loaded; short lines are skipped.
    pub fn seed<R: BufRead>(&self, reader: R) -> io::Result<usize> {
        let mut loaded = 0;
        for line in reader.lines() {
            let line = line?;
            let fields: Vec<&str> = line.split('\t').collect();
            let (Some(name), Some(gender)) = (fields.get(1), fields.get(2)) else {
                continue;
            };
            self.cache.insert(
                name.trim().to_string(),
                GenderGuess {
                    gender: Some(gender.trim().to_string()),
                    ..Default::default()
                },
            );
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn seed_from_file(&self, path: impl AsRef<Path>) -> io::Result<usize> {
        let file = std::fs::File::open(path)?;
        self.seed(io::BufReader::new(file))
    }

    pub async fn enrich(&self, mut table: EventTable, column: &str) -> EventTable {
        if !applies_to(&table, &[column]) {
            return table;
        }
        let Some(cells) = table.column(column) else {
            return table;
        };

        let names: Vec<String> = cells.iter().map(analyzed_name).collect();
        let mut guesses: HashMap<&str, GenderGuess> = HashMap::new();
        for name in &names {
            if name == NO_NAME || guesses.contains_key(name.as_str()) {
                continue;
            }
            if let Some(guess) = self.guess(name).await {
                guesses.insert(name, guess);
            }
        }

        let mut probability = Vec::with_capacity(names.len());
        let mut gender = Vec::with_capacity(names.len());
        let mut count = Vec::with_capacity(names.len());
        for name in &names {
            match guesses.get(name.as_str()) {
                Some(guess) => {
                    probability.push(Value::from(guess.probability.unwrap_or(0.0)));
                    gender.push(Value::from(guess.gender.as_deref().unwrap_or(NOT_KNOWN)));
                    count.push(Value::from(guess.count.unwrap_or(0)));
                }
                None => {
                    probability.push(Value::from(0));
                    gender.push(Value::from(UNKNOWN));
                    count.push(Value::from(0));
                }
            }
        }

        let analyzed = names.iter().map(|n| Value::from(n.as_str())).collect();
        table.set_column("gender_analyzed_name", analyzed);
        table.set_column("gender_probability", probability);
        table.set_column("gender", gender);
        table.set_column("gender_count", count);
        table
    }

    async fn guess(&self, name: &str) -> Option<GenderGuess> {
        if let Some(cached) = self.cache.get(name) {
            return Some(cached);
        }
        match self.lookup.lookup(name).await {
            Ok(guess) => {
                debug!(name, gender = ?guess.gender, "gender lookup");
                self.cache.insert(name.to_string(), guess.clone());
                Some(guess)
            }
            Err(e) => {
                warn!(name, "gender lookup failed: {e}");
                None
            }
        }
    }
}

impl std::fmt::Debug for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gender")
            .field("cache", &"<moka cache>")
            .finish()
    }
}

fn analyzed_name(value: &Value) -> String {
    value
        .as_str()
        .and_then(|name| name.split(' ').next())
        .filter(|token| !token.is_empty())
        .unwrap_or(NO_NAME)
        .to_string()
}

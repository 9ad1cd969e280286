use std::collections::HashMap;
use std::path::Path;

use events_common::enrich::parse_address;
use events_common::events::{Identity, IdentityResolver};
use serde::Deserialize;
use tracing::info;

use crate::error::SetupError;

#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    #[serde(flatten)]
    identity: Identity,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Identity resolver over a JSON snapshot of unique identities.
///
/// The snapshot is an array of identities, each with the raw author strings it is known by
/// (`aliases`). Authors match an alias exactly, or else by email address.
#[derive(Debug, Default)]
pub struct SnapshotResolver {
    identities: Vec<Identity>,
    by_alias: HashMap<String, usize>,
    by_email: HashMap<String, usize>,
}

impl SnapshotResolver {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<SnapshotEntry> = serde_json::from_str(raw)?;

        let mut resolver = Self::default();
        for (index, entry) in entries.into_iter().enumerate() {
            for alias in &entry.aliases {
                resolver.by_alias.insert(alias.trim().to_string(), index);
                let (_, email) = parse_address(alias);
                if !email.is_empty() {
                    resolver.by_email.entry(email.to_lowercase()).or_insert(index);
                }
            }
            if let Some(email) = entry.identity.email.as_deref().filter(|e| !e.is_empty()) {
                resolver.by_email.insert(email.to_lowercase(), index);
            }
            resolver.identities.push(entry.identity);
        }
        Ok(resolver)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SetupError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let resolver = Self::from_json(&raw).map_err(|source| SetupError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!(identities = resolver.len(), "loaded identity snapshot");
        Ok(resolver)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    fn find(&self, author: &str) -> Option<&Identity> {
        let index = self.by_alias.get(author.trim()).copied().or_else(|| {
            let (_, email) = parse_address(author);
            self.by_email.get(&email.to_lowercase()).copied()
        })?;
        self.identities.get(index)
    }
}

impl IdentityResolver for SnapshotResolver {
    fn resolve(&self, author: &str) -> Identity {
        self.find(author).cloned().unwrap_or_default()
    }
}

use std::collections::HashMap;
use std::path::Path;

use events_common::events::{ProjectInfo, ProjectLookup};
use events_common::EventTable;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::SetupError;

/// Project membership of data source origins, read from a projects file shaped as
/// `{"<project>": {"<data source>": ["<origin>", ...]}}`.
///
/// Nested projects are dotted (`grimoire.perceval`); `project_1` is the top level one.
#[derive(Debug, Clone, Default)]
pub struct ProjectsMap {
    origins: Vec<(String, String)>,
    by_origin: HashMap<String, usize>,
}

impl ProjectsMap {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let projects: Map<String, Value> = serde_json::from_str(raw)?;

        let mut map = Self::default();
        for (project, sources) in &projects {
            let Some(sources) = sources.as_object() else {
                continue;
            };
            for origin in sources.values().filter_map(Value::as_array).flatten() {
                let Some(origin) = origin.as_str().and_then(|o| o.split_whitespace().next())
                else {
                    continue;
                };
                if !map.by_origin.contains_key(origin) {
                    map.by_origin.insert(origin.to_string(), map.origins.len());
                    map.origins.push((origin.to_string(), project.clone()));
                }
            }
        }
        Ok(map)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SetupError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let map = Self::from_json(&raw).map_err(|source| SetupError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!(origins = map.origins.len(), "loaded projects map");
        Ok(map)
    }

    /// Two column table (`column`, `project`) for joining events on their origin column.
    pub fn table(&self, column: &str) -> EventTable {
        let mut table = EventTable::new();
        table.set_column(
            column,
            self.origins.iter().map(|(o, _)| Value::from(o.as_str())).collect(),
        );
        table.set_column(
            "project",
            self.origins.iter().map(|(_, p)| Value::from(p.as_str())).collect(),
        );
        table
    }
}

impl ProjectLookup for ProjectsMap {
    fn project_for(&self, origin: &str) -> ProjectInfo {
        let Some(&index) = self.by_origin.get(origin) else {
            return ProjectInfo::default();
        };
        let project = &self.origins[index].1;
        ProjectInfo {
            project: Some(project.clone()),
            project_1: project.split('.').next().map(String::from),
        }
    }
}

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use events_common::enrich::{
    EmailFlag, Enricher, FilePath, FileType, Gender, MaxMin, MessageLogFlag, Onion,
    PairProgramming, Projects, SplitEmail, SplitEmailDomain, SplitLists, TimeDifference, ToUtf8,
    Uuid, UuidOptions,
};
use events_common::events::SourceKind;
use events_common::filter::FilterRows;
use events_common::{format, EventTable};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{PipelineError, SetupError};
use crate::projects::ProjectsMap;

/// Description of a single step of the enrichment chain, as found in a pipeline file:
/// `[{"type": "file_type", "column": "filepath"}, {"type": "fill_nulls", "value": "Unknown"}]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageConfig {
    FilterRows {
        columns: Vec<String>,
        value: Value,
    },
    FileType {
        column: String,
    },
    FilePath {
        column: String,
    },
    MessageLogFlag {
        column: String,
    },
    EmailFlag {
        column: String,
    },
    SplitEmail {
        column: String,
    },
    SplitEmailDomain {
        column: String,
    },
    ToUtf8 {
        columns: Vec<String>,
    },
    SplitLists {
        columns: Vec<String>,
    },
    MaxMin {
        columns: Vec<String>,
        groupby: String,
    },
    TimeDifference {
        column1: String,
        column2: String,
    },
    Onion {
        member_column: String,
        events_column: String,
    },
    PairProgramming {
        column1: String,
        column2: String,
    },
    Gender {
        column: String,
    },
    Projects {
        column: String,
    },
    Uuid {
        columns: Vec<String>,
        #[serde(default)]
        drop_columns: Vec<String>,
        #[serde(default)]
        drop_duplicates: Vec<String>,
    },
    FillNulls {
        value: Value,
    },
    RemoveColumns {
        columns: Vec<String>,
    },
    RenameColumns {
        mapping: HashMap<String, String>,
    },
    FormatDates {
        columns: Vec<String>,
    },
    FillMissingFields {
        columns: Vec<String>,
    },
}

impl StageConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StageConfig::FilterRows { .. } => "filter_rows",
            StageConfig::FileType { .. } => "file_type",
            StageConfig::FilePath { .. } => "file_path",
            StageConfig::MessageLogFlag { .. } => "message_log_flag",
            StageConfig::EmailFlag { .. } => "email_flag",
            StageConfig::SplitEmail { .. } => "split_email",
            StageConfig::SplitEmailDomain { .. } => "split_email_domain",
            StageConfig::ToUtf8 { .. } => "to_utf8",
            StageConfig::SplitLists { .. } => "split_lists",
            StageConfig::MaxMin { .. } => "max_min",
            StageConfig::TimeDifference { .. } => "time_difference",
            StageConfig::Onion { .. } => "onion",
            StageConfig::PairProgramming { .. } => "pair_programming",
            StageConfig::Gender { .. } => "gender",
            StageConfig::Projects { .. } => "projects",
            StageConfig::Uuid { .. } => "uuid",
            StageConfig::FillNulls { .. } => "fill_nulls",
            StageConfig::RemoveColumns { .. } => "remove_columns",
            StageConfig::RenameColumns { .. } => "rename_columns",
            StageConfig::FormatDates { .. } => "format_dates",
            StageConfig::FillMissingFields { .. } => "fill_missing_fields",
        }
    }
}

/// External collaborators some stages need. A stage whose collaborator is missing is left
/// out of the chain.
#[derive(Debug, Clone, Default)]
pub struct StageResources {
    pub gender: Option<Arc<Gender>>,
    pub projects: Option<Arc<ProjectsMap>>,
    pub uuids_file: Option<PathBuf>,
}

/// Chain run when no pipeline file is configured.
pub fn default_stages(
    kind: SourceKind,
    granularity: u32,
    resources: &StageResources,
) -> Vec<StageConfig> {
    let column = |name: &str| name.to_string();
    let owner_to_utf8 = || StageConfig::ToUtf8 {
        columns: vec![column("owner")],
    };

    let mut stages = match kind {
        SourceKind::Git if granularity >= 2 => vec![
            StageConfig::FilterRows {
                columns: vec![column("filepath")],
                value: Value::from("-"),
            },
            StageConfig::FileType {
                column: column("filepath"),
            },
            StageConfig::FilePath {
                column: column("filepath"),
            },
            owner_to_utf8(),
        ],
        SourceKind::Git => vec![
            StageConfig::MessageLogFlag {
                column: column("message"),
            },
            StageConfig::SplitEmail {
                column: column("owner"),
            },
            StageConfig::SplitEmailDomain {
                column: column("email"),
            },
            owner_to_utf8(),
        ],
        SourceKind::Gerrit => {
            let mut stages = Vec::new();
            if resources.gender.is_some() {
                stages.push(StageConfig::Gender {
                    column: column("owner"),
                });
            }
            stages
        }
        SourceKind::Bugzilla | SourceKind::BugzillaRest => vec![owner_to_utf8()],
        SourceKind::Email => vec![
            StageConfig::EmailFlag {
                column: column("body"),
            },
            StageConfig::SplitEmail {
                column: column("owner"),
            },
            StageConfig::SplitEmailDomain {
                column: column("email"),
            },
        ],
    };

    if resources.uuids_file.is_some() {
        let join_on = match kind {
            SourceKind::Git if granularity >= 2 => "owner",
            SourceKind::Git | SourceKind::Gerrit | SourceKind::Email => "email",
            SourceKind::Bugzilla | SourceKind::BugzillaRest => "owner",
        };
        stages.push(StageConfig::Uuid {
            columns: vec![column(join_on)],
            drop_columns: Vec::new(),
            drop_duplicates: Vec::new(),
        });
    }

    if kind == SourceKind::Gerrit {
        stages.push(StageConfig::FillNulls {
            value: Value::from("Unknown"),
        });
    }

    stages
}

/// Read stage descriptions from a JSON pipeline file.
pub fn read_stages(path: impl AsRef<Path>) -> Result<Vec<StageConfig>, SetupError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| SetupError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SetupError::Parse {
        path: path.display().to_string(),
        source,
    })
}

enum Stage {
    Enrich(Box<dyn Enricher + Send + Sync>),
    Filter(FilterRows),
    Gender { gender: Arc<Gender>, column: String },
    FillNulls(Value),
    RemoveColumns(Vec<String>),
    RenameColumns(HashMap<String, String>),
    FormatDates(Vec<String>),
    FillMissingFields(Vec<String>),
}

impl Stage {
    fn enricher(enricher: impl Enricher + Send + Sync + 'static) -> Self {
        Stage::Enrich(Box::new(enricher))
    }

    async fn run(&self, table: EventTable) -> Result<EventTable, PipelineError> {
        let table = match self {
            Stage::Enrich(enricher) => enricher.enrich(table),
            Stage::Filter(filter) => filter.filter(table)?,
            Stage::Gender { gender, column } => gender.enrich(table, column).await,
            Stage::FillNulls(value) => format::fill_nulls(table, value),
            Stage::RemoveColumns(columns) => format::remove_columns(table, columns),
            Stage::RenameColumns(mapping) => format::update_field_names(table, mapping),
            Stage::FormatDates(columns) => format::format_dates(table, columns),
            Stage::FillMissingFields(columns) => format::fill_missing_fields(table, columns),
        };
        Ok(table)
    }
}

/// Ordered enrichment stages applied to every eventized batch.
#[derive(Default)]
pub struct Chain {
    stages: Vec<(&'static str, Stage)>,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("stages", &self.names()).finish()
    }
}

impl Chain {
    pub fn build(configs: &[StageConfig], resources: &StageResources) -> Result<Self, SetupError> {
        let mut stages = Vec::with_capacity(configs.len());

        for config in configs {
            let stage = match config.clone() {
                StageConfig::FilterRows { columns, value } => {
                    Stage::Filter(FilterRows::new(columns, value))
                }
                StageConfig::FileType { column } => Stage::enricher(FileType::new(column)),
                StageConfig::FilePath { column } => Stage::enricher(FilePath::new(column)),
                StageConfig::MessageLogFlag { column } => {
                    Stage::enricher(MessageLogFlag::new(column))
                }
                StageConfig::EmailFlag { column } => Stage::enricher(EmailFlag::new(column)),
                StageConfig::SplitEmail { column } => Stage::enricher(SplitEmail::new(column)),
                StageConfig::SplitEmailDomain { column } => {
                    Stage::enricher(SplitEmailDomain::new(column))
                }
                StageConfig::ToUtf8 { columns } => Stage::enricher(ToUtf8::new(columns)),
                StageConfig::SplitLists { columns } => Stage::enricher(SplitLists::new(columns)),
                StageConfig::MaxMin { columns, groupby } => {
                    Stage::enricher(MaxMin::new(columns, groupby))
                }
                StageConfig::TimeDifference { column1, column2 } => {
                    Stage::enricher(TimeDifference::new(column1, column2))
                }
                StageConfig::Onion {
                    member_column,
                    events_column,
                } => Stage::enricher(Onion::new(member_column, events_column)),
                StageConfig::PairProgramming { column1, column2 } => {
                    Stage::enricher(PairProgramming::new(column1, column2))
                }
                StageConfig::Gender { column } => match &resources.gender {
                    Some(gender) => Stage::Gender {
                        gender: gender.clone(),
                        column,
                    },
                    None => {
                        warn!(stage = config.name(), "no gender lookup configured, skipping stage");
                        continue;
                    }
                },
                StageConfig::Projects { column } => match &resources.projects {
                    Some(projects) => {
                        let table = projects.table(&column);
                        Stage::enricher(Projects::new(column, table))
                    }
                    None => {
                        warn!(stage = config.name(), "no projects file configured, skipping stage");
                        continue;
                    }
                },
                StageConfig::Uuid {
                    columns,
                    drop_columns,
                    drop_duplicates,
                } => match &resources.uuids_file {
                    Some(path) => {
                        let options = UuidOptions {
                            drop_columns,
                            drop_duplicates,
                        };
                        Stage::enricher(Uuid::from_csv_path(path, columns, &options)?)
                    }
                    None => {
                        warn!(stage = config.name(), "no identities csv configured, skipping stage");
                        continue;
                    }
                },
                StageConfig::FillNulls { value } => Stage::FillNulls(value),
                StageConfig::RemoveColumns { columns } => Stage::RemoveColumns(columns),
                StageConfig::RenameColumns { mapping } => Stage::RenameColumns(mapping),
                StageConfig::FormatDates { columns } => Stage::FormatDates(columns),
                StageConfig::FillMissingFields { columns } => Stage::FillMissingFields(columns),
            };
            stages.push((config.name(), stage));
        }

        Ok(Self { stages })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(name, _)| *name).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub async fn apply(&self, mut table: EventTable) -> Result<EventTable, PipelineError> {
        for (name, stage) in &self.stages {
            table = stage.run(table).await?;
            debug!(stage = name, rows = table.len(), "applied stage");
        }
        Ok(table)
    }
}

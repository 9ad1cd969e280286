//! Eventizers split raw source records into fine-grained event rows.
//!
//! One record may yield several events: a commit becomes one `COMMIT` row at level 1 or
//! one row per touched file at level 2, a bug report one row per status change, and so on.
//! Levels above the highest one a source implements behave like that highest level.
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::dates;
use crate::table::EventTable;

mod bugzilla;
mod email;
mod gerrit;
mod git;
mod identity;

pub use identity::{email_domain, Identity, IdentityResolver, ProjectInfo, ProjectLookup};

const UNKNOWN: &str = "Unknown";

/// Columns prefixed to every row when the eventizer has an [`EventContext`].
pub const COMMON_COLUMNS: &[&str] = &[
    "metadata__timestamp",
    "metadata__updated_on",
    "metadata__enriched_on",
    "grimoire_creation_date",
    "project",
    "project_1",
    "perceval_uuid",
    "author_id",
    "author_org_name",
    "author_name",
    "author_uuid",
    "author_domain",
    "author_user_name",
    "author_bot",
];

pub(crate) type Row = Map<String, Value>;

#[derive(Error, Debug)]
pub enum EventizeError {
    #[error("granularity must be at least 1, got {0}")]
    InvalidGranularity(u32),
    #[error("record {index} is malformed: {source}")]
    MalformedRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown source kind: {0}")]
pub struct UnknownSourceKind(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Git,
    Bugzilla,
    BugzillaRest,
    Gerrit,
    Email,
}

impl SourceKind {
    /// Highest granularity level producing distinct events for this source.
    pub fn max_granularity(self) -> u32 {
        match self {
            SourceKind::Git | SourceKind::Gerrit => 2,
            SourceKind::Bugzilla | SourceKind::BugzillaRest | SourceKind::Email => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Git => "git",
            SourceKind::Bugzilla => "bugzilla",
            SourceKind::BugzillaRest => "bugzilla_rest",
            SourceKind::Gerrit => "gerrit",
            SourceKind::Email => "email",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = UnknownSourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "git" => Ok(SourceKind::Git),
            "bugzilla" => Ok(SourceKind::Bugzilla),
            "bugzilla_rest" | "bugzillarest" => Ok(SourceKind::BugzillaRest),
            "gerrit" => Ok(SourceKind::Gerrit),
            "email" | "mbox" => Ok(SourceKind::Email),
            _ => Err(UnknownSourceKind(s.to_string())),
        }
    }
}

/// Collaborators used to build the common fields of every row.
#[derive(Clone, Default)]
pub struct EventContext {
    pub resolver: Option<Arc<dyn IdentityResolver>>,
    pub projects: Option<Arc<dyn ProjectLookup>>,
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("resolver", &self.resolver.is_some())
            .field("projects", &self.projects.is_some())
            .finish()
    }
}

/// Envelope shared by every source record.
#[derive(Debug, Deserialize)]
struct Record<D> {
    data: D,
    origin: String,
    uuid: String,
    #[serde(rename = "metadata__timestamp")]
    timestamp: Value,
    #[serde(rename = "metadata__updated_on")]
    updated_on: Value,
}

/// Typed `data` payload of one source kind.
trait SourceData: DeserializeOwned {
    const MAX_LEVEL: u32;

    fn columns(level: u32) -> Vec<&'static str>;

    /// Raw author string the record's identity is resolved from.
    fn author(&self) -> Option<&str>;

    fn creation_date(&self) -> Value;

    fn events(
        &self,
        origin: &str,
        level: u32,
        resolver: Option<&dyn IdentityResolver>,
    ) -> Vec<Row>;
}

#[derive(Debug, Clone)]
pub struct Eventizer {
    kind: SourceKind,
    context: Option<EventContext>,
}

impl Eventizer {
    pub fn new(kind: SourceKind, context: Option<EventContext>) -> Self {
        Self { kind, context }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn eventize(&self, records: &[Value], granularity: u32) -> Result<EventTable, EventizeError> {
        if granularity == 0 {
            return Err(EventizeError::InvalidGranularity(granularity));
        }

        match self.kind {
            SourceKind::Git => self.eventize_as::<git::Commit>(records, granularity),
            SourceKind::Bugzilla => self.eventize_as::<bugzilla::Bug>(records, granularity),
            SourceKind::BugzillaRest => {
                self.eventize_as::<bugzilla::RestBug>(records, granularity)
            }
            SourceKind::Gerrit => self.eventize_as::<gerrit::Changeset>(records, granularity),
            SourceKind::Email => self.eventize_as::<email::Message>(records, granularity),
        }
    }

    fn eventize_as<D: SourceData>(
        &self,
        records: &[Value],
        granularity: u32,
    ) -> Result<EventTable, EventizeError> {
        let level = granularity.min(D::MAX_LEVEL);
        let enriched_on = dates::now();
        let resolver = self.context.as_ref().and_then(|c| c.resolver.as_deref());

        let mut rows = Vec::new();
        for (index, raw) in records.iter().enumerate() {
            let record = Record::<D>::deserialize(raw)
                .map_err(|source| EventizeError::MalformedRecord { index, source })?;
            let events = record.data.events(&record.origin, level, resolver);

            match &self.context {
                Some(context) => {
                    let common = context.common_fields(&record, &enriched_on);
                    rows.extend(events.into_iter().map(|event| {
                        let mut row = common.clone();
                        row.extend(event);
                        row
                    }));
                }
                None => rows.extend(events),
            }
        }

        let mut columns = Vec::new();
        if self.context.is_some() {
            columns.extend_from_slice(COMMON_COLUMNS);
        }
        columns.extend(D::columns(level));
        Ok(EventTable::from_records(&columns, rows))
    }
}

impl EventContext {
    fn common_fields<D: SourceData>(&self, record: &Record<D>, enriched_on: &str) -> Row {
        let identity = match (&self.resolver, record.data.author()) {
            (Some(resolver), Some(author)) => resolver.resolve(author),
            _ => Identity::default(),
        };
        let project = self
            .projects
            .as_ref()
            .map(|lookup| lookup.project_for(&record.origin))
            .unwrap_or_default();

        row([
            ("metadata__timestamp", record.timestamp.clone()),
            ("metadata__updated_on", record.updated_on.clone()),
            ("metadata__enriched_on", Value::from(enriched_on)),
            ("grimoire_creation_date", record.data.creation_date()),
            ("project", Value::from(project.project)),
            ("project_1", Value::from(project.project_1)),
            ("perceval_uuid", Value::from(record.uuid.as_str())),
            ("author_id", or_unknown(identity.id)),
            ("author_org_name", or_unknown(identity.org_name)),
            ("author_name", or_unknown(identity.name)),
            ("author_uuid", or_unknown(identity.uuid)),
            ("author_domain", or_unknown(identity.domain)),
            ("author_user_name", or_unknown(identity.user_name)),
            ("author_bot", Value::from(identity.bot.unwrap_or(false))),
        ])
    }
}

fn or_unknown(field: Option<String>) -> Value {
    Value::from(field.filter(|value| !value.is_empty()).as_deref().unwrap_or(UNKNOWN))
}

pub(crate) fn row<const N: usize>(cells: [(&str, Value); N]) -> Row {
    cells
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// RFC 3339 rendering of a source date, null when it cannot be parsed.
pub(crate) fn date_cell(text: &str) -> Value {
    dates::normalize(text).map_or(Value::Null, Value::from)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    pub(super) struct StaticResolver;

    impl IdentityResolver for StaticResolver {
        fn resolve(&self, author: &str) -> Identity {
            if !author.contains("Eduardo") {
                return Identity::default();
            }
            Identity {
                id: Some("e1".to_string()),
                uuid: Some("3f9c1a0b".to_string()),
                name: Some("Eduardo Morais".to_string()),
                domain: Some("zenwalk.org".to_string()),
                org_name: Some(String::new()),
                ..Default::default()
            }
        }
    }

    struct StaticProjects;

    impl ProjectLookup for StaticProjects {
        fn project_for(&self, origin: &str) -> ProjectInfo {
            if origin.ends_with("perceval.git") {
                ProjectInfo {
                    project: Some("grimoire".to_string()),
                    project_1: Some("grimoire".to_string()),
                }
            } else {
                ProjectInfo::default()
            }
        }
    }

    pub(super) fn full_context() -> EventContext {
        EventContext {
            resolver: Some(Arc::new(StaticResolver)),
            projects: Some(Arc::new(StaticProjects)),
        }
    }

    #[test]
    fn test_source_kind_parsing() {
        assert_eq!("git".parse::<SourceKind>(), Ok(SourceKind::Git));
        assert_eq!("BugzillaRest".parse::<SourceKind>(), Ok(SourceKind::BugzillaRest));
        assert_eq!("bugzilla_rest".parse::<SourceKind>(), Ok(SourceKind::BugzillaRest));
        assert_eq!(
            "svn".parse::<SourceKind>(),
            Err(UnknownSourceKind("svn".to_string()))
        );
        assert_eq!(SourceKind::Gerrit.to_string(), "gerrit");
    }

    #[test]
    fn test_granularity_zero_is_rejected() {
        let eventizer = Eventizer::new(SourceKind::Email, None);

        assert!(matches!(
            eventizer.eventize(&[], 0),
            Err(EventizeError::InvalidGranularity(0))
        ));
    }

    #[test]
    fn test_malformed_record_names_index() {
        let eventizer = Eventizer::new(SourceKind::Email, None);
        let records = vec![
            json!({
                "origin": "list",
                "uuid": "u1",
                "metadata__timestamp": "2017-01-01T00:00:00+00:00",
                "metadata__updated_on": "2017-01-01T00:00:00+00:00",
                "data": {"Message-ID": "<1@x>", "From": "a@x", "Subject": "hi"}
            }),
            json!({
                "origin": "list",
                "uuid": "u2",
                "metadata__timestamp": "2017-01-01T00:00:00+00:00",
                "metadata__updated_on": "2017-01-01T00:00:00+00:00",
                "data": {"Message-ID": "<2@x>", "Subject": "no sender"}
            }),
        ];

        let err = eventizer.eventize(&records, 1).unwrap_err();

        match err {
            EventizeError::MalformedRecord { index, source } => {
                assert_eq!(index, 1);
                assert!(source.to_string().contains("From"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_empty_batch_keeps_columns() {
        let eventizer = Eventizer::new(SourceKind::Bugzilla, Some(EventContext::default()));

        let table = eventizer.eventize(&[], 1).unwrap();

        assert!(table.is_empty());
        assert_eq!(table.width(), COMMON_COLUMNS.len() + 4);
    }
}

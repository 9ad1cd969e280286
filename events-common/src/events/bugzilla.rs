use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use super::{date_cell, row, IdentityResolver, Row, SourceData};

const ISSUE_COLUMNS: &[&str] = &["id", "eventtype", "date", "owner"];
const REST_ISSUE_COLUMNS: &[&str] = &["id", "eventtype", "date", "owner", "added", "removed"];

const EVENT_OPEN: &str = "ISSUE_OPEN";
const EVENT_PREFIX: &str = "ISSUE_";
const NO_VALUE: &str = "-";

/// A bug from the XML export, where every scalar is wrapped as `[{"__text__": ..}]`.
#[derive(Debug, Deserialize)]
pub(super) struct Bug {
    #[serde(deserialize_with = "first_text")]
    bug_id: String,
    #[serde(deserialize_with = "first_text")]
    creation_ts: String,
    #[serde(deserialize_with = "first_text")]
    reporter: String,
    #[serde(default)]
    activity: Vec<Activity>,
}

/// One row of the bug's activity table. Every change counts, not only `Status` ones.
#[derive(Debug, Deserialize)]
struct Activity {
    #[serde(rename = "Added")]
    added: Option<String>,
    #[serde(rename = "When")]
    when: Option<String>,
    #[serde(rename = "Who")]
    who: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextField {
    #[serde(rename = "__text__")]
    text: String,
}

fn first_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Vec::<TextField>::deserialize(deserializer)?
        .into_iter()
        .next()
        .map(|field| field.text)
        .ok_or_else(|| de::Error::invalid_length(0, &"at least one text element"))
}

impl SourceData for Bug {
    const MAX_LEVEL: u32 = 1;

    fn columns(_level: u32) -> Vec<&'static str> {
        ISSUE_COLUMNS.to_vec()
    }

    fn author(&self) -> Option<&str> {
        Some(&self.reporter)
    }

    fn creation_date(&self) -> Value {
        date_cell(&self.creation_ts)
    }

    fn events(
        &self,
        _origin: &str,
        _level: u32,
        _resolver: Option<&dyn IdentityResolver>,
    ) -> Vec<Row> {
        let open = row([
            ("id", Value::from(self.bug_id.as_str())),
            ("eventtype", Value::from(EVENT_OPEN)),
            ("date", date_cell(&self.creation_ts)),
            ("owner", Value::from(self.reporter.as_str())),
        ]);

        let changes = self
            .activity
            .iter()
            .filter_map(|change| {
                let (Some(added), Some(when), Some(who)) = (&change.added, &change.when, &change.who)
                else {
                    return None;
                };
                Some(row([
                    ("id", Value::from(self.bug_id.as_str())),
                    ("eventtype", Value::from(format!("{EVENT_PREFIX}{added}"))),
                    ("date", date_cell(when)),
                    ("owner", Value::from(who.as_str())),
                ]))
            });

        std::iter::once(open).chain(changes).collect()
    }
}

/// A bug from the REST API.
#[derive(Debug, Deserialize)]
pub(super) struct RestBug {
    id: Value,
    creation_time: String,
    creator_detail: CreatorDetail,
    #[serde(default)]
    history: Vec<HistoryStep>,
}

#[derive(Debug, Deserialize)]
struct CreatorDetail {
    real_name: String,
}

#[derive(Debug, Deserialize)]
struct HistoryStep {
    who: String,
    when: String,
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    field_name: String,
    #[serde(default)]
    added: Value,
    #[serde(default)]
    removed: Value,
}

impl SourceData for RestBug {
    const MAX_LEVEL: u32 = 1;

    fn columns(_level: u32) -> Vec<&'static str> {
        REST_ISSUE_COLUMNS.to_vec()
    }

    fn author(&self) -> Option<&str> {
        Some(&self.creator_detail.real_name)
    }

    fn creation_date(&self) -> Value {
        date_cell(&self.creation_time)
    }

    fn events(
        &self,
        _origin: &str,
        _level: u32,
        _resolver: Option<&dyn IdentityResolver>,
    ) -> Vec<Row> {
        let open = row([
            ("id", self.id.clone()),
            ("eventtype", Value::from(EVENT_OPEN)),
            ("date", date_cell(&self.creation_time)),
            ("owner", Value::from(self.creator_detail.real_name.as_str())),
            ("added", Value::from(NO_VALUE)),
            ("removed", Value::from(NO_VALUE)),
        ]);

        let changes = self.history.iter().flat_map(|step| {
            step.changes.iter().map(move |change| {
                row([
                    ("id", self.id.clone()),
                    (
                        "eventtype",
                        Value::from(format!("{EVENT_PREFIX}{}", change.field_name)),
                    ),
                    ("date", date_cell(&step.when)),
                    ("owner", Value::from(step.who.as_str())),
                    ("added", change.added.clone()),
                    ("removed", change.removed.clone()),
                ])
            })
        });

        std::iter::once(open).chain(changes).collect()
    }
}

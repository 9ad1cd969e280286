use serde::Deserialize;
use serde_json::Value;

use super::{row, IdentityResolver, Row, SourceData};
use crate::dates;

const CHANGESET_COLUMNS: &[&str] = &["id", "eventtype", "date", "owner", "email", "value", "repository"];

const EVENT_SENT: &str = "CHANGESET_SENT";
const EVENT_PREFIX: &str = "CHANGESET_";
const EVENT_PATCHSET_SENT: &str = "CHANGESET_PATCHSET_SENT";
const EVENT_APPROVAL: &str = "CHANGESET_PATCHSET_APPROVAL_";
const CODE_REVIEW: &str = "Code-Review";
const CLOSING_STATUSES: &[&str] = &["ABANDONED", "MERGED"];

const NOT_KNOWN: &str = "notknown";
const PATCHSET_NO_NAME: &str = "patchset_noname";
const APPROVAL_NO_NAME: &str = "approval_noname";
const EVENT_VALUE: i64 = -10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Changeset {
    number: Value,
    created_on: Value,
    project: String,
    owner: Person,
    status: String,
    #[serde(default)]
    last_updated: Option<Value>,
    #[serde(default)]
    patch_sets: Vec<PatchSet>,
}

#[derive(Debug, Default, Deserialize)]
struct Person {
    name: Option<String>,
    username: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatchSet {
    created_on: Value,
    #[serde(default)]
    author: Option<Person>,
    #[serde(default)]
    approvals: Vec<Approval>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Approval {
    #[serde(rename = "type")]
    kind: String,
    granted_on: Value,
    #[serde(default)]
    by: Option<Person>,
    #[serde(default)]
    value: Value,
}

impl Person {
    /// Owner and email cells: name, then username, then email. The email cell is only
    /// filled from the email fallback.
    fn owner_and_email(&self) -> (String, String) {
        if let Some(name) = &self.name {
            return (name.clone(), NOT_KNOWN.to_string());
        }
        if let Some(username) = &self.username {
            return (username.clone(), NOT_KNOWN.to_string());
        }
        match &self.email {
            Some(email) => (email.clone(), email.clone()),
            None => (NOT_KNOWN.to_string(), NOT_KNOWN.to_string()),
        }
    }

    fn display(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.email.as_deref())
    }
}

fn person_cells(person: Option<&Person>, placeholder: &str) -> (String, String) {
    person.map_or_else(
        || (placeholder.to_string(), placeholder.to_string()),
        Person::owner_and_email,
    )
}

fn epoch_cell(value: &Value) -> Value {
    dates::from_epoch(value).map_or(Value::Null, Value::from)
}

/// Approval scores are strings like `"-1"` or `"2"`.
fn approval_value(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

impl Changeset {
    fn event(&self, eventtype: String, date: Value, (owner, email): (String, String), value: i64) -> Row {
        row([
            ("id", self.number.clone()),
            ("eventtype", Value::from(eventtype)),
            ("date", date),
            ("owner", Value::from(owner)),
            ("email", Value::from(email)),
            ("value", Value::from(value)),
            ("repository", Value::from(self.project.as_str())),
        ])
    }
}

impl SourceData for Changeset {
    const MAX_LEVEL: u32 = 2;

    fn columns(_level: u32) -> Vec<&'static str> {
        CHANGESET_COLUMNS.to_vec()
    }

    fn author(&self) -> Option<&str> {
        self.owner.display()
    }

    fn creation_date(&self) -> Value {
        epoch_cell(&self.created_on)
    }

    fn events(
        &self,
        _origin: &str,
        level: u32,
        _resolver: Option<&dyn IdentityResolver>,
    ) -> Vec<Row> {
        let created = epoch_cell(&self.created_on);
        let mut events = vec![self.event(
            EVENT_SENT.to_string(),
            created.clone(),
            self.owner.owner_and_email(),
            EVENT_VALUE,
        )];

        if CLOSING_STATUSES.contains(&self.status.as_str()) {
            let closed = self
                .last_updated
                .as_ref()
                .map(epoch_cell)
                .filter(|date| !date.is_null())
                .unwrap_or_else(|| created.clone());
            events.push(self.event(
                format!("{EVENT_PREFIX}{}", self.status),
                closed,
                self.owner.owner_and_email(),
                EVENT_VALUE,
            ));
        }

        if level < 2 {
            return events;
        }

        for patchset in &self.patch_sets {
            events.push(self.event(
                EVENT_PATCHSET_SENT.to_string(),
                epoch_cell(&patchset.created_on),
                person_cells(patchset.author.as_ref(), PATCHSET_NO_NAME),
                EVENT_VALUE,
            ));

            for approval in patchset.approvals.iter().filter(|a| a.kind == CODE_REVIEW) {
                events.push(self.event(
                    format!("{EVENT_APPROVAL}{}", approval.kind),
                    epoch_cell(&approval.granted_on),
                    person_cells(approval.by.as_ref(), APPROVAL_NO_NAME),
                    approval_value(&approval.value),
                ));
            }
        }

        events
    }
}

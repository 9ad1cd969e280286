use serde::Deserialize;
use serde_json::Value;

use super::{row, IdentityResolver, Row, SourceData};
use crate::dates;

const EMAIL_COLUMNS: &[&str] = &["id", "eventtype", "date", "owner", "subject", "body", "mailinglist"];
const EVENT_SENT: &str = "EMAIL_SENT";
const NO_BODY: &str = "None";

#[derive(Debug, Deserialize)]
pub(super) struct Message {
    #[serde(rename = "Message-ID")]
    message_id: String,
    #[serde(rename = "From")]
    from: String,
    #[serde(rename = "Subject")]
    subject: String,
    #[serde(rename = "Date", default)]
    date: Option<String>,
    #[serde(default)]
    body: Option<Body>,
}

#[derive(Debug, Deserialize)]
struct Body {
    plain: Option<String>,
}

impl Message {
    /// Wall-clock time of the `Date` header with its offset discarded.
    fn sent_at(&self) -> String {
        self.date
            .as_deref()
            .and_then(dates::normalize_naive)
            .unwrap_or_else(|| dates::EPOCH_NAIVE.to_string())
    }
}

impl SourceData for Message {
    const MAX_LEVEL: u32 = 1;

    fn columns(_level: u32) -> Vec<&'static str> {
        EMAIL_COLUMNS.to_vec()
    }

    fn author(&self) -> Option<&str> {
        Some(&self.from)
    }

    fn creation_date(&self) -> Value {
        Value::from(self.sent_at())
    }

    fn events(
        &self,
        origin: &str,
        _level: u32,
        _resolver: Option<&dyn IdentityResolver>,
    ) -> Vec<Row> {
        let body = self
            .body
            .as_ref()
            .and_then(|body| body.plain.as_deref())
            .unwrap_or(NO_BODY);

        vec![row([
            ("id", Value::from(self.message_id.as_str())),
            ("eventtype", Value::from(EVENT_SENT)),
            ("date", Value::from(self.sent_at())),
            ("owner", Value::from(self.from.as_str())),
            ("subject", Value::from(self.subject.as_str())),
            ("body", Value::from(body)),
            ("mailinglist", Value::from(origin)),
        ])]
    }
}

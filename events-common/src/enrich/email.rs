use lettre::message::Mailbox;
use serde_json::Value;

use super::{derive_column, Enricher};
use crate::table::EventTable;

/// Splits a `Name <address>` column into `user` and `email`.
#[derive(Debug, Clone)]
pub struct SplitEmail {
    column: String,
}

impl SplitEmail {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Enricher for SplitEmail {
    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn apply(&self, mut table: EventTable) -> EventTable {
        derive_column(&mut table, &self.column, "user", |v| {
            Value::from(parse_address(v.as_str().unwrap_or_default()).0)
        });
        derive_column(&mut table, &self.column, "email", |v| {
            Value::from(parse_address(v.as_str().unwrap_or_default()).1)
        });
        table
    }
}

/// Adds `domain`, the part of an address after `@`, or `unknown`.
#[derive(Debug, Clone)]
pub struct SplitEmailDomain {
    column: String,
}

impl SplitEmailDomain {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Enricher for SplitEmailDomain {
    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn apply(&self, mut table: EventTable) -> EventTable {
        derive_column(&mut table, &self.column, "domain", |v| {
            v.as_str()
                .and_then(|email| email.split('@').nth(1))
                .map_or_else(|| Value::from("unknown"), Value::from)
        });
        table
    }
}

/// Display name and address of a single mail header address.
///
/// Accepts `Name <addr>`, `"Quoted, Name" <addr>`, `addr (Name)` and a bare `addr`.
/// Anything else yields two empty strings.
pub fn parse_address(raw: &str) -> (String, String) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (String::new(), String::new());
    }

    // Old style comment form, which `Mailbox` does not parse.
    if let (Some(open), true) = (raw.find('('), raw.ends_with(')')) {
        if !raw.contains('<') {
            let address = raw[..open].trim();
            let name = raw[open + 1..raw.len() - 1].trim();
            return (name.to_string(), address.to_string());
        }
    }

    match raw.parse::<Mailbox>() {
        Ok(mailbox) => (
            mailbox.name.unwrap_or_default(),
            mailbox.email.to_string(),
        ),
        Err(_) => (String::new(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::enrich::test_support::single_column;

    #[test]
    fn test_parse_address_forms() {
        assert_eq!(
            parse_address("Jane Doe <jane@example.com>"),
            ("Jane Doe".to_string(), "jane@example.com".to_string())
        );
        assert_eq!(
            parse_address("\"Doe, Jane\" <jane@example.com>"),
            ("Doe, Jane".to_string(), "jane@example.com".to_string())
        );
        assert_eq!(
            parse_address("jane@example.com (Jane Doe)"),
            ("Jane Doe".to_string(), "jane@example.com".to_string())
        );
        assert_eq!(
            parse_address("jane@example.com"),
            (String::new(), "jane@example.com".to_string())
        );
        assert_eq!(parse_address("Jane <broken"), (String::new(), String::new()));
        assert_eq!(parse_address("not an address"), (String::new(), String::new()));
        assert_eq!(parse_address("  "), (String::new(), String::new()));
    }

    #[test]
    fn test_split_email() {
        let table = single_column(
            "owner",
            vec![json!("Jane Doe <jane@example.com>"), json!(3)],
        );

        let enriched = SplitEmail::new("owner").enrich(table);

        assert_eq!(enriched.column_names(), vec!["owner", "user", "email"]);
        assert_eq!(enriched.column("user").unwrap(), &[json!("Jane Doe"), json!("")]);
        assert_eq!(
            enriched.column("email").unwrap(),
            &[json!("jane@example.com"), json!("")]
        );
    }

    #[test]
    fn test_split_email_domain() {
        let table = single_column(
            "email",
            vec![
                json!("jane@example.com"),
                json!("no-at-sign"),
                json!("a@b@c"),
                Value::Null,
            ],
        );

        let enriched = SplitEmailDomain::new("email").enrich(table);

        assert_eq!(
            enriched.column("domain").unwrap(),
            &[json!("example.com"), json!("unknown"), json!("b"), json!("unknown")]
        );
    }

    #[test]
    fn test_missing_column_is_noop() {
        let table = single_column("author", vec![json!("x@y")]);

        assert_eq!(SplitEmail::new("owner").enrich(table.clone()), table);
        assert_eq!(SplitEmailDomain::new("email").enrich(table.clone()), table);
    }
}

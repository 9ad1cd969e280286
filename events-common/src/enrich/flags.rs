use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::Enricher;
use crate::table::EventTable;

type FlagPatterns = Vec<(&'static str, Regex)>;

fn compile(patterns: &[(&'static str, &str)]) -> FlagPatterns {
    patterns
        .iter()
        .map(|(name, pattern)| (*name, Regex::new(pattern).expect("valid flag regex")))
        .collect()
}

static MESSAGE_LOG_FLAGS: Lazy<FlagPatterns> = Lazy::new(|| {
    compile(&[
        ("Patch by Blink", r"^\s*Patch by (?P<value>.+)$"),
        ("Patch by WebKit", r"^\s*Patch by (?P<value>.+) on .+$"),
        ("Reviewed by WebKit", r"^\s*Reviewed by (?P<value>.+) on .+$"),
    ])
});

static EMAIL_FLAGS: Lazy<FlagPatterns> = Lazy::new(|| {
    compile(&[
        ("Acked-by", r"^Acked-by:(?P<value>.+)$"),
        ("Cc", r"^Cc:(?P<value>.+)$"),
        ("Fixes", r"^Fixes:(?P<value>.+)$"),
        ("From", r"^[Ff]rom:(?P<value>.+)$"),
        ("Reported-by", r"^Reported-by:(?P<value>.+)$"),
        ("Tested-by", r"^Tested-by:(?P<value>.+)$"),
        ("Reviewed-by", r"^Reviewed-by:(?P<value>.+)$"),
        ("Release-Acked-by", r"^Release-Acked-by:(?P<value>.+)$"),
        ("Signed-off-by", r"^Signed-off-by:(?P<value>.+)$"),
        ("Suggested-by", r"^Suggested-by:(?P<value>.+)$"),
    ])
});

/// Adds `flags` and `values` from the commit-message trailers used by Blink and WebKit.
#[derive(Debug, Clone)]
pub struct MessageLogFlag {
    column: String,
}

impl MessageLogFlag {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Enricher for MessageLogFlag {
    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn apply(&self, table: EventTable) -> EventTable {
        add_flag_columns(table, &self.column, &MESSAGE_LOG_FLAGS)
    }
}

/// Adds `flags` and `values` from mail headers and trailers such as `Signed-off-by:`.
#[derive(Debug, Clone)]
pub struct EmailFlag {
    column: String,
}

impl EmailFlag {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Enricher for EmailFlag {
    fn required_columns(&self) -> Vec<&str> {
        vec![self.column.as_str()]
    }

    fn apply(&self, table: EventTable) -> EventTable {
        add_flag_columns(table, &self.column, &EMAIL_FLAGS)
    }
}

fn add_flag_columns(mut table: EventTable, column: &str, patterns: &FlagPatterns) -> EventTable {
    let Some(texts) = table.column(column) else {
        return table;
    };

    let (flags, values): (Vec<Value>, Vec<Value>) = texts
        .iter()
        .map(|text| {
            let found = parse_flags(text.as_str().unwrap_or_default(), patterns);
            let (flags, values): (Vec<String>, Vec<String>) = found.into_iter().unzip();
            (collapse(flags), collapse(values))
        })
        .unzip();

    table.set_column("flags", flags);
    table.set_column("values", values);
    table
}

fn parse_flags(text: &str, patterns: &FlagPatterns) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for line in text.split('\n') {
        for (name, pattern) in patterns {
            if let Some(captures) = pattern.captures(line) {
                let value = captures
                    .name("value")
                    .map_or("", |m| m.as_str())
                    .trim()
                    .to_string();
                found.push((name.to_string(), value));
            }
        }
    }
    found
}

/// No match is an empty string and a single match a bare string; only repeated matches keep
/// the list shape, so one column can hold both strings and lists.
fn collapse(items: Vec<String>) -> Value {
    match items.len() {
        0 => Value::from(""),
        1 => items.into_iter().next().map_or(Value::Null, Value::from),
        _ => Value::from(items),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::enrich::test_support::single_column;

    #[test]
    fn test_message_log_flags() {
        let table = single_column(
            "message",
            vec![
                json!("Fix crash\n\nPatch by Jane Doe <jane@example.com>"),
                json!("Refactor\n\nPatch by Ann on 2012-01-01\nReviewed by Bob on 2012-01-02"),
                json!("Nothing to see"),
                Value::Null,
            ],
        );

        let enriched = MessageLogFlag::new("message").enrich(table);

        assert_eq!(
            enriched.column("flags").unwrap(),
            &[
                json!("Patch by Blink"),
                json!(["Patch by Blink", "Patch by WebKit", "Reviewed by WebKit"]),
                json!(""),
                json!("")
            ]
        );
        assert_eq!(
            enriched.column("values").unwrap(),
            &[
                json!("Jane Doe <jane@example.com>"),
                json!(["Ann on 2012-01-01", "Ann", "Bob"]),
                json!(""),
                json!("")
            ]
        );
    }

    #[test]
    fn test_email_flags() {
        let table = single_column(
            "body",
            vec![
                json!("Patch body\nSigned-off-by: Jane <jane@example.com>\n"),
                json!("from: someone@example.com\nCc: list@example.com\nReviewed-by: Bob"),
                json!("  Signed-off-by: not at line start"),
            ],
        );

        let enriched = EmailFlag::new("body").enrich(table);

        assert_eq!(
            enriched.column("flags").unwrap(),
            &[
                json!("Signed-off-by"),
                json!(["From", "Cc", "Reviewed-by"]),
                json!("")
            ]
        );
        assert_eq!(
            enriched.column("values").unwrap(),
            &[
                json!("Jane <jane@example.com>"),
                json!(["someone@example.com", "list@example.com", "Bob"]),
                json!("")
            ]
        );
    }

    #[test]
    fn test_missing_column_is_noop() {
        let table = single_column("subject", vec![json!("Signed-off-by: x")]);

        assert_eq!(MessageLogFlag::new("message").enrich(table.clone()), table);
        assert_eq!(EmailFlag::new("body").enrich(table.clone()), table);
    }
}

use events_common::events::SourceKind;
use serde_json::Value;

use crate::error::SetupError;

const GIT: &str = include_str!("../mappings/git.json");
const BUGZILLA: &str = include_str!("../mappings/bugzilla.json");
const BUGZILLA_REST: &str = include_str!("../mappings/bugzilla_rest.json");
const GERRIT: &str = include_str!("../mappings/gerrit.json");
const EMAIL: &str = include_str!("../mappings/email.json");

/// Index body (settings and mappings) for the destination index of a source type.
pub fn mapping_for(kind: SourceKind) -> Result<Value, SetupError> {
    let raw = match kind {
        SourceKind::Git => GIT,
        SourceKind::Bugzilla => BUGZILLA,
        SourceKind::BugzillaRest => BUGZILLA_REST,
        SourceKind::Gerrit => GERRIT,
        SourceKind::Email => EMAIL,
    };
    serde_json::from_str(raw).map_err(|source| SetupError::Mapping {
        kind: kind.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_every_mapping_parses() {
        for kind in [
            SourceKind::Git,
            SourceKind::Bugzilla,
            SourceKind::BugzillaRest,
            SourceKind::Gerrit,
            SourceKind::Email,
        ] {
            let mapping = mapping_for(kind).unwrap();
            let properties = &mapping["mappings"]["properties"];
            assert_eq!(properties["date"], json!({"type": "date"}), "{kind}");
            assert_eq!(properties["author_bot"], json!({"type": "boolean"}), "{kind}");
        }
    }

    #[test]
    fn test_git_line_counts_are_numeric() {
        let mapping = mapping_for(SourceKind::Git).unwrap();
        let properties = &mapping["mappings"]["properties"];

        assert_eq!(properties["addedlines"]["type"], "long");
        assert_eq!(properties["removedlines"]["type"], "long");
        assert_eq!(properties["message"]["fields"]["keyword"]["ignore_above"], 256);
    }
}

use serde::{Deserialize, Serialize};

use crate::enrich::parse_address;

/// A resolved contributor identity. Every field is optional; the eventizer substitutes
/// `Unknown` for the ones left empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub id: Option<String>,
    pub uuid: Option<String>,
    pub name: Option<String>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub domain: Option<String>,
    pub org_name: Option<String>,
    pub bot: Option<bool>,
}

pub trait IdentityResolver: Send + Sync {
    /// Resolve the raw author string of a record (e.g. `Name <mail>`).
    fn resolve(&self, author: &str) -> Identity;

    fn identity_domain(&self, author: &str) -> Option<String> {
        self.resolve(author)
            .domain
            .filter(|domain| !domain.is_empty())
            .or_else(|| email_domain(author))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectInfo {
    pub project: Option<String>,
    pub project_1: Option<String>,
}

pub trait ProjectLookup: Send + Sync {
    fn project_for(&self, origin: &str) -> ProjectInfo;
}

/// Domain part of the address in a `Name <user@domain>` author string.
pub fn email_domain(author: &str) -> Option<String> {
    let (_, address) = parse_address(author);
    address
        .split_once('@')
        .map(|(_, domain)| domain.trim().to_lowercase())
        .filter(|domain| !domain.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Identity);

    impl IdentityResolver for Fixed {
        fn resolve(&self, _author: &str) -> Identity {
            self.0.clone()
        }
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(
            email_domain("Eduardo Morais <companheiro.vermelho@example.COM>").as_deref(),
            Some("example.com")
        );
        assert_eq!(email_domain("nobody"), None);
        assert_eq!(email_domain("Someone <someone@>"), None);
    }

    #[test]
    fn test_identity_domain_prefers_resolver() {
        let resolver = Fixed(Identity {
            domain: Some("bitergia.com".to_string()),
            ..Default::default()
        });
        assert_eq!(
            resolver.identity_domain("A <a@example.com>").as_deref(),
            Some("bitergia.com")
        );

        let empty = Fixed(Identity::default());
        assert_eq!(
            empty.identity_domain("A <a@example.com>").as_deref(),
            Some("example.com")
        );
    }
}

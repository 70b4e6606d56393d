//! Domain names used by dynamic routes.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A validated, lower-cased domain name.
///
/// A single leading `*.` wildcard label is accepted. A trailing root dot is
/// stripped.
///
/// # Examples
///
/// ```
/// use meshroute_types::Domain;
///
/// let domain: Domain = "Example.COM.".parse().unwrap();
/// assert_eq!(domain.as_str(), "example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Returns the normalized domain name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

impl FromStr for Domain {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_end_matches('.').to_ascii_lowercase();
        if normalized.is_empty() || normalized.len() > MAX_DOMAIN_LEN {
            return Err(ParseError::InvalidDomain(s.to_string()));
        }

        let rest = normalized.strip_prefix("*.").unwrap_or(&normalized);
        if !rest.split('.').all(valid_label) {
            return Err(ParseError::InvalidDomain(s.to_string()));
        }

        Ok(Domain(normalized))
    }
}

impl TryFrom<String> for Domain {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered list of domains. Order is significant for equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domains(Vec<Domain>);

impl Domains {
    pub fn new(domains: Vec<Domain>) -> Self {
        Domains(domains)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.0.iter()
    }

    /// Display form used for status reporting: the domains joined by `", "`.
    pub fn safe_string(&self) -> String {
        self.0
            .iter()
            .map(Domain::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<Domain> for Domains {
    fn from_iter<I: IntoIterator<Item = Domain>>(iter: I) -> Self {
        Domains(iter.into_iter().collect())
    }
}

impl fmt::Display for Domains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.safe_string())
    }
}

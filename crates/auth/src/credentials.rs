//! Credential kinds, credential values, and user search criteria.

use std::collections::BTreeMap;
use core::str::FromStr;

use crate::user::{Attribute, User};

/// The kind of credentials being presented.
///
/// Authorities answer `Unsupported` for kinds they do not understand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Username + password.
    User,
    /// CAS service ticket + service URL (interactive login).
    Cas,
    /// CAS proxy ticket + service URL (delegated/API login).
    CasProxy,
    /// Any kind understood only by a custom authority.
    Other(String),
}

impl CredentialKind {
    pub fn as_str(&self) -> &str {
        match self {
            CredentialKind::User => "user",
            CredentialKind::Cas => "cas",
            CredentialKind::CasProxy => "cas_proxy",
            CredentialKind::Other(kind) => kind,
        }
    }
}

impl core::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialKind {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "user" => CredentialKind::User,
            "cas" => CredentialKind::Cas,
            "cas_proxy" => CredentialKind::CasProxy,
            other => CredentialKind::Other(other.to_string()),
        })
    }
}

/// Positional credential values (e.g. `[username, password]` or `[ticket, service]`).
///
/// `Debug` never prints the values, so credentials can appear in log fields.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials(Vec<String>);

impl Credentials {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Credentials([redacted; {}])", self.0.len())
    }
}

/// A single user search criterion.
///
/// Criteria in a list are OR-combined; entries within one `Attributes` map are
/// AND-combined. Values match exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    Username(String),
    Attributes(BTreeMap<Attribute, String>),
}

impl Criterion {
    pub fn username(username: impl Into<String>) -> Self {
        Criterion::Username(username.into())
    }

    pub fn attributes<I, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Attribute, V)>,
        V: Into<String>,
    {
        Criterion::Attributes(pairs.into_iter().map(|(a, v)| (a, v.into())).collect())
    }

    /// An empty attribute map matches nothing.
    pub fn matches(&self, user: &User) -> bool {
        match self {
            Criterion::Username(username) => user.username() == username,
            Criterion::Attributes(pairs) => {
                !pairs.is_empty()
                    && pairs
                        .iter()
                        .all(|(attribute, value)| user.attribute(*attribute) == Some(value.as_str()))
            }
        }
    }
}

impl From<&str> for Criterion {
    fn from(value: &str) -> Self {
        Criterion::username(value)
    }
}

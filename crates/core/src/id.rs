//! Strongly-typed identifiers used across the authorization model.

use std::borrow::Cow;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Application-level access scope (e.g. `"ENU"`, `"NOTIS"`).
///
/// A user either may or may not access a portal; group memberships are
/// always recorded per portal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Portal(Cow<'static, str>);

/// Scoping id narrowing a group membership to specific sub-contexts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AffiliateId(Cow<'static, str>);

macro_rules! impl_name_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&'static str> for $t {
            fn from(value: &'static str) -> Self {
                Self(Cow::Borrowed(value))
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(Cow::Owned(value))
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(format!("{}: must not be blank", $name)));
                }
                Ok(Self(Cow::Owned(trimmed.to_string())))
            }
        }
    };
}

impl_name_newtype!(Portal, "Portal");
impl_name_newtype!(AffiliateId, "AffiliateId");

impl From<u32> for AffiliateId {
    fn from(value: u32) -> Self {
        Self(Cow::Owned(value.to_string()))
    }
}

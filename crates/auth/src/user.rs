//! The canonical identity record produced by authorities.
//!
//! A `User` is created by an authority and then enriched in place by the
//! composite's amplify and merge steps. Enrichment is add-only: a value that is
//! already set is never overwritten.

use std::collections::{BTreeMap, BTreeSet};
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use warden_core::{AffiliateId, DomainError, Portal};

use crate::group::{GroupMembership, GroupMemberships};

// ─────────────────────────────────────────────────────────────────────────────
// Attributes
// ─────────────────────────────────────────────────────────────────────────────

/// Attributes that can be read generically and matched by search criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Username,
    FirstName,
    LastName,
    MiddleName,
    Title,
    BusinessPhone,
    Fax,
    Email,
    Address,
    City,
    State,
    Country,
}

impl Attribute {
    /// The profile attributes, i.e. every attribute except the immutable username.
    pub const PROFILE: [Attribute; 11] = [
        Attribute::FirstName,
        Attribute::LastName,
        Attribute::MiddleName,
        Attribute::Title,
        Attribute::BusinessPhone,
        Attribute::Fax,
        Attribute::Email,
        Attribute::Address,
        Attribute::City,
        Attribute::State,
        Attribute::Country,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Username => "username",
            Attribute::FirstName => "first_name",
            Attribute::LastName => "last_name",
            Attribute::MiddleName => "middle_name",
            Attribute::Title => "title",
            Attribute::BusinessPhone => "business_phone",
            Attribute::Fax => "fax",
            Attribute::Email => "email",
            Attribute::Address => "address",
            Attribute::City => "city",
            Attribute::State => "state",
            Attribute::Country => "country",
        }
    }
}

impl core::fmt::Display for Attribute {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        std::iter::once(Attribute::Username)
            .chain(Attribute::PROFILE)
            .find(|a| a.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown user attribute '{s}'")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CAS provenance
// ─────────────────────────────────────────────────────────────────────────────

/// CAS-specific data attached to a user authenticated through a CAS ticket.
///
/// The proxy-granting ticket, when present, lets the application obtain proxy
/// tickets for other CAS-protected services on the user's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasContext {
    pub base_url: String,
    pub proxy_callback_url: Option<String>,
    pub proxy_retrieval_url: Option<String>,
    pub pgt: Option<String>,
    /// Proxy chain reported for proxy-ticket logins (most recent first).
    #[serde(default)]
    pub proxies: Vec<String>,
}

impl CasContext {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            proxy_callback_url: None,
            proxy_retrieval_url: None,
            pgt: None,
            proxies: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A principal.
///
/// # Invariants
/// - `username` is immutable after construction and is the merge/dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    username: String,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub title: Option<String>,
    pub business_phone: Option<String>,
    pub fax: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,

    pub default_portal: Option<Portal>,
    pub portals: BTreeSet<Portal>,
    /// Keys for this user in external systems (e.g. `"employee_id"`).
    pub identifiers: BTreeMap<String, String>,
    pub group_memberships: BTreeMap<Portal, GroupMemberships>,
    pub cas: Option<CasContext>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            first_name: None,
            last_name: None,
            middle_name: None,
            title: None,
            business_phone: None,
            fax: None,
            email: None,
            address: None,
            city: None,
            state: None,
            country: None,
            default_portal: None,
            portals: BTreeSet::new(),
            identifiers: BTreeMap::new(),
            group_memberships: BTreeMap::new(),
            cas: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn attribute(&self, attribute: Attribute) -> Option<&str> {
        match attribute {
            Attribute::Username => Some(&self.username),
            _ => self.profile(attribute).and_then(|v| v.as_deref()),
        }
    }

    /// Set a profile attribute. The username cannot be changed.
    pub fn set_attribute(&mut self, attribute: Attribute, value: impl Into<String>) -> Result<(), DomainError> {
        let slot = self
            .profile_mut(attribute)
            .ok_or_else(|| DomainError::validation("username is immutable"))?;
        *slot = Some(value.into());
        Ok(())
    }

    fn profile(&self, attribute: Attribute) -> Option<&Option<String>> {
        let slot = match attribute {
            Attribute::FirstName => &self.first_name,
            Attribute::LastName => &self.last_name,
            Attribute::MiddleName => &self.middle_name,
            Attribute::Title => &self.title,
            Attribute::BusinessPhone => &self.business_phone,
            Attribute::Fax => &self.fax,
            Attribute::Email => &self.email,
            Attribute::Address => &self.address,
            Attribute::City => &self.city,
            Attribute::State => &self.state,
            Attribute::Country => &self.country,
            Attribute::Username => return None,
        };
        Some(slot)
    }

    fn profile_mut(&mut self, attribute: Attribute) -> Option<&mut Option<String>> {
        let slot = match attribute {
            Attribute::FirstName => &mut self.first_name,
            Attribute::LastName => &mut self.last_name,
            Attribute::MiddleName => &mut self.middle_name,
            Attribute::Title => &mut self.title,
            Attribute::BusinessPhone => &mut self.business_phone,
            Attribute::Fax => &mut self.fax,
            Attribute::Email => &mut self.email,
            Attribute::Address => &mut self.address,
            Attribute::City => &mut self.city,
            Attribute::State => &mut self.state,
            Attribute::Country => &mut self.country,
            Attribute::Username => return None,
        };
        Some(slot)
    }

    /// First and last name joined by a space, skipping whichever is unset.
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn may_access(&self, portal: &Portal) -> bool {
        self.portals.contains(portal)
    }

    pub fn group_memberships(&self, portal: &Portal) -> Option<&GroupMemberships> {
        self.group_memberships.get(portal)
    }

    /// Record a membership in `portal`, appending to that portal's list.
    pub fn add_group_membership(&mut self, portal: Portal, membership: GroupMembership) {
        self.group_memberships.entry(portal).or_default().push(membership);
    }

    /// True if the user belongs to any of `groups` in `portal`, optionally
    /// narrowed to `affiliates`.
    pub fn permit(&self, portal: &Portal, groups: &[&str], affiliates: &[AffiliateId]) -> bool {
        self.group_memberships(portal)
            .is_some_and(|m| groups.iter().any(|g| m.includes(g, affiliates)))
    }

    /// Merge `other` into `self` without overwriting anything already set.
    ///
    /// - profile attributes: copied only where unset
    /// - `default_portal`: kept if present, else taken
    /// - `portals`: union
    /// - `group_memberships`: a portal's list is copied wholesale when absent
    ///   or empty here (lists are never merged element-wise)
    /// - `identifiers`: keys absent here are copied
    /// - `cas`: taken when absent here
    pub fn merge(&mut self, other: &User) {
        for attribute in Attribute::PROFILE {
            let theirs = other.profile(attribute).cloned().flatten();
            if let Some(slot) = self.profile_mut(attribute) {
                if slot.is_none() {
                    *slot = theirs;
                }
            }
        }

        if self.default_portal.is_none() {
            self.default_portal.clone_from(&other.default_portal);
        }

        self.portals.extend(other.portals.iter().cloned());

        for (portal, memberships) in &other.group_memberships {
            if memberships.is_empty() {
                continue;
            }
            let mine = self.group_memberships.entry(portal.clone()).or_default();
            if mine.is_empty() {
                mine.clone_from(memberships);
            }
        }

        for (key, value) in &other.identifiers {
            self.identifiers
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        if self.cas.is_none() {
            self.cas.clone_from(&other.cas);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! In-memory authority: users, passwords and per-portal group forests that
//! are defined up front (tests, demos, small deployments).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use warden_core::{AffiliateId, Portal};

use crate::authority::{Authority, AuthorityError, Capability, Validation};
use crate::credentials::{CredentialKind, Credentials, Criterion};
use crate::group::{Group, GroupMembership};
use crate::user::User;

const CAPABILITIES: &[Capability] = &[
    Capability::ValidateCredentials,
    Capability::Amplify,
    Capability::FindUsers,
];

/// Authority backed by data held in memory.
///
/// - validates `user` credentials (`[username, password]`)
/// - amplifies users it knows by merging its record into theirs
/// - answers `find_users` over its records
#[derive(Debug, Clone)]
pub struct StaticAuthority {
    name: String,
    users: BTreeMap<String, User>,
    passwords: HashMap<String, String>,
    groups: HashMap<Portal, Vec<Arc<Group>>>,
    /// Roots created by [`UserBuilder::in_group`] for names no tree defined yet.
    detached: HashMap<Portal, Vec<Arc<Group>>>,
}

impl Default for StaticAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticAuthority {
    pub fn new() -> Self {
        Self::named("static")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            users: BTreeMap::new(),
            passwords: HashMap::new(),
            groups: HashMap::new(),
            detached: HashMap::new(),
        }
    }

    /// Register a group tree for `portal`.
    ///
    /// Memberships granted earlier through [`UserBuilder::in_group`] on a name
    /// this tree defines are moved onto the tree's node, so they gain its
    /// descendants.
    pub fn add_groups(&mut self, portal: impl Into<Portal>, root: Group) -> Arc<Group> {
        let portal = portal.into();
        let root = Arc::new(root);
        let forest = self.groups.entry(portal.clone()).or_default();

        let mut adopted = Vec::new();
        if let Some(detached) = self.detached.get_mut(&portal) {
            detached.retain(|placeholder| match root.find(placeholder.name()) {
                Some(node) => {
                    adopted.push((Arc::clone(placeholder), node));
                    false
                }
                None => true,
            });
        }
        forest.retain(|existing| !adopted.iter().any(|(placeholder, _)| Arc::ptr_eq(existing, placeholder)));
        forest.push(Arc::clone(&root));

        for user in self.users.values_mut() {
            if let Some(memberships) = user.group_memberships.get_mut(&portal) {
                for (placeholder, node) in &adopted {
                    memberships.repoint(placeholder, node);
                }
            }
        }
        root
    }

    pub fn find_group(&self, portal: &Portal, name: &str) -> Option<Arc<Group>> {
        self.groups
            .get(portal)?
            .iter()
            .find_map(|root| root.find(name))
    }

    /// Edit (creating if needed) the user record for `username`.
    pub fn user(&mut self, username: impl Into<String>) -> UserBuilder<'_> {
        let username = username.into();
        let user = self
            .users
            .entry(username.clone())
            .or_insert_with(|| User::new(username));
        UserBuilder {
            user,
            groups: &mut self.groups,
            detached: &mut self.detached,
        }
    }

    /// Set the password for `username`, creating the user if needed.
    pub fn set_password(&mut self, username: impl Into<String>, password: impl Into<String>) {
        let username = username.into();
        self.user(username.clone());
        self.passwords.insert(username, password.into());
    }

    pub fn get(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }

    /// Forget every user, password and group.
    pub fn clear(&mut self) {
        self.users.clear();
        self.passwords.clear();
        self.groups.clear();
        self.detached.clear();
    }
}

#[async_trait]
impl Authority for StaticAuthority {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    async fn valid_credentials(
        &self,
        kind: &CredentialKind,
        credentials: &Credentials,
    ) -> Result<Validation, AuthorityError> {
        if *kind != CredentialKind::User {
            return Ok(Validation::Unsupported);
        }

        let (Some(username), Some(password)) = (credentials.get(0), credentials.get(1)) else {
            return Ok(Validation::NoUser);
        };

        match (self.passwords.get(username), self.users.get(username)) {
            (Some(expected), Some(user)) if expected == password => Ok(Validation::Valid(user.clone())),
            _ => Ok(Validation::NoUser),
        }
    }

    async fn amplify(&self, user: &mut User) -> Result<(), AuthorityError> {
        if let Some(known) = self.users.get(user.username()) {
            user.merge(known);
        }
        Ok(())
    }

    async fn find_users(&self, criteria: &[Criterion]) -> Result<Vec<User>, AuthorityError> {
        Ok(self
            .users
            .values()
            .filter(|u| criteria.iter().any(|c| c.matches(u)))
            .cloned()
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User builder
// ─────────────────────────────────────────────────────────────────────────────

/// Edits one of a [`StaticAuthority`]'s user records in place.
pub struct UserBuilder<'a> {
    user: &'a mut User,
    groups: &'a mut HashMap<Portal, Vec<Arc<Group>>>,
    detached: &'a mut HashMap<Portal, Vec<Arc<Group>>>,
}

macro_rules! profile_setters {
    ($($field:ident),* $(,)?) => {
        $(
            pub fn $field(self, value: impl Into<String>) -> Self {
                self.user.$field = Some(value.into());
                self
            }
        )*
    };
}

impl<'a> UserBuilder<'a> {
    profile_setters!(
        first_name,
        last_name,
        middle_name,
        title,
        business_phone,
        fax,
        email,
        address,
        city,
        state,
        country,
    );

    pub fn identifier(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user.identifiers.insert(key.into(), value.into());
        self
    }

    pub fn default_portal(self, portal: impl Into<Portal>) -> Self {
        self.user.default_portal = Some(portal.into());
        self
    }

    pub fn in_portal(self, portal: impl Into<Portal>) -> Self {
        self.user.portals.insert(portal.into());
        self
    }

    /// Grant membership in `group` within `portal` (which is also granted).
    ///
    /// The group is looked up in the portal's registered trees; an unknown
    /// name becomes a new root group for that portal until a tree defining it
    /// is registered with [`StaticAuthority::add_groups`].
    pub fn in_group<I, A>(self, portal: impl Into<Portal>, group: &str, affiliates: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AffiliateId>,
    {
        let portal = portal.into();
        let forest = self.groups.entry(portal.clone()).or_default();
        let node = match forest.iter().find_map(|root| root.find(group)) {
            Some(node) => node,
            None => {
                let root = Arc::new(Group::new(group));
                forest.push(Arc::clone(&root));
                self.detached.entry(portal.clone()).or_default().push(Arc::clone(&root));
                root
            }
        };

        self.user.portals.insert(portal.clone());
        self.user
            .add_group_membership(portal, GroupMembership::new(node).with_affiliates(affiliates));
        self
    }

    pub fn user(&self) -> &User {
        self.user
    }
}

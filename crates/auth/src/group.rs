//! Hierarchical, affiliate-scoped group model.
//!
//! Groups form one forest per portal. A membership in a group implies
//! membership in every descendant of that group, and may be narrowed to a set
//! of affiliates.

use std::collections::BTreeSet;
use std::sync::Arc;

use warden_core::AffiliateId;

/// A named node in a per-portal group tree.
///
/// Nodes are shared through `Arc` so that memberships can point at a node in
/// the tree without copying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: String,
    children: Vec<Arc<Group>>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Builder-style helper: append a child and return `self`.
    pub fn with_child(mut self, child: Group) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Arc<Group>] {
        &self.children
    }

    /// True if `candidate` names this node or any of its descendants
    /// (case-insensitive).
    pub fn includes(&self, candidate: &str) -> bool {
        same_name(&self.name, candidate) || self.children.iter().any(|c| c.includes(candidate))
    }

    /// Locate the node named `name` in this subtree (case-insensitive).
    pub fn find(self: &Arc<Self>, name: &str) -> Option<Arc<Group>> {
        if same_name(&self.name, name) {
            return Some(Arc::clone(self));
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// A (group, affiliate set) pair.
///
/// An empty affiliate set means the membership applies to all affiliates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMembership {
    group: Arc<Group>,
    affiliate_ids: BTreeSet<AffiliateId>,
}

impl AsRef<str> for Group {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl GroupMembership {
    pub fn new(group: Arc<Group>) -> Self {
        Self {
            group,
            affiliate_ids: BTreeSet::new(),
        }
    }

    pub fn with_affiliates<I, A>(mut self, affiliates: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AffiliateId>,
    {
        self.affiliate_ids.extend(affiliates.into_iter().map(Into::into));
        self
    }

    pub fn group(&self) -> &Arc<Group> {
        &self.group
    }

    pub fn affiliate_ids(&self) -> &BTreeSet<AffiliateId> {
        &self.affiliate_ids
    }

    pub fn applies_to_all_affiliates(&self) -> bool {
        self.affiliate_ids.is_empty()
    }

    /// Whether this membership covers `group` (by the ancestor-includes-descendant rule).
    pub fn covers(&self, group: &str) -> bool {
        self.group.includes(group)
    }

    /// Whether this membership applies to any of `requested`.
    ///
    /// An empty request matches every membership.
    pub fn matches_affiliates(&self, requested: &[AffiliateId]) -> bool {
        requested.is_empty()
            || self.applies_to_all_affiliates()
            || requested.iter().any(|a| self.affiliate_ids.contains(a))
    }
}

/// Ordered memberships for one portal of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMemberships {
    memberships: Vec<GroupMembership>,
}

impl GroupMemberships {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, membership: GroupMembership) {
        self.memberships.push(membership);
    }

    pub fn is_empty(&self) -> bool {
        self.memberships.is_empty()
    }

    pub fn len(&self) -> usize {
        self.memberships.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupMembership> {
        self.memberships.iter()
    }

    /// True iff some membership covers `group` (a name or a [`Group`]) and
    /// matches `affiliates`.
    pub fn includes(&self, group: impl AsRef<str>, affiliates: &[AffiliateId]) -> bool {
        let group = group.as_ref();
        self.memberships
            .iter()
            .any(|m| m.covers(group) && m.matches_affiliates(affiliates))
    }

    /// Every membership that covers `group`, filtered by `affiliates` when supplied.
    pub fn find(&self, group: impl AsRef<str>, affiliates: &[AffiliateId]) -> Vec<&GroupMembership> {
        let group = group.as_ref();
        self.memberships
            .iter()
            .filter(|m| m.covers(group) && m.matches_affiliates(affiliates))
            .collect()
    }

    /// Point memberships held on `from` at `to` instead; returns how many moved.
    pub fn repoint(&mut self, from: &Arc<Group>, to: &Arc<Group>) -> usize {
        let mut moved = 0;
        for membership in self.memberships.iter_mut().filter(|m| Arc::ptr_eq(&m.group, from)) {
            membership.group = Arc::clone(to);
            moved += 1;
        }
        moved
    }
}

impl FromIterator<GroupMembership> for GroupMemberships {
    fn from_iter<T: IntoIterator<Item = GroupMembership>>(iter: T) -> Self {
        Self {
            memberships: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a GroupMemberships {
    type Item = &'a GroupMembership;
    type IntoIter = std::slice::Iter<'a, GroupMembership>;

    fn into_iter(self) -> Self::IntoIter {
        self.memberships.iter()
    }
}

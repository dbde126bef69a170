use serde::{Deserialize, Serialize};

use warden_core::Portal;

/// Settings the composite needs at request time.
///
/// Passed explicitly into [`crate::Composite::new`]; there is no process-wide
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// The portal this application protects; becomes a user's default portal
    /// when no authority supplies one.
    #[serde(default)]
    pub portal: Option<Portal>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_portal(mut self, portal: impl Into<Portal>) -> Self {
        self.portal = Some(portal.into());
        self
    }
}

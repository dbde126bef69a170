use async_trait::async_trait;

use warden_core::Portal;

use crate::authority::{Authority, AuthorityError, Capability};
use crate::configuration::Configuration;
use crate::user::User;

/// Grants every user access to one portal.
///
/// For applications where any authenticated user may enter the portal; it
/// never validates credentials itself.
#[derive(Debug, Clone)]
pub struct AutomaticAccessAuthority {
    portal: Portal,
}

impl AutomaticAccessAuthority {
    pub fn new(portal: impl Into<Portal>) -> Self {
        Self { portal: portal.into() }
    }

    /// Use the configured portal; fails if none is configured.
    pub fn from_configuration(configuration: &Configuration) -> Result<Self, AuthorityError> {
        configuration
            .portal
            .clone()
            .map(Self::new)
            .ok_or_else(|| AuthorityError::misconfiguration("automatic access requires a configured portal"))
    }
}

#[async_trait]
impl Authority for AutomaticAccessAuthority {
    fn name(&self) -> &str {
        "automatic_access"
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::Amplify]
    }

    async fn amplify(&self, user: &mut User) -> Result<(), AuthorityError> {
        user.portals.insert(self.portal.clone());
        if user.default_portal.is_none() {
            user.default_portal = Some(self.portal.clone());
        }
        Ok(())
    }
}

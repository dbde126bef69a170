//! The authority contract consumed by the composite.
//!
//! An authority implements any subset of the hooks below and advertises that
//! subset through [`Authority::capabilities`]. The composite only polls
//! authorities for the capabilities they advertise; every hook has a neutral
//! default so implementors only write the ones they need.

use async_trait::async_trait;
use thiserror::Error;

use warden_core::DomainError;

use crate::credentials::{CredentialKind, Credentials, Criterion};
use crate::user::User;

/// An optional authority hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ValidateCredentials,
    Veto,
    Amplify,
    FindUsers,
    AuthenticationSuccess,
    AuthenticationFailure,
}

/// One authority's answer to a credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The credentials are valid for this user.
    Valid(User),
    /// No opinion: this authority does not recognize the credentials.
    NoUser,
    /// This authority does not handle this credential kind at all.
    Unsupported,
    /// Explicit rejection that overrides every other authority's answer.
    Veto,
}

/// Authority-level failure.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// Fatal: the configured authority list cannot serve the request.
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),

    /// A backend round trip failed (network, protocol, storage).
    #[error("authority '{authority}' failed: {source}")]
    Backend {
        authority: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl AuthorityError {
    pub fn misconfiguration(msg: impl Into<String>) -> Self {
        Self::Misconfiguration(msg.into())
    }

    pub fn backend(
        authority: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            authority: authority.into(),
            source: source.into(),
        }
    }
}

/// A pluggable credential/authorization backend.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Name used in veto reasons and log fields.
    fn name(&self) -> &str;

    fn capabilities(&self) -> &[Capability];

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    async fn valid_credentials(
        &self,
        _kind: &CredentialKind,
        _credentials: &Credentials,
    ) -> Result<Validation, AuthorityError> {
        Ok(Validation::Unsupported)
    }

    /// Unconditionally reject an otherwise valid user.
    async fn may_veto(&self, _user: &User) -> Result<bool, AuthorityError> {
        Ok(false)
    }

    /// Add information to `user`. Must not overwrite anything already set.
    async fn amplify(&self, _user: &mut User) -> Result<(), AuthorityError> {
        Ok(())
    }

    async fn find_users(&self, _criteria: &[Criterion]) -> Result<Vec<User>, AuthorityError> {
        Ok(Vec::new())
    }

    async fn on_authentication_success(
        &self,
        _user: &User,
        _kind: &CredentialKind,
        _credentials: &Credentials,
        _authenticating_authority: &str,
    ) -> Result<(), AuthorityError> {
        Ok(())
    }

    async fn on_authentication_failure(
        &self,
        _user: Option<&User>,
        _kind: &CredentialKind,
        _credentials: &Credentials,
        _reason: &str,
    ) -> Result<(), AuthorityError> {
        Ok(())
    }
}

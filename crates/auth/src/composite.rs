//! Composite authority: voting, veto, amplification and merge across an
//! ordered list of authorities.
//!
//! Authority order is load-bearing. It decides which authority authenticates
//! a user (first valid answer wins) and whose data wins when several supply
//! the same attribute (first writer wins). Polling is strictly sequential.

use std::sync::Arc;

use crate::authority::{Authority, AuthorityError, Capability, Validation};
use crate::configuration::Configuration;
use crate::credentials::{CredentialKind, Credentials, Criterion};
use crate::user::User;

/// Result of a credential check.
///
/// `Invalid` and `Vetoed` are ordinary outcomes, not errors; the HTTP layer
/// turns them into 401 and 403 respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(User),
    Invalid { reason: String },
    Vetoed { reason: String },
}

impl AuthOutcome {
    pub fn user(&self) -> Option<&User> {
        match self {
            AuthOutcome::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            AuthOutcome::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            AuthOutcome::Authenticated(_) => None,
            AuthOutcome::Invalid { reason } | AuthOutcome::Vetoed { reason } => Some(reason),
        }
    }

    /// Status code the request-dispatch layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthOutcome::Authenticated(_) => 200,
            AuthOutcome::Invalid { .. } => 401,
            AuthOutcome::Vetoed { .. } => 403,
        }
    }
}

/// Orchestrates a configured, ordered list of authorities.
pub struct Composite {
    configuration: Configuration,
    authorities: Vec<Arc<dyn Authority>>,
}

impl Composite {
    pub fn new(configuration: Configuration, authorities: Vec<Arc<dyn Authority>>) -> Self {
        Self {
            configuration,
            authorities,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn authorities(&self) -> &[Arc<dyn Authority>] {
        &self.authorities
    }

    fn with_capability(&self, capability: Capability) -> impl Iterator<Item = &Arc<dyn Authority>> {
        self.authorities.iter().filter(move |a| a.supports(capability))
    }

    /// Verify credentials against every validating authority, in order.
    ///
    /// Decision order:
    /// 1. no validating authority configured → `Misconfiguration` error
    /// 2. every answer `Unsupported` → `Invalid`
    /// 3. any answer `Veto` → `Vetoed`
    /// 4. no `Valid` answer → `Invalid`
    /// 5. any `may_veto` on the candidate → `Vetoed`
    /// 6. otherwise the candidate is amplified and returned
    ///
    /// An authority error aborts the check and is returned as-is.
    pub async fn valid_credentials(
        &self,
        kind: &CredentialKind,
        credentials: &Credentials,
    ) -> Result<AuthOutcome, AuthorityError> {
        let validators: Vec<&Arc<dyn Authority>> = self.with_capability(Capability::ValidateCredentials).collect();
        if validators.is_empty() {
            tracing::error!(kind = %kind, "no configured authority validates credentials");
            return Err(AuthorityError::misconfiguration(
                "no configured authority implements credential validation",
            ));
        }

        let mut answers = Vec::with_capacity(validators.len());
        for authority in validators {
            let answer = authority
                .valid_credentials(kind, credentials)
                .await
                .inspect_err(|e| {
                    tracing::error!(authority = authority.name(), kind = %kind, error = %e, "credential validation failed");
                })?;
            tracing::debug!(authority = authority.name(), kind = %kind, answer = answer_label(&answer), "polled authority");
            answers.push((authority, answer));
        }

        if answers.iter().all(|(_, answer)| *answer == Validation::Unsupported) {
            let reason = format!("no configured authorities support {kind} credentials");
            return Ok(self.fail(None, kind, credentials, AuthOutcome::Invalid { reason }).await);
        }

        let vetoers: Vec<&str> = answers
            .iter()
            .filter(|(_, answer)| *answer == Validation::Veto)
            .map(|(authority, _)| authority.name())
            .collect();
        let candidate = answers.iter().find_map(|(authority, answer)| match answer {
            Validation::Valid(user) => Some((user, *authority)),
            _ => None,
        });

        if !vetoers.is_empty() {
            let reason = format!("credentials vetoed by {}", vetoers.join(", "));
            let user = candidate.map(|(user, _)| user);
            return Ok(self.fail(user, kind, credentials, AuthOutcome::Vetoed { reason }).await);
        }

        let Some((user, authenticating)) = candidate else {
            let reason = "invalid credentials".to_string();
            return Ok(self.fail(None, kind, credentials, AuthOutcome::Invalid { reason }).await);
        };
        let mut user = user.clone();

        let user_vetoers = self.vetoers(&user).await?;
        if !user_vetoers.is_empty() {
            let reason = format!("user '{}' vetoed by {}", user.username(), user_vetoers.join(", "));
            return Ok(self.fail(Some(&user), kind, credentials, AuthOutcome::Vetoed { reason }).await);
        }

        self.amplify(&mut user).await?;

        tracing::info!(
            username = user.username(),
            kind = %kind,
            authority = authenticating.name(),
            "authentication succeeded"
        );
        for authority in self.with_capability(Capability::AuthenticationSuccess) {
            if let Err(e) = authority
                .on_authentication_success(&user, kind, credentials, authenticating.name())
                .await
            {
                tracing::warn!(authority = authority.name(), error = %e, "authentication success notification failed");
            }
        }

        Ok(AuthOutcome::Authenticated(user))
    }

    async fn fail(
        &self,
        user: Option<&User>,
        kind: &CredentialKind,
        credentials: &Credentials,
        outcome: AuthOutcome,
    ) -> AuthOutcome {
        let reason = outcome.reason().unwrap_or_default();
        tracing::warn!(
            username = user.map(User::username),
            kind = %kind,
            reason,
            "authentication failed"
        );

        for authority in self.with_capability(Capability::AuthenticationFailure) {
            if let Err(e) = authority
                .on_authentication_failure(user, kind, credentials, reason)
                .await
            {
                tracing::warn!(authority = authority.name(), error = %e, "authentication failure notification failed");
            }
        }

        outcome
    }

    async fn vetoers(&self, user: &User) -> Result<Vec<&str>, AuthorityError> {
        let mut vetoers = Vec::new();
        for authority in self.with_capability(Capability::Veto) {
            if authority.may_veto(user).await? {
                vetoers.push(authority.name());
            }
        }
        Ok(vetoers)
    }

    /// True if any authority vetoes `user`; false when none implement vetoing.
    pub async fn may_veto(&self, user: &User) -> Result<bool, AuthorityError> {
        Ok(!self.vetoers(user).await?.is_empty())
    }

    /// Enrich `user` in place: configured default portal first, then each
    /// authority's amplify hook in list order.
    pub async fn amplify(&self, user: &mut User) -> Result<(), AuthorityError> {
        if user.default_portal.is_none() {
            user.default_portal.clone_from(&self.configuration.portal);
        }

        for authority in self.with_capability(Capability::Amplify) {
            authority.amplify(user).await?;
        }
        Ok(())
    }

    /// Search every authority, merging same-username results in authority
    /// order, then amplify each merged user.
    pub async fn find_users(&self, criteria: &[Criterion]) -> Result<Vec<User>, AuthorityError> {
        let mut merged: Vec<User> = Vec::new();

        for authority in self.with_capability(Capability::FindUsers) {
            let found = authority.find_users(criteria).await?;
            tracing::debug!(authority = authority.name(), count = found.len(), "authority search returned");

            for user in found {
                match merged.iter_mut().find(|u| u.username() == user.username()) {
                    Some(existing) => existing.merge(&user),
                    None => merged.push(user),
                }
            }
        }

        for user in &mut merged {
            self.amplify(user).await?;
        }
        Ok(merged)
    }

    /// Look up a single user by username.
    pub async fn find_user(&self, username: &str) -> Result<Option<User>, AuthorityError> {
        Ok(self
            .find_users(&[Criterion::username(username)])
            .await?
            .into_iter()
            .next())
    }
}

fn answer_label(answer: &Validation) -> &'static str {
    match answer {
        Validation::Valid(_) => "valid",
        Validation::NoUser => "no_user",
        Validation::Unsupported => "unsupported",
        Validation::Veto => "veto",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

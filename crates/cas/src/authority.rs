use async_trait::async_trait;

use warden_auth::{Authority, AuthorityError, Capability, CredentialKind, Credentials, User, Validation};

use crate::client::{CasClient, TicketKind};

const NAME: &str = "cas";

/// Authority that validates CAS tickets.
///
/// Handles the `cas` (service ticket) and `cas_proxy` (proxy ticket)
/// credential kinds, both shaped `[ticket, service]`. A ticket CAS rejects is
/// "no user"; a transport or protocol failure is an authority error.
#[derive(Debug, Clone)]
pub struct CasAuthority {
    client: CasClient,
}

impl CasAuthority {
    pub fn new(client: CasClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &CasClient {
        &self.client
    }

    /// Proxy ticket for `target_service` on behalf of `user`.
    pub async fn proxy_ticket_for(&self, user: &User, target_service: &str) -> Result<String, AuthorityError> {
        self.client
            .proxy_ticket_for(user, target_service)
            .await
            .map_err(|err| AuthorityError::backend(NAME, err))
    }
}

#[async_trait]
impl Authority for CasAuthority {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::ValidateCredentials]
    }

    async fn valid_credentials(
        &self,
        kind: &CredentialKind,
        credentials: &Credentials,
    ) -> Result<Validation, AuthorityError> {
        let ticket_kind = match kind {
            CredentialKind::Cas => TicketKind::Service,
            CredentialKind::CasProxy => TicketKind::Proxy,
            _ => return Ok(Validation::Unsupported),
        };

        let (Some(ticket), Some(service)) = (credentials.get(0), credentials.get(1)) else {
            return Ok(Validation::NoUser);
        };
        if ticket.trim().is_empty() || service.trim().is_empty() {
            return Ok(Validation::NoUser);
        }

        match self
            .client
            .authenticate(ticket_kind, ticket, service)
            .await
            .map_err(|err| AuthorityError::backend(NAME, err))?
        {
            Some(user) => Ok(Validation::Valid(user)),
            None => Ok(Validation::NoUser),
        }
    }
}

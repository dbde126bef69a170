use reqwest::StatusCode;
use url::Url;

use warden_auth::{CasContext, User};

use crate::config::CasConfig;
use crate::error::CasError;
use crate::response::{parse_proxy, parse_validation, ProxyResponse, TicketValidation};

/// Which validation endpoint a ticket belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    /// `ST-…`, issued by CAS login; validated at `/serviceValidate`.
    Service,
    /// `PT-…`, issued by `/proxy`; validated at `/proxyValidate`.
    Proxy,
}

impl TicketKind {
    fn endpoint(self) -> &'static str {
        match self {
            Self::Service => "serviceValidate",
            Self::Proxy => "proxyValidate",
        }
    }
}

/// HTTP client for one CAS server.
#[derive(Debug, Clone)]
pub struct CasClient {
    config: CasConfig,
    http: reqwest::Client,
}

impl CasClient {
    pub fn new(config: CasConfig) -> Result<Self, CasError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_http_client(config, builder.build()?))
    }

    pub fn with_http_client(config: CasConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &CasConfig {
        &self.config
    }

    /// Validate `ticket` for `service` and return CAS's raw answer.
    ///
    /// `pgtUrl` is sent whenever a proxy callback is configured.
    pub async fn validate(&self, kind: TicketKind, ticket: &str, service: &str) -> Result<TicketValidation, CasError> {
        let mut url = self.config.endpoint(kind.endpoint())?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("service", service).append_pair("ticket", ticket);
            if let Some(callback) = &self.config.proxy_callback_url {
                query.append_pair("pgtUrl", callback.as_str());
            }
        }

        let body = self.fetch(url).await?;
        parse_validation(&body)
    }

    /// Validate a ticket and build the user it belongs to.
    ///
    /// Returns `Ok(None)` when CAS rejects the ticket. When CAS issued a PGT
    /// IOU, the PGT is fetched from the callback service and attached to the
    /// user's CAS context.
    pub async fn authenticate(&self, kind: TicketKind, ticket: &str, service: &str) -> Result<Option<User>, CasError> {
        let (username, pgt_iou, proxies) = match self.validate(kind, ticket, service).await? {
            TicketValidation::Success {
                username,
                pgt_iou,
                proxies,
            } => (username, pgt_iou, proxies),
            TicketValidation::Failure { code, message } => {
                tracing::info!(code = %code, message = %message, service, "CAS rejected ticket");
                return Ok(None);
            }
        };

        let mut context = CasContext::new(self.config.base_url.as_str());
        context.proxy_callback_url = self.config.proxy_callback_url.as_ref().map(Url::to_string);
        context.proxy_retrieval_url = self.config.proxy_retrieval_url.as_ref().map(Url::to_string);
        context.proxies = proxies;
        if let Some(pgt_iou) = pgt_iou {
            context.pgt = Some(self.retrieve_pgt(&pgt_iou).await?);
        }

        tracing::debug!(username = %username, proxied = !context.proxies.is_empty(), "CAS ticket validated");

        let mut user = User::new(username);
        user.cas = Some(context);
        Ok(Some(user))
    }

    /// Fetch the PGT that CAS delivered for `pgt_iou`.
    ///
    /// A 404 means CAS has not called back yet (or the PGT was already
    /// taken); it is retried per [`crate::RetrievalPolicy`].
    pub async fn retrieve_pgt(&self, pgt_iou: &str) -> Result<String, CasError> {
        let mut url = self
            .config
            .proxy_retrieval_url
            .clone()
            .ok_or(CasError::MissingRetrievalUrl)?;
        url.query_pairs_mut().append_pair("pgtIou", pgt_iou);

        let policy = self.config.retrieval;
        let attempts = policy.attempts.max(1);

        for attempt in 1..=attempts {
            let response = self.http.get(url.clone()).send().await?;
            match response.status() {
                status if status.is_success() => {
                    let pgt = response.text().await?.trim().to_string();
                    if pgt.is_empty() {
                        return Err(CasError::malformed("empty PGT from retrieval service"));
                    }
                    return Ok(pgt);
                }
                StatusCode::NOT_FOUND => {
                    tracing::debug!(pgt_iou, attempt, attempts, "PGT not delivered yet");
                    if attempt < attempts {
                        tokio::time::sleep(policy.interval()).await;
                    }
                }
                status => {
                    return Err(CasError::PgtRetrieval {
                        pgt_iou: pgt_iou.to_string(),
                        status: status.as_u16(),
                    });
                }
            }
        }

        Err(CasError::PgtNotDelivered {
            pgt_iou: pgt_iou.to_string(),
            attempts,
        })
    }

    /// Ask CAS for a proxy ticket to `target_service`.
    ///
    /// Every call is a fresh request: proxy tickets are single-use.
    pub async fn issue_proxy_ticket(&self, pgt: &str, target_service: &str) -> Result<String, CasError> {
        let mut url = self.config.endpoint("proxy")?;
        url.query_pairs_mut()
            .append_pair("pgt", pgt)
            .append_pair("targetService", target_service);

        match parse_proxy(&self.fetch(url).await?)? {
            ProxyResponse::Success { ticket } => Ok(ticket),
            ProxyResponse::Failure { code, message } => Err(CasError::ProxyRejected { code, message }),
        }
    }

    /// Proxy ticket for `target_service` on behalf of a CAS-authenticated user.
    pub async fn proxy_ticket_for(&self, user: &User, target_service: &str) -> Result<String, CasError> {
        let pgt = user
            .cas
            .as_ref()
            .and_then(|cas| cas.pgt.as_deref())
            .ok_or_else(|| CasError::NoProxyGrantingTicket(user.username().to_string()))?;
        self.issue_proxy_ticket(pgt, target_service).await
    }

    async fn fetch(&self, url: Url) -> Result<String, CasError> {
        let endpoint = format!("{}{}", url.origin().ascii_serialization(), url.path());
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CasError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CasError {
    #[error("invalid CAS URL: {0}")]
    InvalidUrl(String),

    #[error("CAS request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{endpoint} answered HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("malformed CAS response: {0}")]
    MalformedResponse(String),

    #[error("CAS refused to issue a proxy ticket ({code}): {message}")]
    ProxyRejected { code: String, message: String },

    #[error("CAS issued a PGT IOU but no proxy retrieval URL is configured")]
    MissingRetrievalUrl,

    #[error("PGT retrieval for {pgt_iou} answered HTTP {status}")]
    PgtRetrieval { pgt_iou: String, status: u16 },

    #[error("PGT for {pgt_iou} was not delivered after {attempts} attempts")]
    PgtNotDelivered { pgt_iou: String, attempts: u32 },

    #[error("user '{0}' holds no proxy-granting ticket")]
    NoProxyGrantingTicket(String),
}

impl CasError {
    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CasError;

/// Where the CAS server and the PGT callback service live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasConfig {
    /// CAS server root, e.g. `https://cas.example.edu/cas`.
    pub base_url: Url,
    /// Sent as `pgtUrl` on validation; CAS delivers PGTs here.
    #[serde(default)]
    pub proxy_callback_url: Option<Url>,
    /// `GET ?pgtIou=..` on this URL returns the PGT exactly once.
    #[serde(default)]
    pub proxy_retrieval_url: Option<Url>,
    #[serde(default)]
    pub retrieval: RetrievalPolicy,
    /// Per-request timeout; unset means the HTTP client default.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl CasConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            proxy_callback_url: None,
            proxy_retrieval_url: None,
            retrieval: RetrievalPolicy::default(),
            timeout_ms: None,
        }
    }

    /// Enable proxying through a callback service.
    pub fn with_proxy_callback(mut self, callback: Url, retrieval: Url) -> Self {
        self.proxy_callback_url = Some(callback);
        self.proxy_retrieval_url = Some(retrieval);
        self
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalPolicy) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// `{base_url}/{name}`, whether or not `base_url` ends with a slash.
    pub fn endpoint(&self, name: &str) -> Result<Url, CasError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CasError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }
}

/// How long to wait for CAS to deliver a PGT to the callback service.
///
/// CAS calls the callback before it answers validation, but the callback may
/// still be writing when the client asks, so a 404 is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalPolicy {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval_ms: 200,
        }
    }
}

impl RetrievalPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use thiserror::Error;

pub const BIND_ADDR_VAR: &str = "WARDEN_BIND_ADDR";
pub const STORE_PATH_VAR: &str = "WARDEN_PGT_STORE";
pub const MAX_AGE_VAR: &str = "WARDEN_PGT_MAX_AGE_SECS";
pub const PURGE_INTERVAL_VAR: &str = "WARDEN_PGT_PURGE_INTERVAL_SECS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STORE_PATH: &str = "pgt-store.json";
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("WARDEN_BIND_ADDR={value} is not a socket address: {source}")]
    BindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("WARDEN_PGT_MAX_AGE_SECS={0} is not a non-negative number of seconds in range")]
    MaxAge(String),

    #[error("WARDEN_PGT_PURGE_INTERVAL_SECS={0} is not a positive number of seconds")]
    PurgeInterval(String),
}

/// Callback service settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackConfig {
    pub bind_addr: SocketAddr,
    pub store_path: PathBuf,
    /// Stored PGTs older than this are purged at startup and then every
    /// `purge_interval`.
    pub max_age: Option<Duration>,
    pub purge_interval: std::time::Duration,
}

impl CallbackConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|source| ConfigError::BindAddr { value: bind, source })?;

        let store_path = lookup(STORE_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));

        let max_age = lookup(MAX_AGE_VAR)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .ok()
                    .and_then(|secs| i64::try_from(secs).ok())
                    .and_then(Duration::try_seconds)
                    .filter(|age| Utc::now().checked_sub_signed(*age).is_some())
                    .ok_or(ConfigError::MaxAge(raw))
            })
            .transpose()?;

        let purge_interval = match lookup(PURGE_INTERVAL_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => std::time::Duration::from_secs(secs),
                _ => return Err(ConfigError::PurgeInterval(raw)),
            },
            None => std::time::Duration::from_secs(DEFAULT_PURGE_INTERVAL_SECS),
        };

        Ok(Self {
            bind_addr,
            store_path,
            max_age,
            purge_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = CallbackConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.store_path, PathBuf::from("pgt-store.json"));
        assert_eq!(config.max_age, None);
        assert_eq!(config.purge_interval, std::time::Duration::from_secs(300));
    }

    #[test]
    fn reads_overrides() {
        let config = CallbackConfig::from_lookup(lookup(&[
            (BIND_ADDR_VAR, "127.0.0.1:9443"),
            (STORE_PATH_VAR, "/var/lib/warden/pgt.json"),
            (MAX_AGE_VAR, "3600"),
            (PURGE_INTERVAL_VAR, "60"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9443".parse().unwrap());
        assert_eq!(config.store_path, PathBuf::from("/var/lib/warden/pgt.json"));
        assert_eq!(config.max_age, Some(Duration::hours(1)));
        assert_eq!(config.purge_interval, std::time::Duration::from_secs(60));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            CallbackConfig::from_lookup(lookup(&[(BIND_ADDR_VAR, "nowhere")])),
            Err(ConfigError::BindAddr { .. })
        ));
        assert!(matches!(
            CallbackConfig::from_lookup(lookup(&[(MAX_AGE_VAR, "soon")])),
            Err(ConfigError::MaxAge(_))
        ));
    }

    #[test]
    fn max_age_must_be_a_representable_non_negative_duration() {
        for bad in ["-1", "9000000000000", "18446744073709551615", "1.5"] {
            assert!(
                matches!(
                    CallbackConfig::from_lookup(lookup(&[(MAX_AGE_VAR, bad)])),
                    Err(ConfigError::MaxAge(_))
                ),
                "{bad} should be rejected"
            );
        }

        let config = CallbackConfig::from_lookup(lookup(&[(MAX_AGE_VAR, "0")])).unwrap();
        assert_eq!(config.max_age, Some(Duration::zero()));
    }

    #[test]
    fn purge_interval_must_be_positive() {
        for bad in ["0", "-5", "soon"] {
            assert!(matches!(
                CallbackConfig::from_lookup(lookup(&[(PURGE_INTERVAL_VAR, bad)])),
                Err(ConfigError::PurgeInterval(_))
            ));
        }
    }
}

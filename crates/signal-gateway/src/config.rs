//! Gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use signal_types::{Result, SignalError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub const ENV_BASE_URL: &str = "SIGNAL_GATEWAY_URL";
pub const ENV_TIMEOUT_MS: &str = "SIGNAL_GATEWAY_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Backend root, e.g. `http://localhost:8000` or a reverse-proxied `/api` prefix.
    pub base_url: String,

    /// Per-request timeout (milliseconds)
    pub timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl GatewayConfig {
    /// Read overrides from `SIGNAL_GATEWAY_URL` and `SIGNAL_GATEWAY_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = raw.trim().parse().map_err(|_| {
                SignalError::Validation(format!("{ENV_TIMEOUT_MS} must be an integer, got '{raw}'"))
            })?;
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Full URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn env_overrides_applied() {
        let config = GatewayConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://proxy/api/"),
            (ENV_TIMEOUT_MS, "1500"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint("/filtering"), "http://proxy/api/filtering");
        assert_eq!(config.timeout_ms, 1500);
    }

    #[test]
    fn bad_timeout_is_validation_error() {
        let err = GatewayConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "soon")])).unwrap_err();
        assert!(matches!(err, SignalError::Validation(_)));
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"base_url": "http://backend:9000"}"#).unwrap();
        assert_eq!(config.base_url, "http://backend:9000");
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }
}

//! Connection settings for the HTTP store adapter.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for [`HttpStore`](crate::HttpStore).
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the store endpoint (e.g., "http://localhost:26265").
    #[serde(default = "StoreConfig::default_base_url")]
    pub base_url: String,

    /// Host whose agent owns the switches. When the endpoint is a broker this
    /// is the id of the server behind it.
    #[serde(default = "StoreConfig::default_host")]
    pub host: String,

    /// Name of the switch agent service on `host`.
    #[serde(default = "StoreConfig::default_agent_service")]
    pub agent_service: String,

    /// Credential sent with every call.
    #[serde(default = "StoreConfig::default_credential")]
    pub credential: String,

    /// Request timeout in seconds.
    #[serde(default = "StoreConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connect timeout in seconds.
    #[serde(default = "StoreConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl StoreConfig {
    fn default_base_url() -> String {
        "http://localhost:26265".to_string()
    }

    fn default_host() -> String {
        "localhost".to_string()
    }

    fn default_agent_service() -> String {
        "switch-agent".to_string()
    }

    fn default_credential() -> String {
        "anonymous".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    /// Target string for agent-scoped calls: `<host>/<agent_service>`.
    #[must_use]
    pub fn agent_target(&self) -> String {
        format!("{}/{}", self.host, self.agent_service)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            host: Self::default_host(),
            agent_service: Self::default_agent_service(),
            credential: Self::default_credential(),
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.base_url, "http://localhost:26265");
        assert_eq!(config.agent_target(), "localhost/switch-agent");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{ "host": "7c1f", "credential": "secret" }"#).unwrap();
        assert_eq!(config.agent_target(), "7c1f/switch-agent");
        assert_eq!(config.credential, "secret");
        assert_eq!(config.request_timeout_seconds, 30);
    }
}

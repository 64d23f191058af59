//! Configuration types for igniter
//!
//! This module defines all configuration structures used throughout the
//! workspace. The daemon fills them from environment variables; embedders
//! may deserialize them from any serde format.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::RecordType;

/// Default TTL applied to every record (seconds)
pub const DEFAULT_TTL: u32 = 120;

/// Default page size for remote record listing
pub const DEFAULT_LIST_PAGE_SIZE: u32 = 100;

/// Annotation carrying a node's public address
pub const DEFAULT_NODE_ADDRESS_ANNOTATION: &str = "flannel.alpha.coreos.com/public-ip";

/// Node names containing this pattern are treated as control plane
pub const DEFAULT_EXCLUDED_NODE_PATTERN: &str = "master";

/// Upper bound for the ingress resync interval (seconds)
pub const MAX_RESYNC_INTERVAL_SECS: u64 = 3600;

/// Upper bound for the node refresh interval (seconds)
pub const MAX_NODE_REFRESH_INTERVAL_SECS: u64 = 86_400;

/// Main igniter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IgniterConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Record settings applied uniformly to every record
    #[serde(default)]
    pub records: RecordSettings,

    /// Node discovery settings
    #[serde(default)]
    pub nodes: NodeSourceConfig,

    /// Controller loop settings
    #[serde(default)]
    pub controller: ControllerSettings,
}

impl IgniterConfig {
    /// Create a configuration for a zone, everything else defaulted
    pub fn new(api_token: impl Into<String>, zone_id: impl Into<String>) -> Self {
        Self {
            provider: ProviderConfig::new(api_token, zone_id),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.records.validate()?;
        self.nodes.validate()?;
        self.controller.validate()?;
        Ok(())
    }
}

/// Cloudflare provider configuration
///
/// The Debug implementation does not expose the API token.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Cloudflare API token
    pub api_token: String,

    /// Zone identifier records are managed in
    pub zone_id: String,

    /// Whether records are proxied; applies to every record
    #[serde(default)]
    pub proxied: bool,

    /// API base URL override (tests, API gateways)
    #[serde(default)]
    pub api_base: Option<String>,

    /// Client-side timeout for each API request (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Page size used when listing remote records
    #[serde(default = "default_list_page_size")]
    pub list_page_size: u32,
}

impl ProviderConfig {
    /// Create a provider configuration with defaults
    pub fn new(api_token: impl Into<String>, zone_id: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            zone_id: zone_id.into(),
            proxied: false,
            api_base: None,
            request_timeout_secs: default_request_timeout_secs(),
            list_page_size: default_list_page_size(),
        }
    }

    /// Set whether records are proxied
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// Override the API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_token.is_empty() {
            return Err(crate::Error::config("Cloudflare API token cannot be empty"));
        }
        if self.zone_id.is_empty() {
            return Err(crate::Error::config("Cloudflare zone identifier cannot be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }
        if !(5..=5000).contains(&self.list_page_size) {
            return Err(crate::Error::config(format!(
                "List page size must be between 5 and 5000. Got: {}",
                self.list_page_size
            )));
        }
        if let Some(base) = &self.api_base
            && !base.starts_with("https://")
            && !base.starts_with("http://")
        {
            return Err(crate::Error::config(format!(
                "API base must use HTTP or HTTPS scheme. Got: {}",
                base
            )));
        }
        Ok(())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("proxied", &self.proxied)
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("list_page_size", &self.list_page_size)
            .finish()
    }
}

/// Record settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSettings {
    /// Record type projected for every hostname
    #[serde(default)]
    pub record_type: RecordType,

    /// Time-to-live for every record (seconds)
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl RecordSettings {
    /// Validate the record settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        // 1 means "automatic" at Cloudflare
        if self.ttl != 1 && self.ttl < 60 {
            return Err(crate::Error::config(format!(
                "Record TTL must be 1 (automatic) or at least 60 seconds. Got: {}",
                self.ttl
            )));
        }
        Ok(())
    }
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            record_type: RecordType::default(),
            ttl: default_ttl(),
        }
    }
}

/// Node discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSourceConfig {
    /// Node annotation holding the public address
    #[serde(default = "default_node_address_annotation")]
    pub address_annotation: String,

    /// Nodes whose name contains this pattern are skipped
    #[serde(default = "default_excluded_node_pattern")]
    pub excluded_name_pattern: String,
}

impl NodeSourceConfig {
    /// Validate the node source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.address_annotation.is_empty() {
            return Err(crate::Error::config("Node address annotation cannot be empty"));
        }
        Ok(())
    }
}

impl Default for NodeSourceConfig {
    fn default() -> Self {
        Self {
            address_annotation: default_node_address_annotation(),
            excluded_name_pattern: default_excluded_node_pattern(),
        }
    }
}

/// Controller loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Interval at which the event source re-delivers every ingress (seconds)
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,

    /// Interval at which the node list is refreshed (seconds)
    ///
    /// 0 disables refresh; the node list captured at startup is used for the
    /// lifetime of the process.
    #[serde(default)]
    pub node_refresh_interval_secs: u64,

    /// Capacity of the controller event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ControllerSettings {
    /// Validate the controller settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=MAX_RESYNC_INTERVAL_SECS).contains(&self.resync_interval_secs) {
            return Err(crate::Error::config(format!(
                "Resync interval must be between 1 and {} seconds, got {}",
                MAX_RESYNC_INTERVAL_SECS, self.resync_interval_secs
            )));
        }
        if self.node_refresh_interval_secs > MAX_NODE_REFRESH_INTERVAL_SECS {
            return Err(crate::Error::config(format!(
                "Node refresh interval must be at most {} seconds, got {}",
                MAX_NODE_REFRESH_INTERVAL_SECS, self.node_refresh_interval_secs
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            resync_interval_secs: default_resync_interval_secs(),
            node_refresh_interval_secs: 0,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_list_page_size() -> u32 {
    DEFAULT_LIST_PAGE_SIZE
}

fn default_node_address_annotation() -> String {
    DEFAULT_NODE_ADDRESS_ANNOTATION.to_string()
}

fn default_excluded_node_pattern() -> String {
    DEFAULT_EXCLUDED_NODE_PATTERN.to_string()
}

fn default_resync_interval_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_once_credentials_are_set() {
        let config = IgniterConfig::new("token", "zone");
        assert!(config.validate().is_ok());
        assert_eq!(config.records.ttl, 120);
        assert_eq!(config.records.record_type, RecordType::A);
        assert_eq!(config.controller.resync_interval_secs, 30);
        assert_eq!(config.provider.list_page_size, 100);
        assert!(!config.provider.proxied);
    }

    #[test]
    fn missing_credentials_are_rejected() {
        assert!(IgniterConfig::new("", "zone").validate().is_err());
        assert!(IgniterConfig::new("token", "").validate().is_err());
    }

    #[test]
    fn page_size_bounds() {
        let mut config = IgniterConfig::new("token", "zone");
        config.provider.list_page_size = 4;
        assert!(config.validate().is_err());
        config.provider.list_page_size = 5000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn interval_bounds() {
        let mut config = IgniterConfig::new("token", "zone");
        config.controller.resync_interval_secs = 0;
        assert!(config.validate().is_err());
        config.controller.resync_interval_secs = MAX_RESYNC_INTERVAL_SECS + 1;
        assert!(config.validate().is_err());
        config.controller.resync_interval_secs = MAX_RESYNC_INTERVAL_SECS;
        assert!(config.validate().is_ok());

        config.controller.node_refresh_interval_secs = u64::MAX;
        assert!(config.validate().is_err());
        config.controller.node_refresh_interval_secs = MAX_NODE_REFRESH_INTERVAL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ttl_bounds() {
        let mut config = IgniterConfig::new("token", "zone");
        config.records.ttl = 30;
        assert!(config.validate().is_err());
        config.records.ttl = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn api_base_requires_http_scheme() {
        let mut config = IgniterConfig::new("token", "zone");
        config.provider = config.provider.with_api_base("ftp://example.com");
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: IgniterConfig = serde_json::from_value(serde_json::json!({
            "provider": { "api_token": "token", "zone_id": "zone", "proxied": true }
        }))
        .unwrap();

        assert!(config.provider.proxied);
        assert_eq!(config.provider.request_timeout_secs, 5);
        assert_eq!(config.nodes.address_annotation, DEFAULT_NODE_ADDRESS_ANNOTATION);
        assert_eq!(config.nodes.excluded_name_pattern, "master");
        assert_eq!(config.controller.node_refresh_interval_secs, 0);
    }

    #[test]
    fn debug_hides_api_token() {
        let config = ProviderConfig::new("secret_token_12345", "zone");
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("<REDACTED>"));
    }
}

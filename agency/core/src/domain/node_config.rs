// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Agency Configuration Types
//
// Defines the configuration schema for a cloneMAP agency process, including:
// - Agency identity (MAS, image group, agency id, peer name)
// - Network and collaborator service endpoints
// - Feature switches for DF, MQTT and log shipping
// - Queue capacities for mailboxes and outbound paths
// - Observability settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level agency configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgencyConfig {
    #[serde(default)]
    pub agency: AgencyIdentity,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub services: ServiceEndpoints,

    #[serde(default)]
    pub features: FeatureFlags,

    #[serde(default)]
    pub queues: QueueConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgencyIdentity {
    #[serde(default)]
    pub masid: i64,

    /// Image group id
    #[serde(default)]
    pub imid: i64,

    #[serde(default)]
    pub id: i64,

    /// Peer address other agencies use to reach this one. Derived from the ids
    /// when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AgencyIdentity {
    /// Peer name of this agency on the platform network.
    pub fn peer_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!(
                "mas-{}-im-{}-agency-{}.mas{}agencies",
                self.masid, self.imid, self.id, self.masid
            ),
        }
    }

    /// Parse a `mas-<masid>-im-<imid>-agency-<id>` host name.
    pub fn from_hostname(hostname: &str) -> Option<Self> {
        let host = hostname.split('.').next()?;
        let parts: Vec<&str> = host.split('-').collect();
        match parts.as_slice() {
            ["mas", masid, "im", imid, "agency", id] => Some(Self {
                masid: masid.parse().ok()?,
                imid: imid.parse().ok()?,
                id: id.parse().ok()?,
                name: None,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP API port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port assumed for peers whose address carries none
    #[serde(default = "default_port")]
    pub peer_port: u16,

    /// Timeout for outbound HTTP requests
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            peer_port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoints {
    #[serde(default = "default_ams_url")]
    pub ams_url: String,

    #[serde(default = "default_df_url")]
    pub df_url: String,

    #[serde(default = "default_logger_url")]
    pub logger_url: String,

    /// Platform broker, `host[:port]`
    #[serde(default = "default_mqtt_url")]
    pub mqtt_url: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            ams_url: default_ams_url(),
            df_url: default_df_url(),
            logger_url: default_logger_url(),
            mqtt_url: default_mqtt_url(),
        }
    }
}

/// Optional platform integrations. A disabled feature turns the matching
/// agent facade into a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub df: bool,

    #[serde(default)]
    pub mqtt: bool,

    #[serde(default)]
    pub logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Default and per-behavior mailbox capacity
    #[serde(default = "default_thousand")]
    pub mailbox_capacity: usize,

    /// Agency-wide queue of locally produced outgoing messages
    #[serde(default = "default_thousand")]
    pub outgoing_capacity: usize,

    /// Per-peer outbound queue
    #[serde(default = "default_thousand")]
    pub remote_queue_capacity: usize,

    /// Ingress queue in front of each agent's dispatcher
    #[serde(default = "default_agent_inbox_capacity")]
    pub agent_inbox_capacity: usize,

    #[serde(default = "default_custom_update_capacity")]
    pub custom_update_capacity: usize,

    #[serde(default = "default_thousand")]
    pub telemetry_capacity: usize,

    /// Upper bound on messages sent to one peer in a single request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_thousand(),
            outgoing_capacity: default_thousand(),
            remote_queue_capacity: default_thousand(),
            agent_inbox_capacity: default_agent_inbox_capacity(),
            custom_update_capacity: default_custom_update_capacity(),
            telemetry_capacity: default_thousand(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_ams_url() -> String {
    "http://ams:9000".to_string()
}

fn default_df_url() -> String {
    "http://df:12000".to_string()
}

fn default_logger_url() -> String {
    "http://logger:11000".to_string()
}

fn default_mqtt_url() -> String {
    "mqtt:1883".to_string()
}

fn default_thousand() -> usize {
    1000
}

fn default_agent_inbox_capacity() -> usize {
    100
}

fn default_custom_update_capacity() -> usize {
    10
}

fn default_max_batch_size() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn parse_switch(var: &str, val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(
                "Invalid value for {}: '{}'. Expected ON/OFF. Ignoring.",
                var,
                val
            );
            None
        }
    }
}

impl AgencyConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CMAP_AGENCY_CONFIG environment variable
    /// 2. ./agency-config.yaml (working directory)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CMAP_AGENCY_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./agency-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        // Inside the platform the agency identity is encoded in the pod host name
        if let Ok(host) = std::env::var("HOSTNAME") {
            if let Some(identity) = AgencyIdentity::from_hostname(&host) {
                tracing::info!("Environment override: agency identity from HOSTNAME={}", host);
                self.agency.masid = identity.masid;
                self.agency.imid = identity.imid;
                self.agency.id = identity.id;
            }
        }

        let switches: [(&str, &mut bool); 3] = [
            ("CMAP_DF", &mut self.features.df),
            ("CMAP_MQTT", &mut self.features.mqtt),
            ("CMAP_LOGGING", &mut self.features.logging),
        ];
        for (var, flag) in switches {
            if let Ok(val) = std::env::var(var) {
                if let Some(on) = parse_switch(var, &val) {
                    tracing::info!("Environment override: {}={}", var, on);
                    *flag = on;
                }
            }
        }

        if let Ok(url) = std::env::var("CMAP_MQTT_URL") {
            tracing::info!("Environment override: CMAP_MQTT_URL={}", url);
            self.services.mqtt_url = url;
        }

        if let Ok(level) = std::env::var("CMAP_LOG_LEVEL") {
            tracing::info!("Environment override: CMAP_LOG_LEVEL={}", level);
            self.observability.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(name) = &self.agency.name {
            if name.is_empty() {
                anyhow::bail!("agency.name cannot be empty");
            }
        }

        let endpoints = [
            ("services.ams_url", &self.services.ams_url),
            ("services.df_url", &self.services.df_url),
            ("services.logger_url", &self.services.logger_url),
            ("services.mqtt_url", &self.services.mqtt_url),
        ];
        for (key, url) in endpoints {
            if url.is_empty() {
                anyhow::bail!("{} cannot be empty", key);
            }
        }

        let q = &self.queues;
        let capacities = [
            ("queues.mailbox_capacity", q.mailbox_capacity),
            ("queues.outgoing_capacity", q.outgoing_capacity),
            ("queues.remote_queue_capacity", q.remote_queue_capacity),
            ("queues.agent_inbox_capacity", q.agent_inbox_capacity),
            ("queues.custom_update_capacity", q.custom_update_capacity),
            ("queues.telemetry_capacity", q.telemetry_capacity),
            ("queues.max_batch_size", q.max_batch_size),
        ];
        for (key, value) in capacities {
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", key);
            }
        }

        match self.observability.logging.format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("Invalid logging format: '{}'. Must be 'json' or 'text'", other),
        }

        Ok(())
    }
}

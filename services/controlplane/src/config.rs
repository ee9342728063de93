//! Control-plane configuration.
//!
//! # Purpose
//! Reads `COURIER_*` environment variables, then overlays an optional YAML file
//! named by `COURIER_CP_CONFIG`. Every field has a development default so the
//! binary starts against a local broker with no configuration at all.
use anyhow::{Context, Result, bail};
use courier_mgmt::{ManagementConfig, QueueArguments};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    pub management: ManagementSettings,
    pub broker: BrokerSettings,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
}

/// Connection to the broker management API.
#[derive(Debug, Clone)]
pub struct ManagementSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout_ms: u64,
}

/// Broker topology the control plane provisions against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// AMQP host handed back to adaptors and consumers.
    pub amqp_host: String,
    pub amqp_port: u16,
    pub data_vhost: String,
    pub internal_vhost: String,
    pub data_queue: String,
    pub latest_queue: String,
    pub logs_queue: String,
    pub auditing_queue: String,
    pub callback_queue: String,
    pub notification_exchange: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ControlPlaneConfigOverride {
    management_url: Option<String>,
    management_username: Option<String>,
    management_password: Option<String>,
    management_timeout_ms: Option<u64>,
    amqp_host: Option<String>,
    amqp_port: Option<u16>,
    data_vhost: Option<String>,
    internal_vhost: Option<String>,
    data_queue: Option<String>,
    latest_queue: Option<String>,
    logs_queue: Option<String>,
    auditing_queue: Option<String>,
    callback_queue: Option<String>,
    notification_exchange: Option<String>,
    storage: Option<StorageBackend>,
    postgres: Option<PostgresConfig>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            amqp_host: "localhost".to_string(),
            amqp_port: 5671,
            data_vhost: "IUDX".to_string(),
            internal_vhost: "IUDX-INTERNAL".to_string(),
            data_queue: "database".to_string(),
            latest_queue: "redis-latest".to_string(),
            logs_queue: "adaptorLogs".to_string(),
            auditing_queue: "subscriptions-monitoring".to_string(),
            callback_queue: "callback.data".to_string(),
            notification_exchange: "callback.notification".to_string(),
        }
    }
}

impl ManagementSettings {
    pub fn to_client_config(&self) -> ManagementConfig {
        ManagementConfig {
            base_url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            queue_arguments: QueueArguments::default(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl ControlPlaneConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = BrokerSettings::default();
        let management = ManagementSettings {
            url: env_or("COURIER_MGMT_URL", "http://localhost:15672"),
            username: env_or("COURIER_MGMT_USERNAME", "guest"),
            password: env_or("COURIER_MGMT_PASSWORD", "guest"),
            timeout_ms: env_or("COURIER_MGMT_TIMEOUT_MS", "10000")
                .parse()
                .with_context(|| "parse COURIER_MGMT_TIMEOUT_MS")?,
        };
        let broker = BrokerSettings {
            amqp_host: env_or("COURIER_AMQP_HOST", &defaults.amqp_host),
            amqp_port: env_or("COURIER_AMQP_PORT", "5671")
                .parse()
                .with_context(|| "parse COURIER_AMQP_PORT")?,
            data_vhost: env_or("COURIER_DATA_VHOST", &defaults.data_vhost),
            internal_vhost: env_or("COURIER_INTERNAL_VHOST", &defaults.internal_vhost),
            data_queue: env_or("COURIER_DATA_QUEUE", &defaults.data_queue),
            latest_queue: env_or("COURIER_LATEST_QUEUE", &defaults.latest_queue),
            logs_queue: env_or("COURIER_LOGS_QUEUE", &defaults.logs_queue),
            auditing_queue: env_or("COURIER_AUDITING_QUEUE", &defaults.auditing_queue),
            callback_queue: env_or("COURIER_CALLBACK_QUEUE", &defaults.callback_queue),
            notification_exchange: env_or(
                "COURIER_NOTIFICATION_EXCHANGE",
                &defaults.notification_exchange,
            ),
        };
        let storage = match env_or("COURIER_STORAGE", "memory").as_str() {
            "memory" => StorageBackend::Memory,
            "postgres" => StorageBackend::Postgres,
            other => bail!("unsupported COURIER_STORAGE: {other}"),
        };
        let postgres = match std::env::var("COURIER_PG_URL") {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_or("COURIER_PG_MAX_CONNECTIONS", "10")
                    .parse()
                    .with_context(|| "parse COURIER_PG_MAX_CONNECTIONS")?,
                connect_timeout_ms: env_or("COURIER_PG_CONNECT_TIMEOUT_MS", "5000")
                    .parse()
                    .with_context(|| "parse COURIER_PG_CONNECT_TIMEOUT_MS")?,
                acquire_timeout_ms: env_or("COURIER_PG_ACQUIRE_TIMEOUT_MS", "5000")
                    .parse()
                    .with_context(|| "parse COURIER_PG_ACQUIRE_TIMEOUT_MS")?,
            }),
            Err(_) => None,
        };
        Ok(Self {
            management,
            broker,
            storage,
            postgres,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("COURIER_CP_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read COURIER_CP_CONFIG: {path}"))?;
            let override_cfg: ControlPlaneConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse control plane config yaml")?;
            config.apply(override_cfg);
        }
        Ok(config)
    }

    fn apply(&mut self, override_cfg: ControlPlaneConfigOverride) {
        if let Some(value) = override_cfg.management_url {
            self.management.url = value;
        }
        if let Some(value) = override_cfg.management_username {
            self.management.username = value;
        }
        if let Some(value) = override_cfg.management_password {
            self.management.password = value;
        }
        if let Some(value) = override_cfg.management_timeout_ms {
            self.management.timeout_ms = value;
        }
        if let Some(value) = override_cfg.amqp_host {
            self.broker.amqp_host = value;
        }
        if let Some(value) = override_cfg.amqp_port {
            self.broker.amqp_port = value;
        }
        if let Some(value) = override_cfg.data_vhost {
            self.broker.data_vhost = value;
        }
        if let Some(value) = override_cfg.internal_vhost {
            self.broker.internal_vhost = value;
        }
        if let Some(value) = override_cfg.data_queue {
            self.broker.data_queue = value;
        }
        if let Some(value) = override_cfg.latest_queue {
            self.broker.latest_queue = value;
        }
        if let Some(value) = override_cfg.logs_queue {
            self.broker.logs_queue = value;
        }
        if let Some(value) = override_cfg.auditing_queue {
            self.broker.auditing_queue = value;
        }
        if let Some(value) = override_cfg.callback_queue {
            self.broker.callback_queue = value;
        }
        if let Some(value) = override_cfg.notification_exchange {
            self.broker.notification_exchange = value;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = value;
        }
        if let Some(value) = override_cfg.postgres {
            self.postgres = Some(value);
        }
    }
}

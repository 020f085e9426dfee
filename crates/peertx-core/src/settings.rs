//! Local peer settings
//!
//! Loaded from an optional YAML file layered with `PEERTX_`-prefixed
//! environment variables (`PEERTX_PEER__MSP_ID` overrides `peer.msp_id`).

use std::path::Path;

use config::{Config, Environment, File, FileFormat};

use peertx_api::context::PeerConfig;
use peertx_api::error::{Result, TxnError};

pub const ENV_PREFIX: &str = "PEERTX";

const DEFAULT_MSP_CONFIG_PATH: &str = "msp";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Identity of the local peer and the channels the service runs on
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerSettings {
    msp_id: String,
    peer_id: String,
    msp_config_path: String,
    channels: Vec<String>,
    log_level: String,
}

impl PeerSettings {
    pub fn new(msp_id: &str, peer_id: &str) -> Self {
        Self {
            msp_id: msp_id.to_string(),
            peer_id: peer_id.to_string(),
            msp_config_path: DEFAULT_MSP_CONFIG_PATH.to_string(),
            channels: Vec::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }
        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| TxnError::Config(format!("failed to load peer settings: {}", e)))?;

        Self::from_config(&config)
    }

    fn from_config(config: &Config) -> Result<Self> {
        let required = |key: &str| {
            config
                .get_string(key)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| TxnError::Config(format!("missing required setting [{}]", key)))
        };

        Ok(Self {
            msp_id: required("peer.msp_id")?,
            peer_id: required("peer.peer_id")?,
            msp_config_path: config
                .get_string("peer.msp_config_path")
                .unwrap_or(DEFAULT_MSP_CONFIG_PATH.to_string()),
            channels: config.get::<Vec<String>>("peer.channels").unwrap_or_default(),
            log_level: config
                .get_string("log.level")
                .unwrap_or(DEFAULT_LOG_LEVEL.to_string()),
        })
    }

    pub fn with_channels(mut self, channels: &[&str]) -> Self {
        self.channels = channels.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Default `tracing` filter directive
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

impl PeerConfig for PeerSettings {
    fn msp_id(&self) -> &str {
        &self.msp_id
    }

    fn peer_id(&self) -> &str {
        &self.peer_id
    }

    fn msp_config_path(&self) -> &str {
        &self.msp_config_path
    }
}

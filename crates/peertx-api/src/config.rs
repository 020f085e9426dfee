//! Channel-scoped configuration documents and the change-notification contract

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifies a configuration document for one component of an application on one peer
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub msp_id: String,
    pub peer_id: String,
    pub app_name: String,
    pub app_version: String,
    pub component_name: String,
    pub component_version: String,
}

impl Key {
    pub fn peer_component(
        msp_id: &str,
        peer_id: &str,
        app_name: &str,
        app_version: &str,
        component_name: &str,
        component_version: &str,
    ) -> Self {
        Self {
            msp_id: msp_id.to_string(),
            peer_id: peer_id.to_string(),
            app_name: app_name.to_string(),
            app_version: app_version.to_string(),
            component_name: component_name.to_string(),
            component_version: component_version.to_string(),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            self.msp_id,
            self.peer_id,
            self.app_name,
            self.app_version,
            self.component_name,
            self.component_version
        )
    }
}

/// Encoding of a configuration document
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Yaml,
    Other(String),
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Yaml => f.write_str("yaml"),
            Format::Other(format) => f.write_str(format),
        }
    }
}

/// A versioned configuration document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    /// Id of the configuration transaction that last wrote this value
    pub tx_id: String,
    pub format: Format,
    pub config: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Value {
    pub fn new(tx_id: &str, format: Format, config: &str) -> Self {
        Self {
            tx_id: tx_id.to_string(),
            format,
            config: config.to_string(),
            tags: Vec::new(),
        }
    }
}

/// A configuration change notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Key,
    pub value: Value,
}

impl KeyValue {
    pub fn new(key: Key, value: Value) -> Self {
        Self { key, value }
    }

    pub fn app_name(&self) -> &str {
        &self.key.app_name
    }

    pub fn msp_id(&self) -> &str {
        &self.key.msp_id
    }

    pub fn peer_id(&self) -> &str {
        &self.key.peer_id
    }

    pub fn tx_id(&self) -> &str {
        &self.value.tx_id
    }
}

/// Callback invoked for every configuration update
pub type UpdateHandler = Arc<dyn Fn(&KeyValue) + Send + Sync>;

/// External configuration store with change notifications
pub trait ConfigService: Send + Sync {
    fn get(&self, key: &Key) -> Result<Value>;

    fn add_update_handler(&self, handler: UpdateHandler);
}

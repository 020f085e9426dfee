//! Connection profile
//!
//! The profile describes the organizations, peers, orderers and channels a
//! session can reach. It arrives as the `sdk` configuration document in
//! either JSON or YAML.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use peertx_api::config::Format;
use peertx_api::error::{Result, TxnError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSection {
    #[serde(default)]
    pub organization: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(rename = "mspid")]
    pub msp_id: String,
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default, rename = "cryptoPath")]
    pub crypto_path: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSection {
    #[serde(default)]
    pub orderers: Vec<String>,
    #[serde(default)]
    pub peers: HashMap<String, ChannelPeer>,
}

/// Roles a peer plays on a channel; all default to true
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPeer {
    #[serde(default = "enabled")]
    pub endorsing_peer: bool,
    #[serde(default = "enabled")]
    pub chaincode_query: bool,
    #[serde(default = "enabled")]
    pub ledger_query: bool,
    #[serde(default = "enabled")]
    pub event_source: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ChannelPeer {
    fn default() -> Self {
        Self {
            endorsing_peer: true,
            chaincode_query: true,
            ledger_query: true,
            event_source: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub organizations: HashMap<String, Organization>,
    #[serde(default)]
    pub orderers: HashMap<String, Endpoint>,
    #[serde(default)]
    pub peers: HashMap<String, Endpoint>,
    #[serde(default)]
    pub channels: HashMap<String, ChannelSection>,
}

impl ConnectionProfile {
    pub fn parse(raw: &[u8], format: &Format) -> Result<Self> {
        match format {
            Format::Json => serde_json::from_slice(raw)
                .map_err(|e| TxnError::Config(format!("invalid JSON connection profile: {}", e))),
            Format::Yaml => serde_yaml::from_slice(raw)
                .map_err(|e| TxnError::Config(format!("invalid YAML connection profile: {}", e))),
            Format::Other(other) => Err(TxnError::Config(format!(
                "unsupported connection profile format [{}]",
                other
            ))),
        }
    }

    /// Name of the organization whose MSP id is `msp_id`
    pub fn org_for_msp(&self, msp_id: &str) -> Result<&str> {
        let mut names: Vec<&String> = self
            .organizations
            .iter()
            .filter(|(_, org)| org.msp_id == msp_id)
            .map(|(name, _)| name)
            .collect();
        names.sort();

        names.first().map(|name| name.as_str()).ok_or_else(|| {
            TxnError::Config(format!(
                "MSP [{}] is not an organization in connection profile [{}]",
                msp_id, self.name
            ))
        })
    }

    /// URLs of the orderers serving `channel_id`, falling back to every orderer
    pub fn orderer_urls(&self, channel_id: &str) -> Vec<&str> {
        let mut names: Vec<&String> = match self.channels.get(channel_id) {
            Some(channel) if !channel.orderers.is_empty() => channel.orderers.iter().collect(),
            _ => self.orderers.keys().collect(),
        };
        names.sort();

        names
            .into_iter()
            .filter_map(|name| self.orderers.get(name))
            .map(|orderer| orderer.url.as_str())
            .collect()
    }
}

//! Channel client construction from a connection profile

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use peertx_api::config::Format;
use peertx_api::context::{ChannelContext, PeerConfig};
use peertx_api::error::Result;

use crate::client::{ChannelClient, Client};
use crate::profile::ConnectionProfile;

/// Opens a channel session for a user of an organization.
///
/// Implemented by the host on top of its SDK; the session's crypto suite,
/// discovery, orderer connections and event stream all come from here.
#[async_trait]
pub trait ContextFactory: Send + Sync {
    async fn create_context(
        &self,
        channel_id: &str,
        user: &str,
        org: &str,
        profile: &ConnectionProfile,
        peer_config: &dyn PeerConfig,
    ) -> Result<Arc<dyn ChannelContext>>;
}

/// Creates channel clients from the `sdk` configuration document
#[async_trait]
pub trait ClientProvider: Send + Sync {
    async fn create_client(
        &self,
        channel_id: &str,
        user: &str,
        peer_config: &dyn PeerConfig,
        sdk_config: &[u8],
        format: &Format,
    ) -> Result<Arc<dyn ChannelClient>>;
}

/// Parses the connection profile, resolves the local organization and
/// wraps the session opened by the factory in a reference-counted `Client`
pub struct DefaultClientProvider {
    factory: Arc<dyn ContextFactory>,
}

impl DefaultClientProvider {
    pub fn new(factory: Arc<dyn ContextFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ClientProvider for DefaultClientProvider {
    async fn create_client(
        &self,
        channel_id: &str,
        user: &str,
        peer_config: &dyn PeerConfig,
        sdk_config: &[u8],
        format: &Format,
    ) -> Result<Arc<dyn ChannelClient>> {
        let profile = ConnectionProfile::parse(sdk_config, format)?;
        let org = profile.org_for_msp(peer_config.msp_id())?.to_string();

        let context = self
            .factory
            .create_context(channel_id, user, &org, &profile, peer_config)
            .await?;

        info!(
            "[{}] Created channel client for user [{}] of org [{}]",
            channel_id, user, org
        );

        Ok(Arc::new(Client::new(context)))
    }
}

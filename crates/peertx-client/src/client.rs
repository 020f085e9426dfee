//! Reference-counted channel client
//!
//! A `Client` owns one channel session. Callers take a `Lease` for the
//! duration of each operation; closing the client stops new leases and
//! releases the session once the last lease is dropped.

use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use peertx_api::context::{ChannelContext, compute_txn_id};
use peertx_api::error::{Result, TxnError};
use peertx_api::handler::{ClientContext, HandlerChain, InvokeRequest, RequestContext, RequestOptions};
use peertx_api::model::{Response, SignedProposal};
use peertx_api::peer::PeerRef;
use peertx_api::status::{Group, client};

use crate::reference::Counter;
use crate::retry::with_retry;

/// Dispatch surface of a channel session
#[async_trait]
pub trait ChannelClient: Send + Sync {
    fn channel_id(&self) -> &str;

    /// Register an in-flight operation. Fails once the client is closing.
    fn acquire(&self) -> Result<()>;

    /// Complete an operation registered with `acquire`
    fn release(&self);

    /// Run `chain` for `request`, retrying the whole chain per `options.retry`
    async fn invoke_handler(
        &self,
        chain: &HandlerChain,
        request: InvokeRequest,
        options: RequestOptions,
    ) -> Result<Response>;

    /// Transaction id for `nonce` and this client's identity
    fn compute_txn_id(&self, nonce: &[u8]) -> Result<String>;

    fn signing_identity(&self) -> Result<Vec<u8>>;

    fn get_peer(&self, endpoint: &str) -> Result<PeerRef>;

    fn verify_proposal_signature(&self, signed_proposal: &SignedProposal) -> Result<()>;

    /// Stop admitting operations and release the session when idle
    fn close(&self);
}

/// An acquired client, released on drop
pub struct Lease {
    client: Arc<dyn ChannelClient>,
}

impl Lease {
    pub fn acquire(client: Arc<dyn ChannelClient>) -> Result<Self> {
        client.acquire()?;
        Ok(Self { client })
    }
}

impl Deref for Lease {
    type Target = dyn ChannelClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.client.release();
    }
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

/// Channel client backed by a `ChannelContext`
pub struct Client {
    context: Arc<dyn ChannelContext>,
    counter: Counter,
}

impl Client {
    pub fn new(context: Arc<dyn ChannelContext>) -> Self {
        let session = context.clone();
        let counter = Counter::new(move || {
            debug!("[{}] Closing channel session", session.channel_id());
            session.close();
        });

        Self { context, counter }
    }

    /// Number of operations currently in flight
    pub fn in_flight(&self) -> usize {
        self.counter.count()
    }

    pub fn is_closed(&self) -> bool {
        self.counter.is_closed()
    }
}

#[async_trait]
impl ChannelClient for Client {
    fn channel_id(&self) -> &str {
        self.context.channel_id()
    }

    fn acquire(&self) -> Result<()> {
        self.counter.acquire().map(|_| ())
    }

    fn release(&self) {
        if let Err(e) = self.counter.release() {
            warn!("[{}] {}", self.context.channel_id(), e);
        }
    }

    async fn invoke_handler(
        &self,
        chain: &HandlerChain,
        request: InvokeRequest,
        options: RequestOptions,
    ) -> Result<Response> {
        let client_context = &ClientContext::new(self.context.clone());
        let request = &request;
        let opts = &options;

        with_retry(&options.retry, options.before_retry.as_ref(), move || {
            let mut ctx = RequestContext::new(request.clone(), opts);
            async move {
                chain.run(&mut ctx, client_context).await?;
                Ok(ctx.response)
            }
        })
        .await
    }

    fn compute_txn_id(&self, nonce: &[u8]) -> Result<String> {
        let creator = self.context.identity().serialize()?;
        compute_txn_id(self.context.crypto_suite(), nonce, &creator)
    }

    fn signing_identity(&self) -> Result<Vec<u8>> {
        self.context.identity().serialize()
    }

    fn get_peer(&self, endpoint: &str) -> Result<PeerRef> {
        let wanted = strip_scheme(endpoint);

        self.context
            .discovery()
            .peers()?
            .into_iter()
            .find(|peer| strip_scheme(peer.url()).eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TxnError::PeerNotFound(endpoint.to_string()))
    }

    fn verify_proposal_signature(&self, signed_proposal: &SignedProposal) -> Result<()> {
        let proposal = &signed_proposal.proposal;
        if proposal.creator.is_empty() {
            return Err(TxnError::InvalidArgument(
                "proposal creator is missing".to_string(),
            ));
        }

        let crypto = self.context.crypto_suite();
        crypto
            .verify(
                &proposal.creator,
                &proposal.to_bytes()?,
                &signed_proposal.signature,
            )
            .map_err(|e| {
                TxnError::status(
                    Group::EndorserClient,
                    client::SIGNATURE_VERIFICATION_FAILED,
                    format!("proposal signature verification failed: {}", e),
                )
            })?;

        let expected = compute_txn_id(crypto, &proposal.nonce, &proposal.creator)?;
        if expected != proposal.tx_id {
            return Err(TxnError::InvalidTxnId);
        }

        Ok(())
    }

    fn close(&self) {
        self.counter.shutdown();
    }
}

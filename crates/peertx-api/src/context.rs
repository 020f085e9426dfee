//! Collaborator contracts provided by the channel session
//!
//! The concrete cryptographic suite, identity, discovery, ordering and
//! event implementations live outside this workspace; the transaction
//! service only talks to them through these traits.

use std::sync::Arc;

use crate::error::Result;
use crate::model::{
    ProposalResponse, SignedProposal, TransactionEnvelope, TxValidationCode,
};
use crate::peer::PeerRef;

/// Serializes the identity the session acts as
pub trait IdentitySerializer: Send + Sync {
    fn serialize(&self) -> Result<Vec<u8>>;
}

/// Cryptographic operations with a fixed, configured digest algorithm
pub trait CryptoSuite: Send + Sync {
    fn hash(&self, msg: &[u8]) -> Result<Vec<u8>>;

    /// Sign with the session identity's key
    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>>;

    /// Verify a signature made by the given serialized identity
    fn verify(&self, identity: &[u8], msg: &[u8], signature: &[u8]) -> Result<()>;
}

/// Enumerates the peers currently reachable on the channel
pub trait DiscoveryService: Send + Sync {
    fn peers(&self) -> Result<Vec<PeerRef>>;
}

/// Ordering service endpoint
#[async_trait::async_trait]
pub trait Orderer: Send + Sync {
    fn url(&self) -> &str;

    async fn broadcast(&self, envelope: &TransactionEnvelope) -> Result<()>;
}

/// Delivers the final validation code of committed transactions
#[async_trait::async_trait]
pub trait CommitEvents: Send + Sync {
    async fn commit_status(&self, tx_id: &str) -> Result<TxValidationCode>;
}

/// An open session on a channel
pub trait ChannelContext: Send + Sync {
    fn channel_id(&self) -> &str;

    fn identity(&self) -> &dyn IdentitySerializer;

    fn crypto_suite(&self) -> &dyn CryptoSuite;

    fn discovery(&self) -> &dyn DiscoveryService;

    fn orderers(&self) -> Vec<Arc<dyn Orderer>>;

    fn commit_events(&self) -> &dyn CommitEvents;

    /// Release the session and its connections
    fn close(&self);
}

/// Local peer identity used to scope configuration
pub trait PeerConfig: Send + Sync {
    fn msp_id(&self) -> &str;

    fn peer_id(&self) -> &str;

    fn msp_config_path(&self) -> &str;
}

/// Validates a set of proposal responses against a signed proposal
pub trait ProposalResponseValidator: Send + Sync {
    /// Returns the validation code. An error is returned with a non-valid
    /// code when the responses could not be evaluated at all.
    fn validate(
        &self,
        signed_proposal: &SignedProposal,
        responses: &[ProposalResponse],
    ) -> Result<TxValidationCode>;
}

/// Computes a transaction id as the hex-encoded hash of `nonce || creator`
pub fn compute_txn_id(crypto: &dyn CryptoSuite, nonce: &[u8], creator: &[u8]) -> Result<String> {
    let mut msg = Vec::with_capacity(nonce.len() + creator.len());
    msg.extend_from_slice(nonce);
    msg.extend_from_slice(creator);

    let digest = crypto.hash(&msg)?;

    Ok(const_hex::encode(digest))
}

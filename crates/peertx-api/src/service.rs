//! The surface the transaction service exposes to its host

use crate::error::Result;
use crate::model::{ProposalResponse, Response, SignedProposal, TxValidationCode};
use crate::peer::PeerRef;
use crate::request::{CommitRequest, Request};

/// Collects endorsements and (optionally) sends the endorsed transaction to the orderer
#[async_trait::async_trait]
pub trait TxnService: Send + Sync {
    /// Collects endorsements according to chaincode policy
    async fn endorse(&self, req: &Request) -> Result<Response>;

    /// Collects endorsements and commits the transaction if the commit type calls for it.
    /// Returns the response and whether a commit was performed.
    async fn endorse_and_commit(&self, req: &Request) -> Result<(Response, bool)>;

    /// Commits previously collected endorsements
    async fn commit_endorsements(&self, req: &CommitRequest) -> Result<(Response, bool)>;

    /// Serialized identity of the proposal signer
    fn signing_identity(&self) -> Result<Vec<u8>>;

    /// The discovered peer matching the given endpoint
    fn get_peer(&self, endpoint: &str) -> Result<PeerRef>;

    fn verify_proposal_signature(&self, signed_proposal: &SignedProposal) -> Result<()>;

    fn validate_proposal_responses(
        &self,
        signed_proposal: &SignedProposal,
        responses: &[ProposalResponse],
    ) -> Result<TxValidationCode>;

    /// Stops admitting calls and releases the live client once idle
    fn close(&self);
}

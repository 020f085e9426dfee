use async_trait::async_trait;
use futures::future::join_all;
use rand::RngCore;
use tracing::{debug, warn};

use peertx_api::context::compute_txn_id;
use peertx_api::error::{Result, TxnError};
use peertx_api::handler::{ClientContext, Flow, Handler, RequestContext};
use peertx_api::model::{Proposal, SignedProposal};

/// Length of a generated proposal nonce
pub const NONCE_SIZE: usize = 24;

pub fn new_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

/// Builds and signs the proposal, sends it to every selected endorser in
/// parallel and records their responses.
pub struct EndorsementHandler;

impl EndorsementHandler {
    fn signed_proposal(request: &RequestContext, client: &ClientContext) -> Result<SignedProposal> {
        let channel = &client.channel;
        let creator = channel.identity().serialize()?;
        let nonce = match &request.request.nonce {
            Some(nonce) => nonce.clone(),
            None => new_nonce(),
        };
        let tx_id = compute_txn_id(channel.crypto_suite(), &nonce, &creator)?;

        let invoke = &request.request;
        let proposal = Proposal {
            tx_id,
            channel_id: client.channel_id().to_string(),
            chaincode_id: invoke.chaincode_id.clone(),
            fcn: invoke.fcn.clone(),
            args: invoke.args.clone(),
            nonce,
            creator,
            transient_map: invoke.transient_map.clone(),
            invocation_chain: invoke.invocation_chain.clone(),
        };
        let signature = channel.crypto_suite().sign(&proposal.to_bytes()?)?;

        Ok(SignedProposal {
            proposal,
            signature,
        })
    }
}

#[async_trait]
impl Handler for EndorsementHandler {
    fn name(&self) -> &'static str {
        "endorsement"
    }

    async fn handle(&self, request: &mut RequestContext, client: &ClientContext) -> Result<Flow> {
        let signed = Self::signed_proposal(request, client)?;

        let results = join_all(
            request
                .targets
                .iter()
                .map(|peer| peer.process_proposal(&signed)),
        )
        .await;

        let mut responses = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for (peer, result) in request.targets.iter().zip(results) {
            match result {
                Ok(response) => responses.push(response),
                Err(e) => {
                    warn!(
                        "[{}] Endorsement from [{}] failed: {}",
                        client.channel_id(),
                        peer.url(),
                        e
                    );
                    errors.push(e);
                }
            }
        }

        match errors.len() {
            0 => {}
            1 => return Err(errors.remove(0)),
            _ => return Err(TxnError::Multiple(errors)),
        }

        debug!(
            "[{}] Collected {} endorsement(s) for txn [{}]",
            client.channel_id(),
            responses.len(),
            signed.proposal.tx_id
        );

        let response = &mut request.response;
        response.tx_id = signed.proposal.tx_id.clone();
        if let Some(first) = responses.first() {
            response.payload = first.payload.clone();
            response.chaincode_status = first.chaincode_status;
        }
        response.responses = responses;
        response.proposal = Some(signed.proposal);

        Ok(Flow::Continue)
    }
}

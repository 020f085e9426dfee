use async_trait::async_trait;
use tracing::debug;

use peertx_api::error::{Result, TxnError};
use peertx_api::handler::{ClientContext, Flow, Handler, RequestContext};
use peertx_api::status::{Group, client};

/// Selects the endorsers a proposal is sent to.
///
/// Explicit targets are used as given. Otherwise the channel's discovered
/// peers are taken, narrowed by the request's target filter.
pub struct ProposalProcessorHandler;

#[async_trait]
impl Handler for ProposalProcessorHandler {
    fn name(&self) -> &'static str {
        "proposal_processor"
    }

    async fn handle(&self, request: &mut RequestContext, client: &ClientContext) -> Result<Flow> {
        if request.targets.is_empty() {
            let peers = client.channel.discovery().peers()?;
            request.targets = match &request.target_filter {
                Some(filter) => peers
                    .into_iter()
                    .filter(|peer| filter.accept(peer.as_ref()))
                    .collect(),
                None => peers,
            };
        }

        if request.targets.is_empty() {
            return Err(TxnError::status(
                Group::Client,
                client::NO_PEERS_FOUND,
                "no endorsing peers selected for proposal",
            ));
        }

        debug!(
            "[{}] Selected {} endorser(s) for chaincode [{}]",
            client.channel_id(),
            request.targets.len(),
            request.request.chaincode_id
        );

        Ok(Flow::Continue)
    }
}

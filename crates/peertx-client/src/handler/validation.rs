use async_trait::async_trait;

use peertx_api::error::{Result, TxnError};
use peertx_api::handler::{ClientContext, Flow, Handler, RequestContext};
use peertx_api::model::ProposalResponse;
use peertx_api::status::{Group, client, server};

/// Checks endorser statuses and that every endorser produced the same result
pub fn validate_responses(responses: &[ProposalResponse]) -> Result<()> {
    let Some(first) = responses.first() else {
        return Err(TxnError::status(
            Group::EndorserClient,
            client::MISSING_ENDORSEMENT,
            "no proposal responses received",
        ));
    };

    for response in responses {
        if response.status < server::SUCCESS || response.status >= server::BAD_REQUEST {
            return Err(TxnError::status(
                Group::EndorserServer,
                response.status,
                format!("[{}] {}", response.endorser, response.message),
            ));
        }
        if response.chaincode_status >= server::BAD_REQUEST {
            return Err(TxnError::status(
                Group::Chaincode,
                response.chaincode_status,
                format!("[{}] {}", response.endorser, response.message),
            ));
        }
        if response.response_payload != first.response_payload {
            return Err(TxnError::status(
                Group::EndorserClient,
                client::ENDORSEMENT_MISMATCH,
                format!(
                    "proposal response from [{}] does not match response from [{}]",
                    response.endorser, first.endorser
                ),
            ));
        }
    }

    Ok(())
}

/// Fails the chain unless the collected responses agree and succeeded
///
/// Only status and payload agreement are checked here. Whether the set of
/// endorsers satisfies the chaincode's endorsement policy is decided by
/// target selection, which asks discovery for a satisfying peer group, and by
/// callers through the service's `ProposalResponseValidator`.
pub struct EndorsementValidationHandler;

#[async_trait]
impl Handler for EndorsementValidationHandler {
    fn name(&self) -> &'static str {
        "endorsement_validation"
    }

    async fn handle(&self, request: &mut RequestContext, _client: &ClientContext) -> Result<Flow> {
        validate_responses(&request.response.responses)?;
        Ok(Flow::Continue)
    }
}

/// Verifies each endorser's signature over its response payload
pub struct SignatureValidationHandler;

#[async_trait]
impl Handler for SignatureValidationHandler {
    fn name(&self) -> &'static str {
        "signature_validation"
    }

    async fn handle(&self, request: &mut RequestContext, client: &ClientContext) -> Result<Flow> {
        let crypto = client.channel.crypto_suite();

        for response in &request.response.responses {
            let endorsement = response.endorsement.as_ref().ok_or_else(|| {
                TxnError::status(
                    Group::EndorserClient,
                    client::MISSING_ENDORSEMENT,
                    format!("missing endorsement in response from [{}]", response.endorser),
                )
            })?;

            let msg = endorsement.signed_bytes(&response.response_payload);
            crypto
                .verify(&endorsement.endorser, &msg, &endorsement.signature)
                .map_err(|e| {
                    TxnError::status(
                        Group::EndorserClient,
                        client::SIGNATURE_VERIFICATION_FAILED,
                        format!("signature validation failed for [{}]: {}", response.endorser, e),
                    )
                })?;
        }

        Ok(Flow::Continue)
    }
}

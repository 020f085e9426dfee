use async_trait::async_trait;
use rand::seq::IndexedRandom;
use tracing::{debug, info};

use peertx_api::error::{Result, TxnError};
use peertx_api::handler::{ClientContext, Flow, Handler, RequestContext};
use peertx_api::model::{Response, TransactionEnvelope, TxRwSet};
use peertx_api::request::{CommitType, Namespace};
use peertx_api::status::Group;

/// Returns true if the rwset writes to anything outside the ignored namespaces.
///
/// An ignored namespace without collections hides all of its writes. One
/// with collections only hides writes to those private collections.
pub fn has_writes(rwset: &TxRwSet, ignore: &[Namespace]) -> bool {
    rwset.ns_rwsets.iter().any(|ns| {
        let ignored = ignore.iter().find(|i| i.name == ns.namespace);
        match ignored {
            Some(i) if i.collections.is_empty() => false,
            Some(i) => {
                !ns.writes.is_empty()
                    || ns.collections.iter().any(|c| {
                        !c.hashed_writes.is_empty() && !i.collections.contains(&c.collection_name)
                    })
            }
            None => {
                !ns.writes.is_empty() || ns.collections.iter().any(|c| !c.hashed_writes.is_empty())
            }
        }
    })
}

/// Decides whether the endorsed transaction goes to the orderer
pub struct CheckForCommitHandler {
    pub ignore_namespaces: Vec<Namespace>,
    pub commit_type: CommitType,
}

impl CheckForCommitHandler {
    pub fn new(ignore_namespaces: Vec<Namespace>, commit_type: CommitType) -> Self {
        Self {
            ignore_namespaces,
            commit_type,
        }
    }
}

#[async_trait]
impl Handler for CheckForCommitHandler {
    fn name(&self) -> &'static str {
        "check_for_commit"
    }

    async fn handle(&self, request: &mut RequestContext, client: &ClientContext) -> Result<Flow> {
        let should_commit = match self.commit_type {
            CommitType::NoCommit => false,
            CommitType::Commit => true,
            CommitType::CommitOnWrite => request
                .response
                .responses
                .first()
                .is_some_and(|r| has_writes(&r.rwset, &self.ignore_namespaces)),
        };

        if !should_commit {
            debug!(
                "[{}] Not committing txn [{}] ({:?})",
                client.channel_id(),
                request.response.tx_id,
                self.commit_type
            );
            return Ok(Flow::Stop);
        }

        request.should_commit = true;
        Ok(Flow::Continue)
    }
}

/// Sends the endorsed transaction to an orderer. Unless asynchronous, waits
/// for the transaction's validation code.
pub struct CommitHandler {
    pub async_commit: bool,
}

impl CommitHandler {
    pub fn new(async_commit: bool) -> Self {
        Self { async_commit }
    }

    fn envelope(response: &Response, client: &ClientContext) -> Result<TransactionEnvelope> {
        let proposal = response.proposal.clone().ok_or_else(|| {
            TxnError::InvalidArgument("endorsement response carries no proposal".to_string())
        })?;
        let first = response.responses.first().ok_or_else(|| {
            TxnError::InvalidArgument("endorsement response carries no proposal responses".to_string())
        })?;

        let endorsements = response
            .responses
            .iter()
            .map(|r| {
                r.endorsement.clone().ok_or_else(|| {
                    TxnError::InvalidArgument(format!(
                        "proposal response from [{}] has no endorsement",
                        r.endorser
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut envelope = TransactionEnvelope {
            tx_id: proposal.tx_id.clone(),
            channel_id: client.channel_id().to_string(),
            proposal,
            response_payload: first.response_payload.clone(),
            endorsements,
            signature: Vec::new(),
        };
        envelope.signature = client
            .channel
            .crypto_suite()
            .sign(&serde_json::to_vec(&envelope)?)?;

        Ok(envelope)
    }
}

#[async_trait]
impl Handler for CommitHandler {
    fn name(&self) -> &'static str {
        "commit"
    }

    async fn handle(&self, request: &mut RequestContext, client: &ClientContext) -> Result<Flow> {
        let envelope = Self::envelope(&request.response, client)?;

        let orderer = {
            let orderers = client.channel.orderers();
            orderers.choose(&mut rand::rng()).cloned()
        }
        .ok_or_else(|| {
            TxnError::Config(format!(
                "no orderers configured for channel [{}]",
                client.channel_id()
            ))
        })?;

        debug!(
            "[{}] Broadcasting txn [{}] to orderer [{}]",
            client.channel_id(),
            envelope.tx_id,
            orderer.url()
        );
        orderer.broadcast(&envelope).await?;

        if !self.async_commit {
            let code = client
                .channel
                .commit_events()
                .commit_status(&envelope.tx_id)
                .await?;
            request.response.tx_validation_code = Some(code);
            if !code.is_valid() {
                return Err(TxnError::status(
                    Group::EventServer,
                    code.code(),
                    format!("received invalid transaction [{}]: {}", envelope.tx_id, code),
                ));
            }
            info!("[{}] Txn [{}] committed", client.channel_id(), envelope.tx_id);
        }

        request.response.committed = true;
        Ok(Flow::Continue)
    }
}

/// Starts a chain from an already endorsed response
pub struct PreEndorsedHandler {
    pub response: Response,
}

impl PreEndorsedHandler {
    pub fn new(response: Response) -> Self {
        Self { response }
    }
}

#[async_trait]
impl Handler for PreEndorsedHandler {
    fn name(&self) -> &'static str {
        "pre_endorsed"
    }

    async fn handle(&self, request: &mut RequestContext, _client: &ClientContext) -> Result<Flow> {
        request.response = self.response.clone();
        request.response.committed = false;
        Ok(Flow::Continue)
    }
}

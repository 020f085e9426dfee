//! Requests accepted by the transaction service

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TxnError};
use crate::handler::{HandlerChain, InvokeRequest};
use crate::model::{ChaincodeCall, Response};
use crate::peer::{PeerFilter, PeerRef};

/// Decides whether an endorsed transaction is sent to the orderer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitType {
    /// Commit only if the simulation produced writes outside the ignored namespaces
    #[default]
    CommitOnWrite,
    /// Always commit
    Commit,
    /// Never commit
    NoCommit,
}

/// A namespace whose writes do not count toward the commit-on-write decision.
/// With no collections listed the whole namespace is ignored, otherwise only
/// the named private data collections are.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub collections: Vec<String>,
}

impl Namespace {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            collections: Vec::new(),
        }
    }

    pub fn with_collections(mut self, collections: &[&str]) -> Self {
        self.collections = collections.iter().map(|c| c.to_string()).collect();
        self
    }
}

/// A request to invoke a chaincode function
#[derive(Clone, Default)]
pub struct Request {
    pub chaincode_id: String,
    /// Function name followed by its arguments
    pub args: Vec<Vec<u8>>,
    pub transient_data: BTreeMap<String, Vec<u8>>,
    /// Explicit endorsers; discovery is used when empty
    pub targets: Vec<PeerRef>,
    pub peer_filter: Option<Arc<dyn PeerFilter>>,
    /// Overrides the built-in chain for this call
    pub handler: Option<HandlerChain>,
    pub transaction_id: String,
    pub nonce: Vec<u8>,
    pub invocation_chain: Vec<ChaincodeCall>,
    pub commit_type: CommitType,
    pub async_commit: bool,
    pub ignore_namespaces: Vec<Namespace>,
}

impl Request {
    pub fn new(chaincode_id: &str, fcn: &str, args: &[&str]) -> Self {
        let mut all_args = vec![fcn.as_bytes().to_vec()];
        all_args.extend(args.iter().map(|a| a.as_bytes().to_vec()));

        Self {
            chaincode_id: chaincode_id.to_string(),
            args: all_args,
            ..Default::default()
        }
    }

    pub fn with_txn_id(mut self, transaction_id: &str, nonce: &[u8]) -> Self {
        self.transaction_id = transaction_id.to_string();
        self.nonce = nonce.to_vec();
        self
    }

    pub fn with_commit_type(mut self, commit_type: CommitType) -> Self {
        self.commit_type = commit_type;
        self
    }

    /// Converts to the dispatch-layer request; `args[0]` is the function name
    pub fn to_invoke_request(&self) -> Result<InvokeRequest> {
        let (fcn, args) = self
            .args
            .split_first()
            .ok_or_else(|| TxnError::InvalidArgument("function name is required".to_string()))?;

        Ok(InvokeRequest {
            chaincode_id: self.chaincode_id.clone(),
            fcn: String::from_utf8_lossy(fcn).into_owned(),
            args: args.to_vec(),
            transient_map: self.transient_data.clone(),
            invocation_chain: self.invocation_chain.clone(),
            nonce: (!self.nonce.is_empty()).then(|| self.nonce.clone()),
        })
    }
}

/// A request to commit an already endorsed response
#[derive(Clone, Default)]
pub struct CommitRequest {
    pub endorsement_response: Response,
    pub handler: Option<HandlerChain>,
    pub commit_type: CommitType,
    pub async_commit: bool,
    pub ignore_namespaces: Vec<Namespace>,
}

impl CommitRequest {
    pub fn new(endorsement_response: Response) -> Self {
        Self {
            endorsement_response,
            ..Default::default()
        }
    }
}

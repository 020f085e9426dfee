//! Proposal, endorsement and transaction model types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A chaincode (and the private collections it touches) in the invocation chain
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaincodeCall {
    pub chaincode_name: String,
    pub collections: Vec<String>,
}

impl ChaincodeCall {
    pub fn new(chaincode_name: &str) -> Self {
        Self {
            chaincode_name: chaincode_name.to_string(),
            collections: Vec::new(),
        }
    }

    pub fn with_collections(mut self, collections: &[&str]) -> Self {
        self.collections = collections.iter().map(|c| c.to_string()).collect();
        self
    }
}

/// A transaction proposal sent to endorsers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub tx_id: String,
    pub channel_id: String,
    pub chaincode_id: String,
    pub fcn: String,
    pub args: Vec<Vec<u8>>,
    pub nonce: Vec<u8>,
    pub creator: Vec<u8>,
    #[serde(default)]
    pub transient_map: BTreeMap<String, Vec<u8>>,
    #[serde(default)]
    pub invocation_chain: Vec<ChaincodeCall>,
}

impl Proposal {
    /// Canonical bytes covered by the proposal signature
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// A proposal together with the creator's signature over its bytes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedProposal {
    pub proposal: Proposal,
    pub signature: Vec<u8>,
}

/// An endorser's signature over a proposal response payload
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    /// Serialized identity of the endorser
    pub endorser: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Endorsement {
    /// Bytes the endorser signs: the response payload followed by its identity
    pub fn signed_bytes(&self, payload: &[u8]) -> Vec<u8> {
        let mut msg = Vec::with_capacity(payload.len() + self.endorser.len());
        msg.extend_from_slice(payload);
        msg.extend_from_slice(&self.endorser);
        msg
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvRead {
    pub key: String,
    pub version: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvWrite {
    pub key: String,
    pub value: Vec<u8>,
    pub is_delete: bool,
}

/// Hashed writes to a private data collection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRwSet {
    pub collection_name: String,
    pub hashed_writes: Vec<Vec<u8>>,
}

/// Reads and writes a chaincode namespace produced during simulation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsRwSet {
    pub namespace: String,
    pub reads: Vec<KvRead>,
    pub writes: Vec<KvWrite>,
    #[serde(default)]
    pub collections: Vec<CollectionRwSet>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRwSet {
    pub ns_rwsets: Vec<NsRwSet>,
}

/// The response of a single endorser to a proposal
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalResponse {
    /// URL of the endorser that produced the response
    pub endorser: String,
    /// Peer response status
    pub status: i32,
    pub message: String,
    /// Status returned by the chaincode
    pub chaincode_status: i32,
    /// Chaincode return value
    pub payload: Vec<u8>,
    /// Bytes covered by the endorsement signature; identical across endorsers for a valid proposal
    pub response_payload: Vec<u8>,
    pub endorsement: Option<Endorsement>,
    pub rwset: TxRwSet,
}

/// Final validation status of a committed transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxValidationCode {
    Valid,
    NilEnvelope,
    DuplicateTxid,
    BadPayload,
    BadProposalTxid,
    EndorsementPolicyFailure,
    MvccReadConflict,
    PhantomReadConflict,
    InvalidOtherReason,
}

impl TxValidationCode {
    pub fn code(self) -> i32 {
        match self {
            TxValidationCode::Valid => 0,
            TxValidationCode::NilEnvelope => 1,
            TxValidationCode::BadPayload => 2,
            TxValidationCode::BadProposalTxid => 8,
            TxValidationCode::DuplicateTxid => 9,
            TxValidationCode::EndorsementPolicyFailure => 10,
            TxValidationCode::MvccReadConflict => 11,
            TxValidationCode::PhantomReadConflict => 12,
            TxValidationCode::InvalidOtherReason => 255,
        }
    }

    pub fn is_valid(self) -> bool {
        self == TxValidationCode::Valid
    }
}

impl std::fmt::Display for TxValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// An endorsed transaction ready for ordering
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub tx_id: String,
    pub channel_id: String,
    pub proposal: Proposal,
    pub response_payload: Vec<u8>,
    pub endorsements: Vec<Endorsement>,
    pub signature: Vec<u8>,
}

/// Result of an invocation through a handler chain
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    pub tx_id: String,
    /// The proposal that was endorsed (required to commit)
    pub proposal: Option<Proposal>,
    pub payload: Vec<u8>,
    pub chaincode_status: i32,
    pub responses: Vec<ProposalResponse>,
    /// Validation code, set once a synchronous commit completes
    pub tx_validation_code: Option<TxValidationCode>,
    /// Whether the transaction was submitted for commit during the call
    pub committed: bool,
}

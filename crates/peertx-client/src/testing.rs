//! In-memory channel session used by unit tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use peertx_api::context::{
    ChannelContext, CommitEvents, CryptoSuite, DiscoveryService, IdentitySerializer, Orderer,
};
use peertx_api::error::{Result, TxnError};
use peertx_api::model::{
    Endorsement, KvWrite, NsRwSet, ProposalResponse, SignedProposal, TransactionEnvelope,
    TxRwSet, TxValidationCode,
};
use peertx_api::peer::{Peer, PeerRef};
use peertx_api::status::{Group, server};

pub fn sign_as(identity: &[u8], msg: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(identity);
    hasher.update(msg);
    hasher.finalize().to_vec()
}

pub struct MockIdentity(pub Vec<u8>);

impl IdentitySerializer for MockIdentity {
    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// SHA-256 suite where a signature is `sha256(identity || msg)`
pub struct MockCrypto {
    pub identity: Vec<u8>,
}

impl CryptoSuite for MockCrypto {
    fn hash(&self, msg: &[u8]) -> Result<Vec<u8>> {
        Ok(Sha256::digest(msg).to_vec())
    }

    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        Ok(sign_as(&self.identity, msg))
    }

    fn verify(&self, identity: &[u8], msg: &[u8], signature: &[u8]) -> Result<()> {
        if sign_as(identity, msg) == signature {
            Ok(())
        } else {
            Err(anyhow::anyhow!("signature mismatch").into())
        }
    }
}

/// A peer that endorses with a fixed rwset, optionally failing the first calls
pub struct MockPeer {
    pub url: String,
    pub msp_id: String,
    pub rwset: TxRwSet,
    pub failures: Mutex<VecDeque<TxnError>>,
    pub calls: AtomicUsize,
    pub tamper: AtomicBool,
}

impl MockPeer {
    pub fn new(url: &str, msp_id: &str) -> Self {
        Self {
            url: url.to_string(),
            msp_id: msp_id.to_string(),
            rwset: TxRwSet::default(),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            tamper: AtomicBool::new(false),
        }
    }

    pub fn with_writes(mut self, namespace: &str, key: &str) -> Self {
        self.rwset.ns_rwsets.push(NsRwSet {
            namespace: namespace.to_string(),
            writes: vec![KvWrite {
                key: key.to_string(),
                value: b"v".to_vec(),
                is_delete: false,
            }],
            ..Default::default()
        });
        self
    }

    pub fn fail_with(self, err: TxnError) -> Self {
        self.failures.lock().push_back(err);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Peer for MockPeer {
    fn url(&self) -> &str {
        &self.url
    }

    fn msp_id(&self) -> &str {
        &self.msp_id
    }

    async fn process_proposal(&self, proposal: &SignedProposal) -> Result<ProposalResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.failures.lock().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }

        let proposal = &proposal.proposal;
        let response_payload = format!("{}:{}:{}", proposal.tx_id, proposal.chaincode_id, proposal.fcn)
            .into_bytes();
        let mut endorsement = Endorsement {
            endorser: format!("{}@{}", self.msp_id, self.url).into_bytes(),
            signature: Vec::new(),
        };
        endorsement.signature = sign_as(
            &endorsement.endorser,
            &endorsement.signed_bytes(&response_payload),
        );
        if self.tamper.load(Ordering::SeqCst) {
            endorsement.signature.reverse();
        }

        Ok(ProposalResponse {
            endorser: self.url.clone(),
            status: server::SUCCESS,
            message: String::new(),
            chaincode_status: server::SUCCESS,
            payload: b"result".to_vec(),
            response_payload,
            endorsement: Some(endorsement),
            rwset: self.rwset.clone(),
        })
    }
}

pub struct MockDiscovery {
    pub peers: Vec<PeerRef>,
}

impl DiscoveryService for MockDiscovery {
    fn peers(&self) -> Result<Vec<PeerRef>> {
        Ok(self.peers.clone())
    }
}

/// An orderer that fails the first `failures` broadcasts with 503
#[derive(Default)]
pub struct MockOrderer {
    pub failures: AtomicUsize,
    pub broadcasts: Mutex<Vec<TransactionEnvelope>>,
    pub attempts: AtomicUsize,
}

impl MockOrderer {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl Orderer for MockOrderer {
    fn url(&self) -> &str {
        "orderer.example.com:7050"
    }

    async fn broadcast(&self, envelope: &TransactionEnvelope) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TxnError::status(
                Group::OrdererServer,
                server::SERVICE_UNAVAILABLE,
                "orderer unavailable",
            ));
        }
        self.broadcasts.lock().push(envelope.clone());
        Ok(())
    }
}

pub struct MockEvents {
    pub code: Mutex<TxValidationCode>,
}

#[async_trait::async_trait]
impl CommitEvents for MockEvents {
    async fn commit_status(&self, _tx_id: &str) -> Result<TxValidationCode> {
        Ok(*self.code.lock())
    }
}

pub struct MockChannel {
    pub channel_id: String,
    pub identity: MockIdentity,
    pub crypto: MockCrypto,
    pub discovery: MockDiscovery,
    pub orderers: Vec<Arc<dyn Orderer>>,
    pub events: MockEvents,
    pub closed: AtomicUsize,
}

impl MockChannel {
    pub fn new(peers: Vec<PeerRef>, orderer: Arc<MockOrderer>) -> Self {
        let identity = b"Org1MSP:user1".to_vec();
        Self {
            channel_id: "mychannel".to_string(),
            identity: MockIdentity(identity.clone()),
            crypto: MockCrypto { identity },
            discovery: MockDiscovery { peers },
            orderers: vec![orderer as Arc<dyn Orderer>],
            events: MockEvents {
                code: Mutex::new(TxValidationCode::Valid),
            },
            closed: AtomicUsize::new(0),
        }
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ChannelContext for MockChannel {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn identity(&self) -> &dyn IdentitySerializer {
        &self.identity
    }

    fn crypto_suite(&self) -> &dyn CryptoSuite {
        &self.crypto
    }

    fn discovery(&self) -> &dyn DiscoveryService {
        &self.discovery
    }

    fn orderers(&self) -> Vec<Arc<dyn Orderer>> {
        self.orderers.clone()
    }

    fn commit_events(&self) -> &dyn CommitEvents {
        &self.events
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

//! Shared fixtures for transaction service integration tests
//!
//! An in-memory configuration store, channel membership and channel
//! sessions wired through the real `DefaultClientProvider`.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use peertx_api::config::{ConfigService, Format, Key, KeyValue, UpdateHandler, Value};
use peertx_api::context::{
    ChannelContext, CommitEvents, CryptoSuite, DiscoveryService, IdentitySerializer, Orderer,
    PeerConfig, ProposalResponseValidator,
};
use peertx_api::error::{Result, TxnError};
use peertx_api::model::{
    Endorsement, KvWrite, NsRwSet, ProposalResponse, SignedProposal, TransactionEnvelope,
    TxRwSet, TxValidationCode,
};
use peertx_api::peer::{Peer, PeerRef};
use peertx_api::status::{Group, server};
use peertx_client::profile::ConnectionProfile;
use peertx_client::provider::{ContextFactory, DefaultClientProvider};
use peertx_core::discovery::{Member, MembershipProvider, Role};
use peertx_core::service::{
    APP_NAME, APP_VERSION, COMPONENT_VERSION, GENERAL_COMPONENT, Providers, SDK_COMPONENT,
};
use peertx_core::settings::PeerSettings;

pub const CHANNEL: &str = "mychannel";
pub const MSP_ID: &str = "Org1MSP";
pub const PEER_ID: &str = "peer0.org1.example.com";

pub const SDK_PROFILE: &str = r#"{
  "name": "test-network",
  "version": "1.0.0",
  "client": { "organization": "org1" },
  "organizations": {
    "org1": { "mspid": "Org1MSP", "peers": ["peer0.org1.example.com"] }
  },
  "orderers": {
    "orderer.example.com": { "url": "grpcs://orderer.example.com:7050" }
  }
}"#;

/// A `txn/general` document with millisecond backoffs
pub fn general_config(user: &str, attempts: u32) -> String {
    format!(
        r#"{{"User":"{}","RetryAttempts":{},"InitialBackoff":"1ms","MaxBackoff":"5ms","BackoffFactor":2.0}}"#,
        user, attempts
    )
}

pub fn sign_as(identity: &[u8], msg: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(identity);
    hasher.update(msg);
    hasher.finalize().to_vec()
}

// ===== Configuration store =====

#[derive(Default)]
pub struct MemoryConfigService {
    values: Mutex<HashMap<Key, Value>>,
    handlers: Mutex<Vec<UpdateHandler>>,
}

impl MemoryConfigService {
    pub fn key(component: &str) -> Key {
        Key::peer_component(
            MSP_ID,
            PEER_ID,
            APP_NAME,
            APP_VERSION,
            component,
            COMPONENT_VERSION,
        )
    }

    pub fn with_txn_config(tx_id: &str, general: &str) -> Self {
        let service = Self::default();
        service.put(GENERAL_COMPONENT, Value::new(tx_id, Format::Json, general));
        service.put(SDK_COMPONENT, Value::new(tx_id, Format::Json, SDK_PROFILE));
        service
    }

    pub fn put(&self, component: &str, value: Value) {
        self.values.lock().insert(Self::key(component), value);
    }

    /// Stores `value` and notifies every registered handler
    pub fn update(&self, component: &str, value: Value) {
        self.put(component, value.clone());
        self.notify(&KeyValue::new(Self::key(component), value));
    }

    pub fn notify(&self, kv: &KeyValue) {
        let handlers = self.handlers.lock().clone();
        for handler in handlers {
            handler(kv);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }
}

impl ConfigService for MemoryConfigService {
    fn get(&self, key: &Key) -> Result<Value> {
        self.values
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| TxnError::Config(format!("config not found for [{}]", key)))
    }

    fn add_update_handler(&self, handler: UpdateHandler) {
        self.handlers.lock().push(handler);
    }
}

// ===== Membership =====

pub struct StaticMembership(pub Vec<Member>);

impl MembershipProvider for StaticMembership {
    fn members(&self, _channel_id: &str) -> Result<Vec<Member>> {
        Ok(self.0.clone())
    }
}

// ===== Channel session =====

pub struct TestIdentity(pub Vec<u8>);

impl IdentitySerializer for TestIdentity {
    fn serialize(&self) -> Result<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// SHA-256 suite where a signature is `sha256(identity || msg)`
pub struct TestCrypto {
    pub identity: Vec<u8>,
}

impl CryptoSuite for TestCrypto {
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
            Err(TxnError::InvalidArgument("signature mismatch".to_string()))
        }
    }
}

/// An endorser that optionally fails its first calls
pub struct TestPeer {
    pub url: String,
    pub msp_id: String,
    pub rwset: TxRwSet,
    failures: Mutex<VecDeque<TxnError>>,
    calls: AtomicUsize,
}

impl TestPeer {
    pub fn new(url: &str, msp_id: &str) -> Self {
        Self {
            url: url.to_string(),
            msp_id: msp_id.to_string(),
            rwset: TxRwSet::default(),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
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

#[async_trait]
impl Peer for TestPeer {
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
        let response_payload =
            format!("{}:{}:{}", proposal.tx_id, proposal.chaincode_id, proposal.fcn).into_bytes();
        let endorser = format!("{}@{}", self.msp_id, self.url).into_bytes();
        let mut endorsement = Endorsement {
            endorser,
            signature: Vec::new(),
        };
        endorsement.signature = sign_as(
            &endorsement.endorser,
            &endorsement.signed_bytes(&response_payload),
        );

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

pub struct TestDiscovery {
    pub peers: Vec<PeerRef>,
}

impl DiscoveryService for TestDiscovery {
    fn peers(&self) -> Result<Vec<PeerRef>> {
        Ok(self.peers.clone())
    }
}

/// An orderer that fails the first `failures` broadcasts, `None` meaning always
pub struct TestOrderer {
    failures: Mutex<Option<usize>>,
    attempts: AtomicUsize,
    broadcasts: Mutex<Vec<TransactionEnvelope>>,
}

impl TestOrderer {
    fn with_failures(failures: Option<usize>) -> Self {
        Self {
            failures: Mutex::new(failures),
            attempts: AtomicUsize::new(0),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub fn healthy() -> Self {
        Self::with_failures(Some(0))
    }

    pub fn failing(failures: usize) -> Self {
        Self::with_failures(Some(failures))
    }

    pub fn unavailable() -> Self {
        Self::with_failures(None)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn broadcasts(&self) -> Vec<TransactionEnvelope> {
        self.broadcasts.lock().clone()
    }
}

#[async_trait]
impl Orderer for TestOrderer {
    fn url(&self) -> &str {
        "orderer.example.com:7050"
    }

    async fn broadcast(&self, envelope: &TransactionEnvelope) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let fail = {
            let mut failures = self.failures.lock();
            match failures.as_mut() {
                None => true,
                Some(0) => false,
                Some(n) => {
                    *n -= 1;
                    true
                }
            }
        };
        if fail {
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

pub struct TestEvents;

#[async_trait]
impl CommitEvents for TestEvents {
    async fn commit_status(&self, _tx_id: &str) -> Result<TxValidationCode> {
        Ok(TxValidationCode::Valid)
    }
}

pub struct TestChannel {
    pub channel_id: String,
    pub user: String,
    identity: TestIdentity,
    crypto: TestCrypto,
    discovery: TestDiscovery,
    orderers: Vec<Arc<dyn Orderer>>,
    events: TestEvents,
    closed: AtomicUsize,
}

impl TestChannel {
    pub fn new(channel_id: &str, user: &str, peers: Vec<PeerRef>, orderer: Arc<TestOrderer>) -> Self {
        let identity = format!("{}:{}", MSP_ID, user).into_bytes();
        Self {
            channel_id: channel_id.to_string(),
            user: user.to_string(),
            identity: TestIdentity(identity.clone()),
            crypto: TestCrypto { identity },
            discovery: TestDiscovery { peers },
            orderers: vec![orderer as Arc<dyn Orderer>],
            events: TestEvents,
            closed: AtomicUsize::new(0),
        }
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ChannelContext for TestChannel {
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

/// Opens `TestChannel` sessions over a fixed set of peers and records them
pub struct TestContextFactory {
    pub peers: Vec<Arc<TestPeer>>,
    pub orderer: Arc<TestOrderer>,
    created: Mutex<Vec<Arc<TestChannel>>>,
}

impl TestContextFactory {
    pub fn new(peers: Vec<Arc<TestPeer>>, orderer: Arc<TestOrderer>) -> Self {
        Self {
            peers,
            orderer,
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn created(&self) -> Vec<Arc<TestChannel>> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl ContextFactory for TestContextFactory {
    async fn create_context(
        &self,
        channel_id: &str,
        user: &str,
        _org: &str,
        _profile: &ConnectionProfile,
        _peer_config: &dyn PeerConfig,
    ) -> Result<Arc<dyn ChannelContext>> {
        let peers = self
            .peers
            .iter()
            .map(|p| p.clone() as PeerRef)
            .collect();
        let channel = Arc::new(TestChannel::new(channel_id, user, peers, self.orderer.clone()));
        self.created.lock().push(channel.clone());
        Ok(channel as Arc<dyn ChannelContext>)
    }
}

/// Accepts responses whose endorsements verify and whose payloads agree
pub struct TestValidator;

impl ProposalResponseValidator for TestValidator {
    fn validate(
        &self,
        _signed_proposal: &SignedProposal,
        responses: &[ProposalResponse],
    ) -> Result<TxValidationCode> {
        if responses.is_empty() {
            return Ok(TxValidationCode::EndorsementPolicyFailure);
        }

        let consistent = responses
            .windows(2)
            .all(|w| w[0].response_payload == w[1].response_payload);
        let signed = responses.iter().all(|r| {
            r.endorsement.as_ref().is_some_and(|e| {
                sign_as(&e.endorser, &e.signed_bytes(&r.response_payload)) == e.signature
            })
        });

        if consistent && signed {
            Ok(TxValidationCode::Valid)
        } else {
            Ok(TxValidationCode::EndorsementPolicyFailure)
        }
    }
}

// ===== Harness =====

pub struct Harness {
    pub config: Arc<MemoryConfigService>,
    pub factory: Arc<TestContextFactory>,
    pub providers: Providers,
}

impl Harness {
    pub fn new(peers: Vec<Arc<TestPeer>>, orderer: Arc<TestOrderer>, attempts: u32) -> Self {
        let config = Arc::new(MemoryConfigService::with_txn_config(
            "tx1",
            &general_config("user1", attempts),
        ));
        let members = peers
            .iter()
            .map(|p| Member::new(&p.msp_id, &p.url).with_roles(&[Role::Endorser, Role::Committer]))
            .collect();
        Self::with_members(config, peers, orderer, members)
    }

    pub fn with_members(
        config: Arc<MemoryConfigService>,
        peers: Vec<Arc<TestPeer>>,
        orderer: Arc<TestOrderer>,
        members: Vec<Member>,
    ) -> Self {
        let factory = Arc::new(TestContextFactory::new(peers, orderer));
        let providers = Providers {
            config_service: config.clone(),
            client_provider: Arc::new(DefaultClientProvider::new(factory.clone())),
            membership: Arc::new(StaticMembership(members)),
            peer_config: Arc::new(PeerSettings::new(MSP_ID, PEER_ID)),
            validator: Arc::new(TestValidator),
        };

        Self {
            config,
            factory,
            providers,
        }
    }
}

/// Three endorsers of two organizations
pub fn three_peers() -> Vec<Arc<TestPeer>> {
    vec![
        Arc::new(TestPeer::new("grpcs://peer0.org1.example.com:7051", "Org1MSP")),
        Arc::new(TestPeer::new("grpcs://peer1.org1.example.com:7051", "Org1MSP")),
        Arc::new(TestPeer::new("grpcs://peer0.org2.example.com:7051", "Org2MSP")),
    ]
}

/// Polls `condition` until it holds or a second has passed
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

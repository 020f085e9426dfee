//! Transaction orchestration service
//!
//! A `Service` owns the live channel client of one channel together with the
//! retry policies built from the channel's `txn/general` document. Every
//! call leases the current client under a read lock and dispatches a handler
//! chain through it. Configuration updates rebuild the client and policies
//! on a background task, swap them in under the write lock, and close the
//! previous client once its in-flight calls complete.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use peertx_api::config::{ConfigService, Format, Key, KeyValue, Value};
use peertx_api::context::{PeerConfig, ProposalResponseValidator};
use peertx_api::error::{Result, TxnError};
use peertx_api::handler::{BeforeRetryHandler, HandlerChain, InvokeRequest, RequestOptions};
use peertx_api::model::{ProposalResponse, Response, SignedProposal, TxValidationCode};
use peertx_api::peer::PeerRef;
use peertx_api::request::{CommitRequest, Request};
use peertx_api::retry::RetryPolicy;
use peertx_api::service::TxnService;
use peertx_client::client::{ChannelClient, Lease};
use peertx_client::handler::{endorse_and_commit_chain, endorse_chain, pre_endorsed_commit_chain};
use peertx_client::provider::ClientProvider;

use crate::discovery::{Discovery, MembershipProvider};
use crate::filter::{EndorserFilter, new_target_filter};
use crate::retry::{TxnConfig, commit_retry_policy, general_retry_policy};

pub const APP_NAME: &str = "txn";
pub const APP_VERSION: &str = "1";
pub const GENERAL_COMPONENT: &str = "general";
pub const SDK_COMPONENT: &str = "sdk";
pub const COMPONENT_VERSION: &str = "1";

// The pre-endorsed commit chain never reads these
const COMMIT_CHAINCODE_ID: &str = "cc";
const COMMIT_FCN: &str = "fcn";

/// Collaborators a `Service` is built from
#[derive(Clone)]
pub struct Providers {
    pub config_service: Arc<dyn ConfigService>,
    pub client_provider: Arc<dyn ClientProvider>,
    pub membership: Arc<dyn MembershipProvider>,
    pub peer_config: Arc<dyn PeerConfig>,
    pub validator: Arc<dyn ProposalResponseValidator>,
}

/// Key of a `txn` component document for the local peer
pub fn config_key(peer_config: &dyn PeerConfig, component: &str) -> Key {
    Key::peer_component(
        peer_config.msp_id(),
        peer_config.peer_id(),
        APP_NAME,
        APP_VERSION,
        component,
        COMPONENT_VERSION,
    )
}

/// Checks a caller-supplied transaction id against its nonce.
///
/// Both or neither must be present. When both are, the id must equal the
/// id the client computes for the nonce and its own identity.
pub fn validate_txn_id(client: &dyn ChannelClient, req: &Request) -> Result<()> {
    match (req.nonce.is_empty(), req.transaction_id.is_empty()) {
        (true, true) => Ok(()),
        (false, true) => Err(TxnError::InvalidArgument(
            "TransactionID must be provided if nonce is present".to_string(),
        )),
        (true, false) => Err(TxnError::InvalidArgument(
            "nonce must be provided if TransactionID is present".to_string(),
        )),
        (false, false) => {
            let expected = client.compute_txn_id(&req.nonce)?;
            if expected != req.transaction_id {
                return Err(TxnError::InvalidTxnId);
            }
            Ok(())
        }
    }
}

fn parse_txn_config(value: &Value) -> Result<TxnConfig> {
    match &value.format {
        Format::Json => serde_json::from_str(&value.config).map_err(|e| {
            TxnError::Config(format!(
                "error unmarshalling {} config: {}",
                GENERAL_COMPONENT, e
            ))
        }),
        other => Err(TxnError::Config(format!(
            "unsupported format [{}] for {} config",
            other, GENERAL_COMPONENT
        ))),
    }
}

/// One generation of the service's client and policies
struct Generation {
    client: Arc<dyn ChannelClient>,
    retry: RetryPolicy,
    commit_retry: RetryPolicy,
    config_tx_id: String,
}

async fn load_generation(channel_id: &str, providers: &Providers) -> Result<Generation> {
    let peer_config = providers.peer_config.as_ref();

    let general = providers
        .config_service
        .get(&config_key(peer_config, GENERAL_COMPONENT))?;
    let txn_config = parse_txn_config(&general)?;
    if txn_config.user.is_empty() {
        return Err(TxnError::Config(format!(
            "User is not set in {} config for channel [{}]",
            GENERAL_COMPONENT, channel_id
        )));
    }

    let sdk = providers
        .config_service
        .get(&config_key(peer_config, SDK_COMPONENT))?;

    let client = providers
        .client_provider
        .create_client(
            channel_id,
            &txn_config.user,
            peer_config,
            sdk.config.as_bytes(),
            &sdk.format,
        )
        .await?;

    let retry = general_retry_policy(&txn_config);
    let commit_retry = commit_retry_policy(&retry);

    Ok(Generation {
        client,
        retry,
        commit_retry,
        config_tx_id: general.tx_id,
    })
}

struct State {
    /// None once the service is closed
    client: Option<Arc<dyn ChannelClient>>,
    retry: RetryPolicy,
    commit_retry: RetryPolicy,
    config_tx_id: String,
}

pub struct Service {
    channel_id: String,
    providers: Providers,
    discovery: Arc<Discovery>,
    state: RwLock<State>,
    /// Serializes reloads
    reload_lock: tokio::sync::Mutex<()>,
    /// Transaction id of the last configuration update accepted for reload
    last_tx_id: Mutex<String>,
    /// Feeds the reload task; dropped on close so the task exits
    reload_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    reload_task: Mutex<Option<JoinHandle<()>>>,
    reloads: AtomicU64,
    retries: AtomicU64,
    closed: AtomicBool,
}

impl Service {
    /// Loads the initial client and policies and subscribes to configuration updates.
    ///
    /// Must be called within a tokio runtime; reloads run on a spawned task.
    pub async fn new(channel_id: &str, providers: Providers) -> Result<Arc<Self>> {
        let generation = load_generation(channel_id, &providers).await?;

        info!(
            "[{}] Transaction service created from config txn [{}]",
            channel_id, generation.config_tx_id
        );

        let service = Arc::new(Self {
            channel_id: channel_id.to_string(),
            discovery: Arc::new(Discovery::new(channel_id, providers.membership.clone())),
            last_tx_id: Mutex::new(generation.config_tx_id.clone()),
            state: RwLock::new(State {
                client: Some(generation.client),
                retry: generation.retry,
                commit_retry: generation.commit_retry,
                config_tx_id: generation.config_tx_id,
            }),
            providers,
            reload_lock: tokio::sync::Mutex::new(()),
            reload_tx: Mutex::new(None),
            reload_task: Mutex::new(None),
            reloads: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });

        Self::subscribe(&service);

        Ok(service)
    }

    fn subscribe(service: &Arc<Self>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let weak: Weak<Self> = Arc::downgrade(service);
        let task = tokio::spawn(async move {
            while let Some(tx_id) = rx.recv().await {
                let Some(service) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = service.reload(&tx_id).await {
                    warn!(
                        "[{}] Failed to reload config from txn [{}], keeping current client: {}",
                        service.channel_id, tx_id, e
                    );
                }
            }
            debug!("Config reload task stopped");
        });
        *service.reload_tx.lock() = Some(tx);
        *service.reload_task.lock() = Some(task);

        let weak: Weak<Self> = Arc::downgrade(service);
        service
            .providers
            .config_service
            .add_update_handler(Arc::new(move |kv: &KeyValue| {
                if let Some(service) = weak.upgrade() {
                    service.on_config_update(kv);
                }
            }));
    }

    fn on_config_update(&self, kv: &KeyValue) {
        if self.closed.load(Ordering::SeqCst) || kv.app_name() != APP_NAME {
            return;
        }

        let peer_config = self.providers.peer_config.as_ref();
        if kv.msp_id() != peer_config.msp_id() || kv.peer_id() != peer_config.peer_id() {
            return;
        }

        if !self.compare_and_set_tx_id(kv.tx_id()) {
            debug!(
                "[{}] Config update for [{}] from txn [{}] already handled",
                self.channel_id,
                kv.key,
                kv.tx_id()
            );
            return;
        }

        info!(
            "[{}] Config updated for [{}] in txn [{}], scheduling reload",
            self.channel_id,
            kv.key,
            kv.tx_id()
        );
        let sent = match self.reload_tx.lock().as_ref() {
            Some(tx) => tx.send(kv.tx_id().to_string()).is_ok(),
            None => false,
        };
        if !sent {
            warn!("[{}] Config reload task is not running", self.channel_id);
        }
    }

    /// Records `tx_id` as handled. Returns false if it already was the last one.
    fn compare_and_set_tx_id(&self, tx_id: &str) -> bool {
        let mut last = self.last_tx_id.lock();
        if *last == tx_id {
            return false;
        }
        *last = tx_id.to_string();
        true
    }

    async fn reload(&self, tx_id: &str) -> Result<()> {
        let _guard = self.reload_lock.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }

        debug!("[{}] Reloading config for txn [{}]", self.channel_id, tx_id);
        let generation = load_generation(&self.channel_id, &self.providers).await?;

        let (previous, rejected) = {
            let mut state = self.state.write();
            if state.client.is_none() {
                (None, Some(generation.client))
            } else {
                state.retry = generation.retry;
                state.commit_retry = generation.commit_retry;
                state.config_tx_id = generation.config_tx_id;
                (state.client.replace(generation.client), None)
            }
        };

        if let Some(client) = rejected {
            client.close();
            return Ok(());
        }
        if let Some(client) = previous {
            client.close();
        }

        self.reloads.fetch_add(1, Ordering::SeqCst);
        info!("[{}] Config reloaded from txn [{}]", self.channel_id, tx_id);

        Ok(())
    }

    /// Leases the live client and snapshots the policies
    fn acquire(&self) -> Result<(Lease, RetryPolicy, RetryPolicy)> {
        let state = self.state.read();
        let client = state.client.clone().ok_or(TxnError::Closed)?;
        let lease = Lease::acquire(client)?;
        Ok((lease, state.retry.clone(), state.commit_retry.clone()))
    }

    fn lease(&self) -> Result<Lease> {
        let state = self.state.read();
        let client = state.client.clone().ok_or(TxnError::Closed)?;
        Lease::acquire(client)
    }

    fn target_options(&self, req: &Request, retry: RetryPolicy) -> RequestOptions {
        let filter = EndorserFilter::new(
            self.discovery.clone(),
            new_target_filter(req.peer_filter.clone()),
        );

        RequestOptions::default()
            .with_targets(req.targets.clone())
            .with_target_filter(Some(Arc::new(filter)))
            .with_retry(retry)
    }

    async fn dispatch(
        &self,
        client: &Lease,
        chain: &HandlerChain,
        request: InvokeRequest,
        options: RequestOptions,
    ) -> Result<Response> {
        let attempts = Arc::new(AtomicU64::new(0));
        let last_error = Arc::new(Mutex::new(None::<String>));

        let hook: BeforeRetryHandler = {
            let attempts = attempts.clone();
            let last_error = last_error.clone();
            let channel_id = self.channel_id.clone();
            Arc::new(move |err: &TxnError| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                info!("[{}] Retry attempt #{} on error: {}", channel_id, attempt, err);
                *last_error.lock() = Some(err.to_string());
            })
        };

        let result = client
            .invoke_handler(chain, request, options.with_before_retry(hook))
            .await;

        let retries = attempts.load(Ordering::SeqCst);
        if retries > 0 {
            self.retries.fetch_add(retries, Ordering::SeqCst);
            match &result {
                Ok(_) => info!(
                    "[{}] Succeeded after {} retries; last retried error: {}",
                    self.channel_id,
                    retries,
                    last_error.lock().as_deref().unwrap_or_default()
                ),
                Err(e) => warn!(
                    "[{}] Failed after {} retries: {}",
                    self.channel_id, retries, e
                ),
            }
        }

        result
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Transaction id of the configuration the live client was built from
    pub fn config_tx_id(&self) -> String {
        self.state.read().config_tx_id.clone()
    }

    /// Number of completed reloads
    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Total number of retries performed by dispatches on this service
    pub fn retry_count(&self) -> u64 {
        self.retries.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// True while the background reload task is alive
    pub fn is_reload_task_running(&self) -> bool {
        self.reload_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

#[async_trait]
impl TxnService for Service {
    async fn endorse(&self, req: &Request) -> Result<Response> {
        let (client, retry, _) = self.acquire()?;
        validate_txn_id(&*client, req)?;

        let chain = req.handler.clone().unwrap_or_else(endorse_chain);
        let options = self.target_options(req, retry);

        self.dispatch(&client, &chain, req.to_invoke_request()?, options)
            .await
    }

    async fn endorse_and_commit(&self, req: &Request) -> Result<(Response, bool)> {
        let (client, retry, _) = self.acquire()?;
        validate_txn_id(&*client, req)?;

        let chain = req.handler.clone().unwrap_or_else(|| {
            endorse_and_commit_chain(req.ignore_namespaces.clone(), req.commit_type, req.async_commit)
        });
        let options = self.target_options(req, retry);

        let response = self
            .dispatch(&client, &chain, req.to_invoke_request()?, options)
            .await?;
        let committed = response.committed;

        Ok((response, committed))
    }

    async fn commit_endorsements(&self, req: &CommitRequest) -> Result<(Response, bool)> {
        let (client, _, commit_retry) = self.acquire()?;

        let chain = req.handler.clone().unwrap_or_else(|| {
            pre_endorsed_commit_chain(
                req.endorsement_response.clone(),
                req.ignore_namespaces.clone(),
                req.commit_type,
                req.async_commit,
            )
        });
        let options = RequestOptions::default().with_retry(commit_retry);

        let response = self
            .dispatch(
                &client,
                &chain,
                InvokeRequest::new(COMMIT_CHAINCODE_ID, COMMIT_FCN),
                options,
            )
            .await?;
        let committed = response.committed;

        Ok((response, committed))
    }

    fn signing_identity(&self) -> Result<Vec<u8>> {
        self.lease()?.signing_identity()
    }

    fn get_peer(&self, endpoint: &str) -> Result<PeerRef> {
        self.lease()?.get_peer(endpoint)
    }

    fn verify_proposal_signature(&self, signed_proposal: &SignedProposal) -> Result<()> {
        self.lease()?.verify_proposal_signature(signed_proposal)
    }

    fn validate_proposal_responses(
        &self,
        signed_proposal: &SignedProposal,
        responses: &[ProposalResponse],
    ) -> Result<TxValidationCode> {
        self.providers.validator.validate(signed_proposal, responses)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Queued reloads still drain; the task ends once the channel is empty
        self.reload_tx.lock().take();

        let client = self.state.write().client.take();
        if let Some(client) = client {
            client.close();
        }

        info!("[{}] Transaction service closed", self.channel_id);
    }
}

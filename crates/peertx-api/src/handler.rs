//! Handler chain contract
//!
//! A chain is an ordered list of steps. Each step inspects or mutates the
//! in-flight request context and either lets the chain continue or stops it.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::ChannelContext;
use crate::error::Result;
use crate::model::{ChaincodeCall, Response};
use crate::peer::{PeerRef, TargetFilter};
use crate::retry::RetryPolicy;

/// Outcome of a single step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// The chaincode invocation a chain is dispatched for
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvokeRequest {
    pub chaincode_id: String,
    pub fcn: String,
    pub args: Vec<Vec<u8>>,
    pub transient_map: BTreeMap<String, Vec<u8>>,
    pub invocation_chain: Vec<ChaincodeCall>,
    /// Nonce to build the proposal with; generated when absent
    pub nonce: Option<Vec<u8>>,
}

impl InvokeRequest {
    pub fn new(chaincode_id: &str, fcn: &str) -> Self {
        Self {
            chaincode_id: chaincode_id.to_string(),
            fcn: fcn.to_string(),
            ..Default::default()
        }
    }
}

/// Invoked before each retry with the error that triggered it
pub type BeforeRetryHandler = Arc<dyn Fn(&crate::error::TxnError) + Send + Sync>;

/// Options for a single dispatch
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub targets: Vec<PeerRef>,
    pub target_filter: Option<Arc<dyn TargetFilter>>,
    pub retry: RetryPolicy,
    pub before_retry: Option<BeforeRetryHandler>,
}

impl RequestOptions {
    pub fn with_targets(mut self, targets: Vec<PeerRef>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_target_filter(mut self, filter: Option<Arc<dyn TargetFilter>>) -> Self {
        self.target_filter = filter;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_before_retry(mut self, handler: BeforeRetryHandler) -> Self {
        self.before_retry = Some(handler);
        self
    }
}

/// State carried through the chain for one attempt
pub struct RequestContext {
    pub request: InvokeRequest,
    /// Explicit targets before selection; the selected endorsers afterwards
    pub targets: Vec<PeerRef>,
    pub target_filter: Option<Arc<dyn TargetFilter>>,
    pub response: Response,
    /// Set by the commit decision step
    pub should_commit: bool,
}

impl RequestContext {
    pub fn new(request: InvokeRequest, options: &RequestOptions) -> Self {
        Self {
            request,
            targets: options.targets.clone(),
            target_filter: options.target_filter.clone(),
            response: Response::default(),
            should_commit: false,
        }
    }
}

/// Access to the channel session for the duration of a dispatch
#[derive(Clone)]
pub struct ClientContext {
    pub channel: Arc<dyn ChannelContext>,
}

impl ClientContext {
    pub fn new(channel: Arc<dyn ChannelContext>) -> Self {
        Self { channel }
    }

    pub fn channel_id(&self) -> &str {
        self.channel.channel_id()
    }
}

/// A single step in a handler chain
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: &mut RequestContext, client: &ClientContext) -> Result<Flow>;
}

/// An ordered sequence of steps
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn then<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn push(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Run every step in order until one stops the chain or fails
    pub async fn run(&self, request: &mut RequestContext, client: &ClientContext) -> Result<()> {
        for handler in &self.handlers {
            if handler.handle(request, client).await? == Flow::Stop {
                break;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

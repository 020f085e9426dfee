//! Peertx API - shared vocabulary of the transaction service
//!
//! This crate provides:
//! - `TxnError` and failure-domain classified `Status` errors
//! - Proposal, endorsement and transaction model types
//! - `Request`, `CommitRequest` and `Response`
//! - `RetryPolicy` with the baseline and commit-only retryable tables
//! - Collaborator traits for the channel session and configuration store
//! - The handler chain contract and the exposed `TxnService` trait

pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod model;
pub mod peer;
pub mod request;
pub mod retry;
pub mod service;
pub mod status;

pub use context::{
    ChannelContext, CommitEvents, CryptoSuite, DiscoveryService, IdentitySerializer, Orderer,
    PeerConfig, ProposalResponseValidator, compute_txn_id,
};
pub use error::{Result, TxnError};
pub use handler::{
    BeforeRetryHandler, ClientContext, Flow, Handler, HandlerChain, InvokeRequest,
    RequestContext, RequestOptions,
};
pub use model::*;
pub use peer::{Peer, PeerFilter, PeerInfo, PeerRef, TargetFilter};
pub use request::{CommitRequest, CommitType, Namespace, Request};
pub use retry::RetryPolicy;
pub use service::TxnService;
pub use status::{Group, Status};

//! Peertx Core - transaction orchestration service
//!
//! This crate provides:
//! - Retry policy construction from the `txn/general` configuration document
//! - Channel membership and the endorser target filter
//! - `Service`, the per-channel `TxnService` with hot configuration reload
//! - `ServiceProvider`, which creates and caches services by channel
//! - Local peer settings and tracing setup for the hosting process

pub mod discovery;
pub mod filter;
pub mod logging;
pub mod provider;
pub mod retry;
pub mod service;
pub mod settings;

pub use discovery::{Discovery, Member, MembershipProvider, Role};
pub use filter::{EndorserFilter, TargetFilterAdapter, new_target_filter};
pub use logging::init_tracing;
pub use provider::ServiceProvider;
pub use retry::{TxnConfig, commit_retry_policy, general_retry_policy, parse_duration};
pub use service::{Providers, Service, validate_txn_id};
pub use settings::PeerSettings;

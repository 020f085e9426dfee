//! Retry policy data type and retryable-code tables

use std::collections::HashMap;
use std::time::Duration;

use crate::error::TxnError;
use crate::status::{Group, client, grpc, server};

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Transaction validation codes the event service reports as transient
const EVENT_SERVER_RETRYABLE: [i32; 4] = [9, 10, 11, 12];

/// Retry policy applied to a dispatch through a handler chain.
///
/// `attempts` is the number of retries after the first invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_factor: f64,
    pub retryable_codes: HashMap<Group, Vec<i32>>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retryable_codes: channel_client_retryable_codes(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            attempts: 0,
            retryable_codes: HashMap::new(),
            ..Default::default()
        }
    }

    /// Returns true if the error is classified as retryable by this policy.
    /// An aggregate error is retryable if any of its members is.
    pub fn is_retryable(&self, err: &TxnError) -> bool {
        match err {
            TxnError::Status(status) => self
                .retryable_codes
                .get(&status.group)
                .is_some_and(|codes| codes.contains(&status.code)),
            TxnError::Multiple(errors) => errors.iter().any(|e| self.is_retryable(e)),
            _ => false,
        }
    }

    /// Backoff before the given retry (1-based), capped at `max_backoff`
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = self.initial_backoff.as_nanos() as f64 * self.backoff_factor.powi(exp);
        if !nanos.is_finite() || nanos >= self.max_backoff.as_nanos() as f64 {
            return self.max_backoff;
        }
        Duration::from_nanos(nanos.max(0.0) as u64)
    }
}

/// Baseline retryable codes for endorse/commit through the channel client
pub fn channel_client_retryable_codes() -> HashMap<Group, Vec<i32>> {
    HashMap::from([
        (
            Group::EndorserClient,
            vec![
                client::CONNECTION_FAILED,
                client::ENDORSEMENT_MISMATCH,
                client::CHAINCODE_NAME_NOT_FOUND,
            ],
        ),
        (
            Group::EndorserServer,
            vec![server::SERVICE_UNAVAILABLE, server::INTERNAL_SERVER_ERROR],
        ),
        (Group::OrdererClient, vec![client::CONNECTION_FAILED]),
        (
            Group::OrdererServer,
            vec![
                server::SERVICE_UNAVAILABLE,
                server::INTERNAL_SERVER_ERROR,
                server::BAD_REQUEST,
            ],
        ),
        (Group::EventServer, EVENT_SERVER_RETRYABLE.to_vec()),
        (Group::GrpcTransport, vec![grpc::UNAVAILABLE]),
    ])
}

/// Retryable codes for commit-only dispatch (no endorsement phase)
pub fn commit_only_retryable_codes() -> HashMap<Group, Vec<i32>> {
    HashMap::from([
        (Group::OrdererClient, vec![client::CONNECTION_FAILED]),
        (
            Group::OrdererServer,
            vec![server::SERVICE_UNAVAILABLE, server::INTERNAL_SERVER_ERROR],
        ),
        (Group::GrpcTransport, vec![grpc::UNAVAILABLE]),
    ])
}

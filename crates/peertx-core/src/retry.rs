//! Retry policy construction from the `txn/general` configuration document

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use peertx_api::retry::{RetryPolicy, commit_only_retryable_codes};
use peertx_api::status::Group;

/// General transaction settings
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TxnConfig {
    /// Identity the service transacts as
    pub user: String,
    /// Values of zero or less keep the default
    pub retry_attempts: i64,
    pub initial_backoff: String,
    pub max_backoff: String,
    pub backoff_factor: f64,
    /// Chaincode status codes to retry in addition to the baseline table
    pub retryable_codes: Vec<i32>,
}

/// Parses a Go-style duration such as `500ms`, `2s`, `1m30s` or `1.5h`
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s == "0" {
        return Some(Duration::ZERO);
    }
    if s.is_empty() {
        return None;
    }

    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let value: f64 = rest[..num_end].parse().ok()?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_end..];

        nanos += value * scale;
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos.round() as u64))
}

fn backoff_setting(name: &str, value: &str) -> Option<Duration> {
    if value.is_empty() {
        return None;
    }
    match parse_duration(value) {
        Some(d) if !d.is_zero() => Some(d),
        Some(_) => None,
        None => {
            warn!("Invalid value for {}: [{}], using default", name, value);
            None
        }
    }
}

/// Policy for endorsement dispatch: the baseline retryable table plus the
/// configured chaincode codes. Unset or zero values keep their defaults.
pub fn general_retry_policy(cfg: &TxnConfig) -> RetryPolicy {
    let mut policy = RetryPolicy::default();

    if cfg.retry_attempts > 0 {
        policy.attempts = u32::try_from(cfg.retry_attempts).unwrap_or(u32::MAX);
    } else if cfg.retry_attempts < 0 {
        warn!(
            "Invalid value for RetryAttempts: [{}], using default",
            cfg.retry_attempts
        );
    }
    if let Some(d) = backoff_setting("InitialBackoff", &cfg.initial_backoff) {
        policy.initial_backoff = d;
    }
    if let Some(d) = backoff_setting("MaxBackoff", &cfg.max_backoff) {
        policy.max_backoff = d;
    }
    if cfg.backoff_factor > 0.0 {
        policy.backoff_factor = cfg.backoff_factor;
    }

    if !cfg.retryable_codes.is_empty() {
        let codes = policy.retryable_codes.entry(Group::Chaincode).or_default();
        for code in &cfg.retryable_codes {
            if !codes.contains(code) {
                codes.push(*code);
            }
        }
    }

    policy
}

/// Policy for commit-only dispatch: same numerics as `base`, commit-only codes
pub fn commit_retry_policy(base: &RetryPolicy) -> RetryPolicy {
    RetryPolicy {
        retryable_codes: commit_only_retryable_codes(),
        ..base.clone()
    }
}

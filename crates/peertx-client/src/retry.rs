//! Retry executor
//!
//! Runs an operation until it succeeds, fails with an error the policy does
//! not classify as retryable, or the policy's retry ceiling is reached.

use std::future::Future;

use tracing::debug;

use peertx_api::error::Result;
use peertx_api::handler::BeforeRetryHandler;
use peertx_api::retry::RetryPolicy;

/// Run `operation` under `policy`, sleeping with exponential backoff between attempts.
///
/// `before_retry` is invoked with the triggering error right before each retry.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    before_retry: Option<&BeforeRetryHandler>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retry = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if retry >= policy.attempts || !policy.is_retryable(&err) {
            return Err(err);
        }

        retry += 1;
        let backoff = policy.backoff(retry);
        debug!(
            "Retrying ({}/{}) in {:?} after error: {}",
            retry, policy.attempts, backoff, err
        );

        if let Some(handler) = before_retry {
            handler(&err);
        }

        tokio::time::sleep(backoff).await;
    }
}

//! Reference counter for a shared session handle
//!
//! Tracks the number of in-flight operations on a resource and runs a close
//! callback once the resource has been shut down and the last operation has
//! released it. The callback runs at most once, outside the internal lock.

use parking_lot::Mutex;
use tracing::debug;

use peertx_api::error::{Result, TxnError};

type CloseFn = Box<dyn FnOnce() + Send>;

struct State {
    count: usize,
    closing: bool,
    close_fn: Option<CloseFn>,
}

/// In-flight operation counter with deferred close
pub struct Counter {
    state: Mutex<State>,
}

impl Counter {
    pub fn new<F>(close_fn: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            state: Mutex::new(State {
                count: 0,
                closing: false,
                close_fn: Some(Box::new(close_fn)),
            }),
        }
    }

    /// Admit a new operation. Fails once shutdown has been requested.
    pub fn acquire(&self) -> Result<usize> {
        let mut state = self.state.lock();
        if state.closing {
            return Err(TxnError::Closed);
        }
        state.count += 1;
        Ok(state.count)
    }

    /// Complete an operation. Runs the close callback if a shutdown is
    /// pending and this was the last operation.
    pub fn release(&self) -> Result<usize> {
        let (count, close_fn) = {
            let mut state = self.state.lock();
            if state.count == 0 {
                return Err(anyhow::anyhow!("reference counter released more times than acquired").into());
            }
            state.count -= 1;
            let close_fn = if state.closing && state.count == 0 {
                state.close_fn.take()
            } else {
                None
            };
            (state.count, close_fn)
        };

        if let Some(close_fn) = close_fn {
            debug!("Last reference released, closing resource");
            close_fn();
        }

        Ok(count)
    }

    /// Stop admitting operations. The close callback runs now if nothing is
    /// in flight, otherwise on the last `release`.
    pub fn shutdown(&self) {
        let close_fn = {
            let mut state = self.state.lock();
            state.closing = true;
            if state.count == 0 {
                state.close_fn.take()
            } else {
                debug!("Close deferred until {} reference(s) are released", state.count);
                None
            }
        };

        if let Some(close_fn) = close_fn {
            close_fn();
        }
    }

    pub fn count(&self) -> usize {
        self.state.lock().count
    }

    pub fn is_closing(&self) -> bool {
        self.state.lock().closing
    }

    /// True once the close callback has run
    pub fn is_closed(&self) -> bool {
        let state = self.state.lock();
        state.closing && state.close_fn.is_none()
    }
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Counter")
            .field("count", &state.count)
            .field("closing", &state.closing)
            .finish()
    }
}

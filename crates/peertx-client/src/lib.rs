//! Peertx Client - dispatch layer of the transaction service
//!
//! This crate provides:
//! - The retry executor driving a handler chain under a `RetryPolicy`
//! - A reference counter that defers closing a session until it is idle
//! - Built-in handler steps and the endorse / commit chains assembled from them
//! - `Client`, the reference-counted `ChannelClient` over a channel session
//! - Connection profile parsing and the `ClientProvider` that opens clients

pub mod client;
pub mod handler;
pub mod profile;
pub mod provider;
pub mod reference;
pub mod retry;

#[cfg(test)]
mod testing;

pub use client::{ChannelClient, Client, Lease};
pub use profile::ConnectionProfile;
pub use provider::{ClientProvider, ContextFactory, DefaultClientProvider};
pub use reference::Counter;
pub use retry::with_retry;

//! One transaction service per channel

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tracing::info;

use peertx_api::error::{Result, TxnError};
use peertx_api::service::TxnService;

use crate::service::{Providers, Service};

pub struct ServiceProvider {
    providers: Providers,
    services: DashMap<String, Arc<Service>>,
    /// Serializes service creation so a channel is only loaded once
    creating: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

impl ServiceProvider {
    pub fn new(providers: Providers) -> Self {
        Self {
            providers,
            services: DashMap::new(),
            creating: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// The service for `channel_id`, created on first use
    pub async fn for_channel(&self, channel_id: &str) -> Result<Arc<Service>> {
        if self.is_closed() {
            return Err(TxnError::Closed);
        }
        if let Some(service) = self.services.get(channel_id) {
            return Ok(service.clone());
        }

        let _guard = self.creating.lock().await;
        if self.is_closed() {
            return Err(TxnError::Closed);
        }
        if let Some(service) = self.services.get(channel_id) {
            return Ok(service.clone());
        }

        let service = Service::new(channel_id, self.providers.clone()).await?;
        self.services.insert(channel_id.to_string(), service.clone());

        info!("[{}] Transaction service registered", channel_id);
        Ok(service)
    }

    pub fn channels(&self) -> Vec<String> {
        self.services.iter().map(|e| e.key().clone()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close every service and refuse new ones
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _guard = self.creating.lock().await;

        let channels = self.channels();
        for channel_id in channels {
            if let Some((_, service)) = self.services.remove(&channel_id) {
                service.close();
            }
        }
    }
}

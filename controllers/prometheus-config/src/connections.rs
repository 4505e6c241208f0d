//! Prometheus client cache.
//!
//! One client is built per distinct server address and reused across
//! reconciliations so connection pools survive between requeues.

use prometheus_client::{Credentials, PrometheusClient, PrometheusClientTrait, PrometheusError};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Hands out Prometheus clients for server addresses
pub trait Connector: Send + Sync {
    fn connect(&self, address: &Url) -> Result<Arc<dyn PrometheusClientTrait>, PrometheusError>;

    /// Releases clients for addresses no longer in `live`.
    fn retain(&self, _live: &[Url]) {}
}

fn cache_key(address: &Url) -> String {
    address.as_str().trim_end_matches('/').to_string()
}

/// HTTP connector caching one `PrometheusClient` per address
pub struct PrometheusConnections {
    credentials: Option<Credentials>,
    timeout: Duration,
    clients: Mutex<HashMap<String, Arc<dyn PrometheusClientTrait>>>,
}

impl PrometheusConnections {
    pub fn new(credentials: Option<Credentials>, timeout: Duration) -> Self {
        Self {
            credentials,
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached clients
    pub fn cached_clients(&self) -> usize {
        self.clients
            .lock()
            .map(|clients| clients.len())
            .unwrap_or(0)
    }
}

impl Connector for PrometheusConnections {
    fn connect(&self, address: &Url) -> Result<Arc<dyn PrometheusClientTrait>, PrometheusError> {
        let key = cache_key(address);
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        debug!("Creating Prometheus client for {}", key);
        let client: Arc<dyn PrometheusClientTrait> =
            Arc::new(PrometheusClient::new(&key, self.credentials.clone(), self.timeout)?);
        clients.insert(key, client.clone());
        Ok(client)
    }

    fn retain(&self, live: &[Url]) {
        let live: HashSet<String> = live.iter().map(cache_key).collect();
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        clients.retain(|key, _| {
            let keep = live.contains(key);
            if !keep {
                debug!("Dropping Prometheus client for {}", key);
            }
            keep
        });
    }
}

//! Controller configuration read from the environment.

use crate::error::ControllerError;
use prometheus_client::Credentials;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Runtime configuration of the controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Override for the local cluster id
    pub cluster_id: Option<String>,
    /// Credentials sent to every Prometheus server
    pub credentials: Option<Credentials>,
    /// HTTP timeout for Prometheus requests
    pub timeout: Duration,
    /// Requeue interval for healthy servers
    pub resync_interval: Duration,
    /// Bind address of the health/metrics endpoint
    pub metrics_addr: SocketAddr,
}

impl ControllerConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let credentials = match (
            get("PROMETHEUS_BEARER_TOKEN"),
            get("PROMETHEUS_USERNAME"),
            get("PROMETHEUS_PASSWORD"),
        ) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(ControllerError::InvalidConfig(
                    "PROMETHEUS_BEARER_TOKEN cannot be combined with basic auth".to_string(),
                ));
            }
            (Some(token), None, None) => Some(Credentials::Bearer(token)),
            (None, Some(username), Some(password)) => Some(Credentials::Basic { username, password }),
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(ControllerError::InvalidConfig(
                    "PROMETHEUS_USERNAME and PROMETHEUS_PASSWORD must be set together".to_string(),
                ));
            }
            (None, None, None) => None,
        };

        let metrics_addr = get("METRICS_ADDR")
            .unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ControllerError::InvalidConfig(format!("METRICS_ADDR: {}", e)))?;

        Ok(Self {
            watch_namespace: get("WATCH_NAMESPACE"),
            cluster_id: get("CLUSTER_ID"),
            credentials,
            timeout: Duration::from_secs(seconds(&get, "PROMETHEUS_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?),
            resync_interval: Duration::from_secs(seconds(
                &get,
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            )?),
            metrics_addr,
        })
    }
}

fn seconds<F>(get: &F, key: &str, default: u64) -> Result<u64, ControllerError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) => Err(ControllerError::InvalidConfig(format!("{} must be positive", key))),
            Ok(secs) => Ok(secs),
            Err(e) => Err(ControllerError::InvalidConfig(format!("{}: {}", key, e))),
        },
    }
}

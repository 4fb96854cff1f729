//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Desktop network monitor
///
/// Reports connectivity by opening a TCP connection to the sync server.
/// Desktop platforms expose no portable way to tell WiFi from Ethernet, so a
/// reachable server is reported as an unmetered `Ethernet` link.
pub struct DesktopNetworkMonitor {
    /// `host:port` of the sync server
    target: String,
    probe_timeout: Duration,
}

impl DesktopNetworkMonitor {
    /// Probe the host and port of `server_url`
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::OperationFailed`] if the URL has no host.
    pub fn new(server_url: &str) -> Result<Self> {
        Ok(Self {
            target: probe_target(server_url)?,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        })
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(self.probe_timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(e)) => {
                debug!(server = %self.target, error = %e, "Server unreachable");
                NetworkStatus::Disconnected
            }
            Err(_) => {
                debug!(server = %self.target, "Server probe timed out");
                NetworkStatus::Disconnected
            }
        }
    }
}

fn probe_target(server_url: &str) -> Result<String> {
    let url = reqwest::Url::parse(server_url)
        .map_err(|e| BridgeError::OperationFailed(format!("Invalid server URL: {}", e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| BridgeError::OperationFailed("Server URL has no host".to_string()))?;
    let port = url.port_or_known_default().unwrap_or(80);

    // IPv6 hosts keep their brackets in `host_str`.
    Ok(format!("{}:{}", host, port))
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let info = match self.check_connectivity().await {
            NetworkStatus::Connected => NetworkInfo::connected(NetworkType::Ethernet),
            _ => NetworkInfo::disconnected(),
        };
        debug!(status = ?info.status, "Network info updated");
        Ok(info)
    }
}

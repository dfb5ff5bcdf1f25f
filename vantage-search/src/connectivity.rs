//! Network reachability checks.
//!
//! The engine asks a [`ConnectivityProbe`] once per query before
//! dispatching any variant. The answer is never cached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

/// Answers "can we reach the provider right now?".
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// `true` when online search should be attempted.
    async fn is_online(&self) -> bool;
}

/// A probe with a fixed, switchable answer.
///
/// Used for tests and for forcing offline mode from the command line.
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    /// A probe that always reports online.
    pub fn online() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }

    /// A probe that always reports offline.
    pub fn offline() -> Self {
        Self {
            online: AtomicBool::new(false),
        }
    }

    /// Change the reported state.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        Self::online()
    }
}

#[async_trait]
impl ConnectivityProbe for StaticConnectivity {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Reports online when a TCP connection to `address` succeeds in time.
#[derive(Debug, Clone)]
pub struct TcpConnectivity {
    address: String,
    timeout: Duration,
}

impl TcpConnectivity {
    /// Probe `address` (`host:port`) with the given connect timeout.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// Probe the host of a provider URL on its (default) port.
    ///
    /// Returns `None` when the URL has no host.
    pub fn for_url(url: &str, timeout: Duration) -> Option<Self> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let port = parsed.port_or_known_default()?;
        Some(Self::new(format!("{host}:{port}"), timeout))
    }

    /// The probed address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl ConnectivityProbe for TcpConnectivity {
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(&self.address)).await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(address = %self.address, error = %e, "connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(address = %self.address, "connectivity probe timed out");
                false
            }
        }
    }
}

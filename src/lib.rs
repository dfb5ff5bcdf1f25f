//! Vantage: multi-query parallel web search from the command line.
//!
//! This crate is the host around [`vantage_search`]: it loads a TOML
//! configuration, keeps the local knowledge store in a JSON file and wires
//! a connectivity probe into the engine. The `vantage` binary drives it.

pub mod config;
pub mod error;
pub mod knowledge_file;
pub mod vantage_dirs;

use std::sync::Arc;

use vantage_search::{
    ConnectivityProbe, InMemoryKnowledge, SearchEngine, StaticConnectivity, TcpConnectivity,
};

pub use config::AppConfig;
pub use error::{AppError, Result};

/// Choose how the engine decides it is online.
///
/// An explicit address wins; otherwise the provider endpoint is probed.
/// With probing disabled, or an endpoint with no resolvable host, the
/// engine assumes it is online.
pub fn connectivity_probe(config: &AppConfig, force_offline: bool) -> Arc<dyn ConnectivityProbe> {
    if force_offline {
        return Arc::new(StaticConnectivity::offline());
    }
    if !config.connectivity.probe {
        return Arc::new(StaticConnectivity::online());
    }
    let timeout = config.connectivity.timeout();
    let probe = match &config.connectivity.address {
        Some(address) => Some(TcpConnectivity::new(address.clone(), timeout)),
        None => TcpConnectivity::for_url(&config.engine.provider.base_url, timeout),
    };
    match probe {
        Some(probe) => {
            tracing::debug!(address = probe.address(), "connectivity probe configured");
            Arc::new(probe)
        }
        None => {
            tracing::warn!("provider endpoint has no host to probe, assuming online");
            Arc::new(StaticConnectivity::online())
        }
    }
}

/// Assemble a search engine from host configuration.
///
/// # Errors
///
/// Returns [`AppError::Search`] if the engine configuration is invalid.
pub fn build_engine(
    config: &AppConfig,
    knowledge: Arc<InMemoryKnowledge>,
    force_offline: bool,
) -> Result<SearchEngine> {
    let engine = SearchEngine::builder(config.engine.clone())
        .knowledge(knowledge)
        .connectivity(connectivity_probe(config, force_offline))
        .build()?;
    Ok(engine)
}

//! Server orchestration

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use docbridge_api::RestServer;
use docbridge_common::config::Config;
use docbridge_common::metrics;
use docbridge_query::QueryEngine;
use docbridge_store::redact_uri;

/// Owns the store client and the HTTP server built on it
pub struct DocbridgeServer {
    rest: RestServer,
}

impl DocbridgeServer {
    /// Connect to the store and wire up the HTTP surface.
    ///
    /// The store client is created once here and shared by every request.
    /// Fails when the store does not answer a ping.
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing docbridge components...");

        if !metrics::install() {
            warn!("Metrics recorder unavailable, /metrics will report uptime only");
        }

        let store = docbridge_store::connect(&config.store)
            .await
            .with_context(|| format!("connecting to {}", redact_uri(&config.store.uri)))?;
        store
            .ping()
            .await
            .with_context(|| format!("store at {} is unreachable", redact_uri(&config.store.uri)))?;
        info!("Document store ready ({})", store.backend_name());

        let engine = Arc::new(QueryEngine::new(store, config.query.clone()));
        let rest = RestServer::new(&config.server, engine);

        Ok(Self { rest })
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let server = self.rest.start()?;
        let handle = server.handle();

        tokio::select! {
            result = server => result?,
            () = shutdown => {
                info!("Stopping HTTP server");
                handle.stop(true).await;
            }
        }

        info!("docbridge stopped");
        Ok(())
    }
}

//! HTTP server for the broker

use super::api::build_router;
use super::state::AppState;
use crate::handshake::Broker;
use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// The broker's HTTP server
pub struct BrokerServer {
    state: AppState,
}

impl BrokerServer {
    pub fn new(broker: Arc<Broker>) -> Self {
        BrokerServer {
            state: AppState::new(broker),
        }
    }

    /// Bind to the configured address and serve until shutdown.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.broker.config().bind_address;
        let router = build_router(self.state);

        let listener = TcpListener::bind(addr).await?;
        info!("walletgate listening on {}", addr);

        axum::serve(listener, router).await?;
        Ok(())
    }
}

//! `BingoServer` builder and accept loop.
//!
//! This is the entry point for running the relay. It ties together all the
//! layers: transport → protocol → coordinator (registry, rooms, timers).

use std::future::Future;

use bingo_relay_transport::{Transport, WebSocketTransport};

use crate::coordinator::spawn_coordinator;
use crate::handler::handle_connection;
use crate::{BingoError, GameLimits, Heartbeat, ServerConfig};

/// Builder for configuring and starting the relay.
///
/// # Example
///
/// ```rust,no_run
/// use bingo_relay::prelude::*;
///
/// # async fn start() -> Result<(), BingoError> {
/// let server = BingoServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct BingoServerBuilder {
    config: ServerConfig,
}

impl BingoServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the ping schedule and the dead-socket timeout.
    pub fn heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.config.heartbeat = heartbeat;
        self
    }

    /// Sets the room creation limits.
    pub fn limits(mut self, limits: GameLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Binds the listener.
    ///
    /// # Errors
    /// [`BingoError::Transport`] if the address cannot be bound.
    pub async fn build(self) -> Result<BingoServer, BingoError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        Ok(BingoServer {
            transport,
            config: self.config,
        })
    }
}

impl Default for BingoServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay, ready to accept connections.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start.
pub struct BingoServer {
    transport: WebSocketTransport,
    config: ServerConfig,
}

impl BingoServer {
    /// Creates a new builder.
    pub fn builder() -> BingoServerBuilder {
        BingoServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// # Errors
    /// Only fails if the listener itself fails to shut down.
    pub async fn run(self) -> Result<(), BingoError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves.
    ///
    /// Each accepted TCP connection gets its own handler task, which also
    /// runs the WebSocket upgrade, so a slow or silent peer never holds up
    /// the next one. On shutdown the listener stops and the coordinator is
    /// stopped with it; in-memory state is discarded.
    ///
    /// # Errors
    /// Only fails if the listener itself fails to shut down.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), BingoError> {
        let (coordinator, coordinator_task) = spawn_coordinator(
            self.config.limits.clone(),
            self.config.event_capacity,
            self.config.stats_interval,
        );
        let heartbeat = self.config.heartbeat.validated();

        tracing::info!(addr = %self.config.bind_addr, "bingo relay running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let coordinator = coordinator.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(pending, coordinator, heartbeat).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
            }
        }

        self.transport.shutdown().await?;
        coordinator_task.abort();
        tracing::info!("bingo relay stopped");
        Ok(())
    }
}

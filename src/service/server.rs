use crate::bank::engine::TransactionEngine;
use crate::config::{BankConfig, ServerConfig};
use crate::core::wire::WireCodec;
use crate::error::Result;
use crate::protocol::dispatcher::Dispatcher;
use crate::service::connection::ConnectionHandler;
use crate::utils::crypto::SymmetricCipher;
use crate::utils::metrics::Metrics;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, error, info, instrument, warn};

/// TCP front end for a [`TransactionEngine`].
///
/// At most `max_connections` clients are served at once; further connections
/// are accepted and immediately closed.
pub struct BankServer {
    listener: TcpListener,
    dispatcher: Dispatcher,
    wire: WireCodec,
    config: ServerConfig,
    max_payload: usize,
    metrics: Arc<Metrics>,
}

impl BankServer {
    /// Validate `config` and bind the listener it describes.
    ///
    /// The wire envelope is keyed by `config.transport.passphrase`,
    /// independently of the cipher the engine seals data with.
    ///
    /// # Errors
    /// `Config` if validation fails, `Io` if the address cannot be bound.
    #[instrument(skip(config, engine), fields(address = %config.server.address))]
    pub async fn bind(config: &BankConfig, engine: Arc<TransactionEngine>) -> Result<Self> {
        config.validate_strict()?;
        let listener = TcpListener::bind(&config.server.address).await?;

        let wire = if config.transport.encryption_enabled {
            WireCodec::encrypted(Arc::new(SymmetricCipher::from_passphrase(
                &config.transport.passphrase,
            )))
        } else {
            warn!("Transport encryption disabled, messages travel as plain JSON");
            WireCodec::plain()
        };

        info!(address = %listener.local_addr()?, "Listening");
        Ok(Self {
            listener,
            dispatcher: Dispatcher::new(engine),
            wire,
            config: config.server.clone(),
            max_payload: config.transport.max_payload_size,
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Serve until CTRL+C
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.run_with_shutdown(shutdown_rx).await
    }

    /// Serve until `shutdown_rx` yields (or its sender is dropped), then
    /// signal every connection and wait up to `shutdown_timeout` for them to
    /// drain.
    #[instrument(skip_all)]
    pub async fn run_with_shutdown(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let permits = Arc::new(Semaphore::new(self.config.max_connections));
        let (close_tx, close_rx) = watch::channel(false);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,

                accept_result = self.listener.accept() => {
                    let (stream, peer) = match accept_result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                            continue;
                        }
                    };

                    let Ok(permit) = permits.clone().try_acquire_owned() else {
                        self.metrics.connection_rejected();
                        warn!(%peer, limit = self.config.max_connections, "Connection limit reached, refusing");
                        drop(stream);
                        continue;
                    };

                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
                    }

                    self.metrics.connection_established();
                    let handler = ConnectionHandler::new(stream, self.dispatcher.clone(), self.wire.clone())
                        .with_max_payload(self.max_payload)
                        .with_idle_timeout(self.config.idle_timeout)
                        .with_metrics(self.metrics.clone())
                        .with_peer(peer.to_string());
                    let metrics = self.metrics.clone();
                    let close_rx = close_rx.clone();

                    tokio::spawn(async move {
                        match handler.run(close_rx).await {
                            Ok(()) => debug!(%peer, "Connection closed"),
                            Err(e) => info!(%peer, error = %e, "Connection terminated"),
                        }
                        metrics.connection_closed();
                        drop(permit);
                    });
                }
            }
        }

        info!("Shutting down server. Waiting for connections to close...");
        let _ = close_tx.send(true);
        self.drain().await;
        self.metrics.log_summary();
        Ok(())
    }

    async fn drain(&self) {
        let timeout = tokio::time::sleep(self.config.shutdown_timeout);
        tokio::pin!(timeout);

        loop {
            let connections = self.metrics.active_connections();
            if connections == 0 {
                info!("All connections closed, shutting down");
                return;
            }
            tokio::select! {
                _ = &mut timeout => {
                    warn!(connections, "Shutdown timeout reached, forcing exit");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_millis(50)) => {
                    debug!(connections, "Waiting for connections to close");
                }
            }
        }
    }
}

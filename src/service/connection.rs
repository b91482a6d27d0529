use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::core::wire::WireCodec;
use crate::error::{BankError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::{Request, Response};
use crate::protocol::session::Session;
use crate::utils::metrics::{Metrics, Timer};
use crate::utils::timeout::IDLE_TIMEOUT;

use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

/// Serves one client connection from first packet to close.
///
/// Requests are handled strictly one at a time. Engine work runs on the
/// blocking pool so credential hashing never stalls the reactor.
pub struct ConnectionHandler<S> {
    framed: Framed<S, PacketCodec>,
    wire: WireCodec,
    dispatcher: Dispatcher,
    session: Session,
    idle_timeout: Duration,
    metrics: Arc<Metrics>,
    peer: String,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, dispatcher: Dispatcher, wire: WireCodec) -> Self {
        Self {
            framed: Framed::new(stream, PacketCodec::default()),
            wire,
            dispatcher,
            session: Session::default(),
            idle_timeout: IDLE_TIMEOUT,
            metrics: Arc::new(Metrics::new()),
            peer: String::from("unknown"),
        }
    }

    /// Reject frames whose payload is larger than `max_payload` bytes
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        *self.framed.codec_mut() = PacketCodec::new(max_payload);
        self
    }

    /// Close the connection after `idle_timeout` without a request
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Label used in log events
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    pub fn session(&self) -> Session {
        self.session
    }

    /// Serve requests until the peer leaves, logs out, idles out, or the
    /// server signals shutdown.
    ///
    /// # Errors
    /// Returns the transport error that ended the connection. A request that
    /// fails validation or business rules is answered and does not end it.
    #[instrument(skip_all, fields(peer = %self.peer))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let outcome = self.serve(&mut shutdown).await;
        self.session = self.session.close();
        outcome
    }

    async fn serve(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        loop {
            if self.session.is_closed() || *shutdown.borrow() {
                return Ok(());
            }

            let next = tokio::select! {
                _ = shutdown.changed() => {
                    debug!("Shutdown signalled, closing connection");
                    return Ok(());
                }
                next = tokio::time::timeout(self.idle_timeout, self.framed.next()) => next,
            };

            let packet = match next {
                Err(_) => {
                    info!(idle_ms = self.idle_timeout.as_millis() as u64, "Idle timeout reached");
                    return Err(BankError::ConnectionTimeout);
                }
                Ok(None) => {
                    debug!("Peer closed the connection");
                    return Ok(());
                }
                Ok(Some(frame)) => frame?,
            };
            self.metrics.frame_received(packet.payload.len() as u64);

            let response = match self.wire.decode(&packet.payload) {
                Ok(message) => match Request::from_wire(&message) {
                    Ok(request) => self.dispatch(request).await?,
                    Err(e) => {
                        debug!(error = %e, "Malformed request");
                        Response::error(e.client_message())
                    }
                },
                Err(e) => {
                    if e.is_decryption_failure() {
                        self.metrics.decryption_failed();
                    }
                    if e.closes_connection() {
                        warn!(error = %e, "Undecodable message, dropping connection");
                        return Err(e);
                    }
                    debug!(error = %e, "Rejected message");
                    Response::error(e.client_message())
                }
            };

            self.metrics.request_handled(response.is_ok());
            self.send(&response).await?;
        }
    }

    async fn dispatch(&mut self, request: Request) -> Result<Response> {
        let _timer = Timer::start(request.kind().as_str());
        let dispatcher = self.dispatcher.clone();
        let session = self.session;
        let (session, response) =
            tokio::task::spawn_blocking(move || dispatcher.dispatch(session, request))
                .await
                .map_err(|e| BankError::Connection(format!("Request task failed: {e}")))?;
        self.session = session;
        Ok(response)
    }

    async fn send(&mut self, response: &Response) -> Result<()> {
        let payload = self.wire.encode_response(response)?;
        let len = payload.len() as u64;
        self.framed.send(Packet::new(payload)).await?;
        self.metrics.frame_sent(len);
        Ok(())
    }
}

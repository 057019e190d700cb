//! Websocket accept loop and per-connection tasks.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rattan_config::GatewaySettings;
use rattan_core::{Directive, Frame, GatewayCore};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::pool::{ConnectionError, ConnectionHandle, ConnectionPool, Outbound};

/// Gateway transport errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Socket-level failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Handshake or framing failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// Bad bind address in configuration
    #[error("address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    /// Writer channel failure
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// The websocket server: accepts connections, drives the core, executes
/// its directives.
#[derive(Clone)]
pub struct GatewayServer {
    settings: GatewaySettings,
    core: Arc<GatewayCore>,
    pool: Arc<ConnectionPool>,
    next_id: Arc<AtomicU64>,
}

impl GatewayServer {
    /// Build a server around a shared core.
    pub fn new(settings: GatewaySettings, core: Arc<GatewayCore>) -> Self {
        Self {
            settings,
            core,
            pool: Arc::new(ConnectionPool::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The pool of writer handles.
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// The shared core.
    pub fn core(&self) -> &Arc<GatewayCore> {
        &self.core
    }

    /// Bind the configured address and serve until the task is dropped.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = self.settings.bind.parse()?;
        let listener = TcpListener::bind(&addr).await?;
        info!("gateway listening on ws://{}", addr);
        self.run_with_listener(listener).await
    }

    /// Serve on an already-bound listener. Split out so tests can bind
    /// port 0 and read the address back.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), GatewayError> {
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!(%peer_addr, "new tcp connection");

            if self.pool.count() >= self.settings.max_connections {
                warn!(%peer_addr, "pool full, rejecting connection");
                let server = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = server.reject_connection(stream).await {
                        debug!(%peer_addr, error = %e, "rejection handshake failed");
                    }
                });
                continue;
            }

            let id = rattan_core::ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
            // Reserve the slot here, before the handshake: the accept
            // loop is the only task that adds to the pool, so a burst of
            // connects cannot overshoot max_connections while earlier
            // handshakes are still in flight.
            let (tx, rx) = mpsc::unbounded_channel::<Outbound>();
            self.pool.add(ConnectionHandle::new(id, peer_addr, tx));

            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer_addr, id, rx).await {
                    error!(conn = %id, %peer_addr, error = %e, "connection error");
                }
            });
        }
    }

    /// Push one payload to every live connection.
    pub fn broadcast(&self, payload: &[u8]) {
        self.execute(self.core.broadcast(payload));
    }

    /// Complete the handshake, then close immediately with a
    /// try-again-later code. The registry is never touched.
    async fn reject_connection(&self, stream: TcpStream) -> Result<(), GatewayError> {
        let ws_stream = accept_async(stream).await?;
        let (mut sender, _) = ws_stream.split();
        sender
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Again,
                reason: "server at capacity".into(),
            })))
            .await?;
        sender.close().await?;
        Ok(())
    }

    /// Drive one connection from handshake to close. The pool slot was
    /// reserved by the accept loop; every exit path releases it.
    async fn handle_connection(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        id: rattan_core::ConnectionId,
        mut rx: mpsc::UnboundedReceiver<Outbound>,
    ) -> Result<(), GatewayError> {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                self.pool.remove(id);
                return Err(e.into());
            }
        };
        let (mut sender, mut receiver) = ws_stream.split();

        if let Err(e) = self.core.handle_open(id).await {
            // Ids are allocated monotonically, so this only fires if the
            // application seeded the registry out-of-band.
            warn!(conn = %id, error = %e, "open rejected");
            self.pool.remove(id);
            return Ok(());
        }
        info!(conn = %id, %addr, "websocket connection established");

        loop {
            tokio::select! {
                Some(outbound) = rx.recv() => match outbound {
                    Outbound::Data(payload) => {
                        if let Err(e) = sender.send(encode(payload)).await {
                            error!(conn = %id, error = %e, "failed to send to client");
                            break;
                        }
                    }
                    Outbound::Close => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                },
                msg = receiver.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.deliver(Frame::text(id, text)).await,
                    Some(Ok(Message::Binary(data))) => self.deliver(Frame::binary(id, data)).await,
                    Some(Ok(Message::Ping(data))) => {
                        // Answered here; ping/pong never reaches the core
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(conn = %id, "close frame from client");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(conn = %id, %addr, error = %e, "websocket error");
                        break;
                    }
                    None => break,
                },
            }
        }

        self.pool.remove(id);
        if let Err(e) = self.core.handle_close(id).await {
            warn!(conn = %id, error = %e, "close bookkeeping failed");
        }
        info!(conn = %id, %addr, "connection disconnected");
        Ok(())
    }

    /// Hand a frame to the core and execute whatever comes back.
    async fn deliver(&self, frame: Frame) {
        let conn = frame.conn;
        match self.core.handle_message(frame).await {
            Ok(directives) => self.execute(directives),
            Err(e) => warn!(conn = %conn, error = %e, "frame dropped"),
        }
    }

    /// Execute directives in order through the pool.
    fn execute(&self, directives: Vec<Directive>) {
        for directive in directives {
            let result = match directive {
                Directive::Push { conn, payload } => self.pool.push_to(conn, payload),
                Directive::Close { conn } => self.pool.close_to(conn),
            };
            if let Err(e) = result {
                // Target vanished between dispatch and execution
                warn!(error = %e, "directive not executed");
            }
        }
    }
}

/// Re-encode a directive payload for the wire: text when it is valid
/// UTF-8, binary otherwise.
fn encode(payload: Vec<u8>) -> Message {
    match String::from_utf8(payload) {
        Ok(text) => Message::Text(text),
        Err(raw) => Message::Binary(raw.into_bytes()),
    }
}

/// Build the response policy selected in the settings.
pub fn build_policy(settings: &GatewaySettings) -> Arc<dyn rattan_core::ResponsePolicy> {
    match settings.policy {
        rattan_config::PolicyKind::AckThenClose => {
            Arc::new(rattan_core::AckThenClose::new(settings.ack_payload.as_bytes()))
        }
        rattan_config::PolicyKind::Echo => Arc::new(rattan_core::Echo),
    }
}

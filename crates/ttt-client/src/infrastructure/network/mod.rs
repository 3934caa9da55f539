//! Network infrastructure for the client application.
//!
//! Owns the single TCP connection to the TTT-Online server and turns the
//! byte stream into [`NetworkEvent`]s for the session loop.
//!
//! Architecture:
//! - `ConnectionManager::connect` spawns one connection task.
//! - The connection task splits the socket.  A reader loop decodes frames
//!   and forwards events on a bounded `mpsc` channel; a writer task drains
//!   an unbounded queue of encoded frames, writing and flushing each one.
//!   The writer is the only code that touches the write half.
//! - Session clients reach the writer through the shared [`OutboundLink`].
//! - One second after connecting (configurable) a single
//!   [`NetworkEvent::Settled`] is emitted so the session can run its
//!   post-connect action once the server has finished setting up.
//!
//! There is no automatic reconnect.  A failed connect or a closed
//! connection is reported once and the manager returns to `Disconnected`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::{mpsc, watch},
    time,
};
use tracing::{debug, error, info, warn};
use ttt_core::{
    decode_response, encode_response, frame, FrameDecoder, GameMessage, ProtocolError, Response,
};

use crate::application::session_client::{OutboundLink, SessionClient};

const READ_BUF_SIZE: usize = 4096;

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientNetworkError {
    /// TCP connection to the server failed.
    #[error("failed to connect to server at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The inbound byte stream could not be framed or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Tunables for the connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Delay between connecting and emitting [`NetworkEvent::Settled`].
    pub settle_delay: Duration,
    /// Capacity of the event channel handed to the session loop.
    pub event_channel_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            event_channel_capacity: 128,
        }
    }
}

/// Lifecycle of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Why a connection ended.
#[derive(Debug)]
pub enum CloseReason {
    /// The server closed the socket.
    RemoteClosed,
    /// [`ConnectionManager::close`] was called.
    LocalClose,
    /// The connection failed and was torn down.
    Failed(ClientNetworkError),
}

/// Events emitted by the network layer to the session loop.
#[derive(Debug)]
pub enum NetworkEvent {
    /// The TCP connection was established.
    Connected { addr: String },
    /// A routable message arrived from the server.
    Message(GameMessage),
    /// The server answered with an error string.
    RemoteError(String),
    /// The settle delay after connecting has elapsed.
    Settled,
    /// The connection ended.
    Disconnected(CloseReason),
    /// The connection attempt failed.
    ConnectFailed(ClientNetworkError),
}

struct Shared {
    config: ConnectionConfig,
    state: Mutex<ConnectionState>,
    close: Mutex<Option<watch::Sender<bool>>>,
    link: OutboundLink,
    events: mpsc::Sender<NetworkEvent>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    async fn emit(&self, event: NetworkEvent) {
        if self.events.send(event).await.is_err() {
            debug!("session loop gone; dropping network event");
        }
    }

    /// Like [`Shared::emit`], but gives up when `close` fires while the
    /// event channel is full.  Returns `false` in that case.
    async fn emit_unless_closed(
        &self,
        event: NetworkEvent,
        close: &mut watch::Receiver<bool>,
    ) -> bool {
        tokio::select! {
            _ = self.emit(event) => true,
            _ = close.changed() => false,
        }
    }
}

/// Manages the TCP connection from the client to the server.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Creates a manager and the receiver the session loop reads events from.
    pub fn new(config: ConnectionConfig) -> (Self, mpsc::Receiver<NetworkEvent>) {
        let (events, rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            close: Mutex::new(None),
            link: OutboundLink::new(),
            events,
        });
        (Self { shared }, rx)
    }

    pub fn state(&self) -> ConnectionState {
        *self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a request client bound to whichever connection is active.
    pub fn client(&self) -> SessionClient {
        SessionClient::new(self.shared.link.clone())
    }

    /// Starts connecting to `host:port` in the background.
    ///
    /// Returns `false` without doing anything when a connection is already
    /// being established or is up.  Must be called within a Tokio runtime.
    pub fn connect(&self, host: &str, port: u16) -> bool {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *state != ConnectionState::Disconnected {
                debug!(state = ?*state, "connect ignored");
                return false;
            }
            *state = ConnectionState::Connecting;
        }

        let (close_tx, close_rx) = watch::channel(false);
        *self
            .shared
            .close
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(close_tx);

        let addr = format!("{host}:{port}");
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { run_connection(shared, addr, close_rx).await });
        true
    }

    /// Closes the active connection, if any.  The session loop receives
    /// [`NetworkEvent::Disconnected`] once teardown is complete.
    pub fn close(&self) {
        let sender = self
            .shared
            .close
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            info!("closing connection");
            let _ = sender.send(true);
        }
    }
}

async fn run_connection(shared: Arc<Shared>, addr: String, mut close: watch::Receiver<bool>) {
    let connected = tokio::select! {
        result = TcpStream::connect(&addr) => result,
        _ = close.changed() => {
            info!("connect to {addr} cancelled");
            shared.set_state(ConnectionState::Disconnected);
            shared.emit(NetworkEvent::Disconnected(CloseReason::LocalClose)).await;
            return;
        }
    };

    let stream = match connected {
        Ok(stream) => stream,
        Err(source) => {
            warn!("could not connect to server at {addr}: {source}");
            shared.set_state(ConnectionState::Disconnected);
            shared
                .emit(NetworkEvent::ConnectFailed(ClientNetworkError::ConnectFailed {
                    addr,
                    source,
                }))
                .await;
            return;
        }
    };

    if let Err(e) = stream.set_nodelay(true) {
        warn!("could not set TCP_NODELAY: {e}");
    }
    info!("connected to server at {addr}");

    let (read_half, write_half) = stream.into_split();
    let reason = serve(&shared, &addr, read_half, write_half, close).await;

    shared
        .close
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    shared.set_state(ConnectionState::Disconnected);

    match &reason {
        CloseReason::RemoteClosed => info!("server at {addr} closed the connection"),
        CloseReason::LocalClose => info!("connection to {addr} closed"),
        CloseReason::Failed(e) => warn!("connection to {addr} torn down: {e}"),
    }
    shared.emit(NetworkEvent::Disconnected(reason)).await;
}

/// Runs an established connection until the reader stops, the writer
/// fails, or `close` fires.  The outbound link is attached for exactly
/// that long.
async fn serve<R, W>(
    shared: &Shared,
    addr: &str,
    reader: R,
    writer: W,
    mut close: watch::Receiver<bool>,
) -> CloseReason
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    shared.link.attach(frame_tx.clone());
    shared.set_state(ConnectionState::Connected);

    let mut writer = tokio::spawn(write_loop(writer, frame_rx));
    let mut writer_done = false;
    let connected = NetworkEvent::Connected {
        addr: addr.to_string(),
    };

    let reason = if shared.emit_unless_closed(connected, &mut close).await {
        let settle = {
            let events = shared.events.clone();
            let delay = shared.config.settle_delay;
            tokio::spawn(async move {
                time::sleep(delay).await;
                let _ = events.send(NetworkEvent::Settled).await;
            })
        };

        let reason = tokio::select! {
            reason = read_loop(reader, &shared.events, &frame_tx, close) => reason,
            written = &mut writer => {
                writer_done = true;
                match written {
                    Ok(Ok(())) => CloseReason::LocalClose,
                    Ok(Err(e)) => CloseReason::Failed(e.into()),
                    Err(e) => {
                        error!("writer task failed: {e}");
                        CloseReason::Failed(std::io::Error::other(e.to_string()).into())
                    }
                }
            }
        };
        settle.abort();
        reason
    } else {
        CloseReason::LocalClose
    };

    shared.link.detach();
    drop(frame_tx);
    if !writer_done {
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("writer stopped with {e} during teardown"),
            Err(e) => error!("writer task failed: {e}"),
        }
    }
    reason
}

/// Writes queued frames until every sender is gone, flushing after each.
///
/// # Errors
///
/// Returns the first write or flush error; the connection is then torn
/// down by [`serve`].
async fn write_loop<W>(
    mut writer: W,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = frames.recv().await {
        let written = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            error!("failed to send frame: {e}");
            return Err(e);
        }
    }
    let _ = writer.shutdown().await;
    Ok(())
}

/// Reads frames from `reader` and forwards them on `events` until the
/// stream ends, a framing error occurs, or `close` fires (also while
/// waiting for room in `events`).
///
/// Error handling per frame:
/// - a malformed frame or outer `Response` tears the connection down;
/// - a known message kind with a malformed body is answered with an error
///   `Response` on `replies` and reading continues;
/// - an unknown message kind is dropped.
async fn read_loop<R>(
    mut reader: R,
    events: &mpsc::Sender<NetworkEvent>,
    replies: &mpsc::UnboundedSender<Vec<u8>>,
    mut close: watch::Receiver<bool>,
) -> CloseReason
where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];

    loop {
        let n = tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => return CloseReason::RemoteClosed,
                Ok(n) => n,
                Err(e) => {
                    error!("read error on connection: {e}");
                    return CloseReason::Failed(e.into());
                }
            },
            _ = close.changed() => return CloseReason::LocalClose,
        };
        decoder.extend(&buf[..n]);

        loop {
            let payload = match decoder.next_frame() {
                Ok(Some(payload)) => payload,
                Ok(None) => break,
                Err(e) => return CloseReason::Failed(e.into()),
            };
            let event = match decode_response(&payload) {
                Ok(Response::Error(text)) => {
                    warn!("server reported an error: {text}");
                    NetworkEvent::RemoteError(text)
                }
                Ok(Response::Body(envelope)) => match envelope.open() {
                    Ok(Some(message)) => {
                        debug!(kind = ?message.kind(), "received message");
                        NetworkEvent::Message(message)
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(type_url = %envelope.type_url, "malformed message body: {e}");
                        let reply = Response::Error(e.to_string());
                        let _ = replies.send(frame(&encode_response(&reply)));
                        continue;
                    }
                },
                Err(e) => return CloseReason::Failed(e.into()),
            };
            // A full channel must not keep `close` from taking effect.
            tokio::select! {
                sent = events.send(event) => {
                    if sent.is_err() {
                        return CloseReason::LocalClose;
                    }
                }
                _ = close.changed() => return CloseReason::LocalClose,
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

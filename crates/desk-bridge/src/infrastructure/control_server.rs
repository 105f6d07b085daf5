//! WebSocket control server: accept loop and per-connection sessions.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting control clients and upgrading each one to WebSocket.
//! 3. Answering every JSON request (see [`ControlRequest`]) with exactly one
//!    response frame on the same connection.
//! 4. Streaming log lines to sessions that sent `follow_logs`.
//! 5. Closing every session when shutdown is triggered.
//!
//! A malformed request is answered with an error response and the
//! connection stays open.
//!
//! [`ControlRequest`]: crate::domain::messages::ControlRequest

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use crate::application::control::ControlService;
use crate::application::shutdown::ShutdownSignal;
use crate::domain::messages::{ControlRequest, ControlResponse};

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the control listener for [`serve`].
///
/// # Errors
///
/// Returns an error if `addr` cannot be bound (port in use, no permission).
pub async fn bind(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind control listener on {addr}"))?;
    info!("control server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accepts control connections until `shutdown` is triggered.
///
/// Each accepted connection is handed to a dedicated task so that one slow
/// client never blocks the others.  Sessions hold their own clone of the
/// shutdown signal and close themselves.
///
/// # Parameters
///
/// - `listener` – A listener from [`bind`].
/// - `service`  – Shared request handler for every session.
/// - `shutdown` – Stops the accept loop and, through its clones, every
///   session.
pub async fn serve(
    listener: TcpListener,
    service: Arc<ControlService>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("control server stopping");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    info!("control connection from {peer_addr}");
                    let service = Arc::clone(&service);
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        handle_session(stream, peer_addr, service, shutdown).await;
                    });
                }
                // Transient (e.g. too many open files); keep accepting.
                Err(e) => error!("accept error: {e}"),
            },
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Runs one session and logs how it ended.
async fn handle_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    service: Arc<ControlService>,
    shutdown: ShutdownSignal,
) {
    match run_session(stream, peer_addr, service, shutdown).await {
        Ok(()) => info!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

/// What woke the session loop.
enum Event {
    Inbound(WsMessage),
    Log(String),
    /// The session fell behind the log feed by this many lines.
    LogsSkipped(u64),
    LogsEnded,
    Closed,
}

/// Runs the complete lifecycle of one control session.
///
/// This function:
///
/// 1. Completes the WebSocket handshake.
/// 2. Waits for shutdown, an inbound frame or (once following) a log line.
/// 3. Answers text frames through `service`, subscribing to the log feed on
///    `follow_logs`.
/// 4. Returns when the peer closes or shutdown is triggered.
///
/// # Errors
///
/// Returns an error if the handshake fails or a frame cannot be read or
/// sent.
async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    service: Arc<ControlService>,
    mut shutdown: ShutdownSignal,
) -> anyhow::Result<()> {
    // ── Step 1: Complete the WebSocket handshake ──────────────────────────────
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    debug!("session {peer_addr}: WebSocket established");

    let mut logs: Option<broadcast::Receiver<String>> = None;

    loop {
        // ── Step 2: Wait for the next thing to do ─────────────────────────────
        let event = tokio::select! {
            _ = shutdown.cancelled() => {
                // Best effort; the peer may already be gone.
                let _ = ws_tx.send(WsMessage::Close(None)).await;
                break;
            }
            line = next_log_line(&mut logs), if logs.is_some() => match line {
                Ok(line) => Event::Log(line),
                Err(RecvError::Lagged(skipped)) => Event::LogsSkipped(skipped),
                Err(RecvError::Closed) => Event::LogsEnded,
            },
            next = ws_rx.next() => match next {
                Some(Ok(msg)) => Event::Inbound(msg),
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                    debug!("session {peer_addr}: closed by peer");
                    Event::Closed
                }
                Some(Err(e)) => return Err(e).context("WebSocket read failed"),
                None => Event::Closed,
            },
        };

        // ── Step 3: Act on it ─────────────────────────────────────────────────
        let reply = match event {
            Event::Inbound(WsMessage::Text(text)) => {
                let response = match ControlService::parse_request(&text) {
                    Ok(request) => {
                        if request == ControlRequest::FollowLogs && logs.is_none() {
                            debug!("session {peer_addr}: following logs");
                            logs = Some(service.follow_logs());
                        }
                        service.handle(request).await
                    }
                    Err(response) => response,
                };
                Some(response)
            }
            Event::Inbound(WsMessage::Binary(_)) => {
                warn!("session {peer_addr}: unexpected binary frame (ignored)");
                None
            }
            Event::Inbound(WsMessage::Ping(data)) => {
                debug!("session {peer_addr}: ping ({} bytes)", data.len());
                None
            }
            Event::Inbound(WsMessage::Close(_)) => {
                debug!("session {peer_addr}: close frame received");
                break;
            }
            Event::Inbound(WsMessage::Pong(_) | WsMessage::Frame(_)) => None,
            Event::Log(line) => Some(ControlResponse::Log { line }),
            Event::LogsSkipped(skipped) => Some(ControlResponse::Log {
                line: format!("... {skipped} log lines skipped"),
            }),
            Event::LogsEnded => {
                logs = None;
                None
            }
            Event::Closed => break,
        };

        if let Some(response) = reply {
            let json = serde_json::to_string(&response).context("encoding response")?;
            ws_tx
                .send(WsMessage::Text(json))
                .await
                .context("WebSocket send failed")?;
        }
    }

    Ok(())
}

/// Next line from the log feed; pending forever when not following.
async fn next_log_line(
    logs: &mut Option<broadcast::Receiver<String>>,
) -> Result<String, RecvError> {
    match logs {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

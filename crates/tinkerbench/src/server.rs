//! Listener and session manager
//!
//! One client is served at a time. A session reads a complete frame,
//! dispatches it, writes the response, and only then reads the next frame.
//! Framing errors and disconnects end the session; the listener keeps
//! accepting.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use benchconf::{SessionConfig, SessionPolicy};
use benchproto::{decode_json, encode_json, ErrorCode, FrameCodec, Request, Response};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatch::CommandRegistry;

pub struct Server {
    listener: TcpListener,
    commands: Arc<CommandRegistry>,
    session: SessionConfig,
    shutdown: CancellationToken,
}

impl Server {
    pub async fn bind(addr: &str, commands: CommandRegistry, session: SessionConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!(addr = %listener.local_addr()?, policy = %session.policy, "listening");
        Ok(Self {
            listener,
            commands: Arc::new(commands),
            session,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Cancelling this token stops the listener and any active session.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(self) -> Result<()> {
        let gate = Arc::new(Semaphore::new(1));
        let mut sessions = JoinSet::new();
        let mut active: Option<CancellationToken> = None;
        let mut next_id: u64 = 0;

        loop {
            let (stream, peer) = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };
            while sessions.try_join_next().is_some() {}

            if let Err(e) = stream.set_nodelay(true) {
                debug!(error = %e, "set_nodelay failed");
            }
            next_id += 1;
            let id = next_id;
            let framed = Framed::new(stream, FrameCodec::new(self.session.max_frame_bytes));

            match self.session.policy {
                SessionPolicy::Reject => match Arc::clone(&gate).try_acquire_owned() {
                    Ok(permit) => {
                        let session = self.session_task(id, peer, framed, permit);
                        active = Some(session.cancel.clone());
                        sessions.spawn(session.run());
                    }
                    Err(_) => {
                        info!(session = id, %peer, "rejecting client, another session is active");
                        sessions.spawn(reject_busy(framed));
                    }
                },
                SessionPolicy::Supersede => {
                    if let Some(previous) = active.take() {
                        info!(session = id, %peer, "superseding active session");
                        previous.cancel();
                    }
                    let cancel = self.shutdown.child_token();
                    active = Some(cancel.clone());
                    let gate = Arc::clone(&gate);
                    let commands = Arc::clone(&self.commands);
                    sessions.spawn(async move {
                        // the previous session releases the permit once its
                        // in-flight command has been answered
                        let permit = tokio::select! {
                            _ = cancel.cancelled() => return,
                            permit = gate.acquire_owned() => match permit {
                                Ok(permit) => permit,
                                Err(_) => return,
                            },
                        };
                        Session {
                            id,
                            peer,
                            framed,
                            commands,
                            cancel,
                            _permit: permit,
                        }
                        .run()
                        .await
                    });
                }
            }
        }

        info!("listener stopping");
        self.shutdown.cancel();
        while sessions.join_next().await.is_some() {}
        Ok(())
    }

    fn session_task(
        &self,
        id: u64,
        peer: SocketAddr,
        framed: Framed<TcpStream, FrameCodec>,
        permit: OwnedSemaphorePermit,
    ) -> Session {
        Session {
            id,
            peer,
            framed,
            commands: Arc::clone(&self.commands),
            cancel: self.shutdown.child_token(),
            _permit: permit,
        }
    }
}

struct Session {
    id: u64,
    peer: SocketAddr,
    framed: Framed<TcpStream, FrameCodec>,
    commands: Arc<CommandRegistry>,
    cancel: CancellationToken,
    _permit: OwnedSemaphorePermit,
}

impl Session {
    async fn run(mut self) {
        let id = self.id;
        info!(session = id, peer = %self.peer, "session started");

        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(session = id, "session stopped");
                    break;
                }
                frame = self.framed.next() => frame,
            };

            let body = match frame {
                None => {
                    info!(session = id, "client disconnected");
                    break;
                }
                Some(Err(e)) => {
                    warn!(session = id, error = %e, "framing error, closing session");
                    break;
                }
                Some(Ok(body)) => body,
            };

            // dispatch is not raced against cancellation; an in-flight
            // command always gets its response
            let response = match decode_json::<Request>(&body) {
                Ok(request) => {
                    debug!(session = id, command = %request.command_type, "request");
                    self.commands.dispatch(request).await
                }
                Err(e) => {
                    warn!(session = id, error = %e, "malformed request");
                    Response::error(ErrorCode::MalformedRequest, e.to_string())
                }
            };

            let limit = self.framed.codec().max_frame_bytes();
            if let Err(e) = self.framed.send(encode_response(&response, limit)).await {
                warn!(session = id, error = %e, "failed to write response, closing session");
                break;
            }
        }
    }
}

const UNENCODABLE: &[u8] =
    br#"{"success":false,"error-code":"INTERNAL_ERROR","error-message":"response could not be encoded"}"#;

/// Encode a response that fits in one frame of `limit` bytes. A body over
/// the limit is swapped for a `RESPONSE_TOO_LARGE` error.
fn encode_response(response: &Response, limit: usize) -> Bytes {
    let body = match encode_json(response) {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "failed to encode response");
            return Bytes::from_static(UNENCODABLE);
        }
    };
    if body.len() <= limit {
        return body;
    }

    warn!(len = body.len(), limit, "response exceeds frame limit");
    let too_large = Response::error(
        ErrorCode::ResponseTooLarge,
        format!("response of {} bytes exceeds the {limit} byte frame limit", body.len()),
    );
    encode_json(&too_large).unwrap_or_else(|_| Bytes::from_static(UNENCODABLE))
}

async fn reject_busy(mut framed: Framed<TcpStream, FrameCodec>) {
    let response = Response::error(
        ErrorCode::ServerBusy,
        "another client is connected; only one session is served at a time",
    );
    let limit = framed.codec().max_frame_bytes();
    if let Err(e) = framed.send(encode_response(&response, limit)).await {
        debug!(error = %e, "could not deliver SERVER_BUSY");
    }
}

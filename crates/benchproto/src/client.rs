//! Async client for the remote-control listener.
//!
//! The protocol is strictly one request, one response, so the client holds
//! the connection exclusively and awaits each reply before the next send.

use crate::envelope::{Request, Response};
use crate::frame::{decode_json, encode_json, FrameCodec, FrameError};
use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::debug;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BenchClient {
    framed: Framed<TcpStream, FrameCodec>,
    timeout: Duration,
}

impl BenchClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .context("failed to connect to tinkerbench")?;
        stream.set_nodelay(true)?;
        Ok(Self {
            framed: Framed::new(stream, FrameCodec::default()),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one request and wait for its response.
    pub async fn request(&mut self, request: &Request) -> Result<Response> {
        debug!(command = %request.command_type, "sending request");
        self.send_raw(encode_json(request)?).await?;
        self.recv().await
    }

    /// Convenience wrapper taking the command name and a JSON parameter object.
    pub async fn call(&mut self, command: &str, parameters: Value) -> Result<Response> {
        self.request(&Request::with_parameters(command, parameters))
            .await
    }

    /// Send an arbitrary frame body. Used to exercise malformed input handling.
    pub async fn send_raw(&mut self, body: bytes::Bytes) -> Result<()> {
        self.framed.send(body).await?;
        Ok(())
    }

    /// Wait for the next response frame.
    pub async fn recv(&mut self) -> Result<Response> {
        let frame = tokio::time::timeout(self.timeout, self.framed.next())
            .await
            .map_err(|_| anyhow!("timed out after {:?} waiting for response", self.timeout))?
            .ok_or_else(|| anyhow!("connection closed by server"))?
            .map_err(|e: FrameError| anyhow!(e))?;
        Ok(decode_json(&frame)?)
    }

    /// Wait up to `wait` for a frame; `Ok(None)` if nothing arrived.
    pub async fn try_recv(&mut self, wait: Duration) -> Result<Option<Response>> {
        match tokio::time::timeout(wait, self.framed.next()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(anyhow!("connection closed by server")),
            Ok(Some(frame)) => Ok(Some(decode_json(&frame?)?)),
        }
    }

    /// True once the server has closed the connection.
    pub async fn is_closed(&mut self, wait: Duration) -> bool {
        matches!(
            tokio::time::timeout(wait, self.framed.next()).await,
            Ok(None) | Ok(Some(Err(_)))
        )
    }
}

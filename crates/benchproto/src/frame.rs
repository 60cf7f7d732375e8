//! Length-prefixed framing.
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes of
//! UTF-8 JSON. Partial reads are buffered until the whole frame is present.
//! A zero-length or oversized frame is a framing error: the session that
//! produced it is closed, because the stream can no longer be trusted.
//! A well-framed body that is not valid JSON is *not* a framing error; the
//! server answers it with `MALFORMED_REQUEST` and keeps the session.

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// 16 MiB
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Width of the length prefix.
pub const LENGTH_PREFIX_BYTES: usize = 4;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {len} bytes exceeds limit of {limit}")]
    TooLarge { len: usize, limit: usize },

    #[error("zero-length frame")]
    Empty,

    #[error("body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl FrameError {
    /// Whether the session must be closed after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FrameError::InvalidJson(_))
    }
}

/// Codec for `Framed<TcpStream, FrameCodec>`.
///
/// Decodes raw frame bodies; JSON interpretation happens one layer up so a
/// bad body can be answered without tearing down the stream.
#[derive(Debug)]
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
    max_frame_bytes: usize,
}

impl FrameCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        let inner = LengthDelimitedCodec::builder()
            .length_field_length(LENGTH_PREFIX_BYTES)
            .big_endian()
            .max_frame_length(max_frame_bytes)
            .new_codec();
        Self {
            inner,
            max_frame_bytes,
        }
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Declared length of the frame at the head of `src`.
    fn declared_len(src: &BytesMut) -> usize {
        if src.len() < LENGTH_PREFIX_BYTES {
            return 0;
        }
        u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        match self.inner.decode(src) {
            Ok(Some(frame)) if frame.is_empty() => Err(FrameError::Empty),
            Ok(Some(frame)) => Ok(Some(frame.freeze())),
            Ok(None) => Ok(None),
            // the inner codec rejects the head without consuming it
            Err(e) if e.kind() == io::ErrorKind::InvalidData => Err(FrameError::TooLarge {
                len: Self::declared_len(src),
                limit: self.max_frame_bytes,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), FrameError> {
        if item.is_empty() {
            return Err(FrameError::Empty);
        }
        if item.len() > self.max_frame_bytes {
            return Err(FrameError::TooLarge {
                len: item.len(),
                limit: self.max_frame_bytes,
            });
        }
        self.inner.encode(item, dst)?;
        Ok(())
    }
}

/// Serialize a record into a frame body.
pub fn encode_json<T: Serialize>(value: &T) -> Result<Bytes, FrameError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Parse a frame body into a record.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, FrameError> {
    Ok(serde_json::from_slice(body)?)
}

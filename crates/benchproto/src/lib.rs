//! benchproto - wire types for the tinkerbench remote-control protocol
//!
//! One external client drives the node-graph editor over TCP. Every turn is
//! exactly one request followed by exactly one response; there is no
//! pipelining and no streaming.
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+-------------------------------+
//! | length (u32, BE)     | UTF-8 JSON record             |
//! +----------------------+-------------------------------+
//! ```
//!
//! Requests:
//!
//! ```json
//! {"command-type": "discover_operations", "parameters": {"query": "clamp", "max-results": 5}}
//! ```
//!
//! Responses:
//!
//! ```json
//! {"success": true, "payload": {"operations": [...]}}
//! {"success": false, "error-code": "STALE_TEMPLATE", "error-message": "..."}
//! ```
//!
//! ## Modules
//!
//! - `envelope` - `Request`, `Response`, `ErrorCode`, `CommandError`
//! - `frame` - length-prefixed framing codec for `tokio_util::codec::Framed`
//! - `params` - typed, schema-described parameters for the core commands
//! - `client` - a minimal async client used by `benchctl` and the tests

pub mod client;
pub mod envelope;
pub mod frame;
pub mod params;

pub use client::BenchClient;
pub use envelope::{CommandError, ErrorCode, Request, Response};
pub use frame::{decode_json, encode_json, FrameCodec, FrameError, DEFAULT_MAX_FRAME_BYTES};
pub use params::{PinAddress, Position};

/// Default TCP port for the remote-control listener.
pub const DEFAULT_PORT: u16 = 55557;

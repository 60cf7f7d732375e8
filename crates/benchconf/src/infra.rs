//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Listener address for the remote-control socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Host to bind. Loopback only by default; the protocol is not meant
    /// to be exposed beyond the local machine.
    /// Default: 127.0.0.1
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// TCP port to bind.
    /// Default: 55557
    #[serde(default = "BindConfig::default_port")]
    pub port: u16,
}

impl BindConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        55557
    }

    /// `host:port` form suitable for `TcpListener::bind`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

/// What to do when a second client connects while one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// Answer the newcomer with SERVER_BUSY and close it.
    #[default]
    Reject,
    /// Stop the active session after its in-flight command, then serve the newcomer.
    Supersede,
}

impl SessionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPolicy::Reject => "reject",
            SessionPolicy::Supersede => "supersede",
        }
    }
}

impl fmt::Display for SessionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(SessionPolicy::Reject),
            "supersede" => Ok(SessionPolicy::Supersede),
            other => Err(format!("unknown session policy: {other}")),
        }
    }
}

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Second-client policy.
    /// Default: reject
    #[serde(default)]
    pub policy: SessionPolicy,

    /// Largest request frame accepted, in bytes. Bigger frames close the session.
    /// Default: 16 MiB
    #[serde(default = "SessionConfig::default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl SessionConfig {
    fn default_max_frame_bytes() -> usize {
        16 * 1024 * 1024
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            policy: SessionPolicy::default(),
            max_frame_bytes: Self::default_max_frame_bytes(),
        }
    }
}

/// Main-thread marshalling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarshalConfig {
    /// How long a session waits for the host's main thread to run a command.
    /// Default: 10000 (10s)
    #[serde(default = "MarshalConfig::default_task_timeout_ms")]
    pub task_timeout_ms: u64,
}

impl MarshalConfig {
    fn default_task_timeout_ms() -> u64 {
        10_000
    }
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            task_timeout_ms: Self::default_task_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter (trace, debug, info, warn, error, or an EnvFilter directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Complete infrastructure configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraConfig {
    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub marshal: MarshalConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

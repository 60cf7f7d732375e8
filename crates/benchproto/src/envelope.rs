//! Request/response records and the error taxonomy carried on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Request {
    /// Which registered command to run
    #[serde(alias = "type")]
    pub command_type: String,

    /// Command parameters, keyed by kebab-case name
    #[serde(default, alias = "params")]
    pub parameters: Map<String, Value>,
}

impl Request {
    pub fn new(command_type: impl Into<String>) -> Self {
        Self {
            command_type: command_type.into(),
            parameters: Map::new(),
        }
    }

    /// Build a request from a JSON value; non-object values yield empty parameters.
    pub fn with_parameters(command_type: impl Into<String>, parameters: Value) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            command_type: command_type.into(),
            parameters,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Exactly one response per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Response {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Response {
    /// Success response. Non-object payloads are wrapped as `{"result": value}`.
    pub fn ok(payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        Self {
            success: true,
            payload: Some(payload),
            error_code: None,
            error_message: None,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            error_code: Some(code.as_str().to_string()),
            error_message: Some(message.into()),
        }
    }

    /// Parsed error code, if this is an error response with a known code.
    pub fn code(&self) -> Option<ErrorCode> {
        self.error_code.as_deref().and_then(ErrorCode::parse)
    }

    /// Look up a payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.get(key))
    }
}

impl From<CommandError> for Response {
    fn from(err: CommandError) -> Self {
        Response::error(err.code, err.message)
    }
}

impl From<Result<Value, CommandError>> for Response {
    fn from(result: Result<Value, CommandError>) -> Self {
        match result {
            Ok(value) => Response::ok(value),
            Err(err) => err.into(),
        }
    }
}

/// Error codes a client can branch on.
///
/// `STALE_TEMPLATE` means "discover again"; `CONSTRUCTION_REJECTED` and
/// `UNRESOLVED_NODE_KIND` are hard failures for that descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Transport / dispatch
    CommandNotFound,
    InvalidParams,
    MalformedRequest,
    ServerBusy,
    ResponseTooLarge,

    // Marshalling
    MainThreadTimeout,
    MainThreadUnavailable,

    // Discovery / materialization
    StaleTemplate,
    UnresolvedNodeKind,
    ConstructionRejected,

    // Graph editing
    NodeNotFound,
    PinNotFound,
    GraphNotFound,
    BlueprintNotFound,
    IncompatiblePins,
    AlreadyExists,

    Internal,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 17] = [
        ErrorCode::CommandNotFound,
        ErrorCode::InvalidParams,
        ErrorCode::MalformedRequest,
        ErrorCode::ServerBusy,
        ErrorCode::ResponseTooLarge,
        ErrorCode::MainThreadTimeout,
        ErrorCode::MainThreadUnavailable,
        ErrorCode::StaleTemplate,
        ErrorCode::UnresolvedNodeKind,
        ErrorCode::ConstructionRejected,
        ErrorCode::NodeNotFound,
        ErrorCode::PinNotFound,
        ErrorCode::GraphNotFound,
        ErrorCode::BlueprintNotFound,
        ErrorCode::IncompatiblePins,
        ErrorCode::AlreadyExists,
        ErrorCode::Internal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::CommandNotFound => "COMMAND_NOT_FOUND",
            ErrorCode::InvalidParams => "INVALID_PARAMS",
            ErrorCode::MalformedRequest => "MALFORMED_REQUEST",
            ErrorCode::ServerBusy => "SERVER_BUSY",
            ErrorCode::ResponseTooLarge => "RESPONSE_TOO_LARGE",
            ErrorCode::MainThreadTimeout => "MAIN_THREAD_TIMEOUT",
            ErrorCode::MainThreadUnavailable => "MAIN_THREAD_UNAVAILABLE",
            ErrorCode::StaleTemplate => "STALE_TEMPLATE",
            ErrorCode::UnresolvedNodeKind => "UNRESOLVED_NODE_KIND",
            ErrorCode::ConstructionRejected => "CONSTRUCTION_REJECTED",
            ErrorCode::NodeNotFound => "NODE_NOT_FOUND",
            ErrorCode::PinNotFound => "PIN_NOT_FOUND",
            ErrorCode::GraphNotFound => "GRAPH_NOT_FOUND",
            ErrorCode::BlueprintNotFound => "BLUEPRINT_NOT_FOUND",
            ErrorCode::IncompatiblePins => "INCOMPATIBLE_PINS",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed command, ready to become an error `Response`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn command_not_found(command: &str) -> Self {
        Self::new(
            ErrorCode::CommandNotFound,
            format!("Unknown command type: {command}"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

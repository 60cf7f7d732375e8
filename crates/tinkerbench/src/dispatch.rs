//! Command registry and dispatch
//!
//! Handlers are registered once at startup under their command-type name.
//! `dispatch` never fails: unknown commands, bad parameters, handler errors
//! and handler panics all come back as an error `Response`.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use benchproto::{CommandError, Request, Response};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

/// Name of the built-in command that lists every registered command.
pub const LIST_COMMANDS: &str = "list_commands";

#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    /// One-line summary shown by `list_commands`.
    fn description(&self) -> &str;

    /// JSON schema for the `parameters` object.
    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn handle(&self, parameters: Map<String, Value>) -> Result<Value, CommandError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    fn description(&self) -> &str {
        "Check that the listener is alive"
    }

    async fn handle(&self, _parameters: Map<String, Value>) -> Result<Value, CommandError> {
        Ok(json!({
            "pong": true,
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }
}

#[derive(Clone)]
pub struct CommandRegistry {
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Registry with only `ping` (and the implicit `list_commands`).
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: BTreeMap::new(),
        };
        registry.register("ping", Ping);
        registry
    }

    /// Register `handler` under `name`, replacing any earlier registration.
    pub fn register(&mut self, name: impl Into<String>, handler: impl CommandHandler) {
        let name = name.into();
        if self.handlers.insert(name.clone(), Arc::new(handler)).is_some() {
            warn!(command = %name, "replaced existing command handler");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        name == LIST_COMMANDS || self.handlers.contains_key(name)
    }

    /// Registered command names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn commands(&self) -> Vec<CommandInfo> {
        self.handlers
            .iter()
            .map(|(name, handler)| CommandInfo {
                name: name.clone(),
                description: handler.description().to_string(),
                input_schema: handler.parameters_schema(),
            })
            .collect()
    }

    /// Run one request to completion and produce its response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request {
            command_type,
            parameters,
        } = request;

        if command_type == LIST_COMMANDS {
            return Response::ok(json!({ "commands": self.commands() }));
        }

        let Some(handler) = self.handlers.get(&command_type).cloned() else {
            warn!(command = %command_type, "unknown command type");
            return CommandError::command_not_found(&command_type).into();
        };

        let started = Instant::now();
        let outcome = AssertUnwindSafe(handler.handle(parameters))
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(payload)) => {
                debug!(command = %command_type, elapsed_ms, "command succeeded");
                Response::ok(payload)
            }
            Ok(Err(err)) => {
                debug!(command = %command_type, code = %err.code, elapsed_ms, "command failed");
                err.into()
            }
            Err(_) => {
                error!(command = %command_type, "command handler panicked");
                CommandError::internal(format!("handler for '{command_type}' panicked")).into()
            }
        }
    }
}

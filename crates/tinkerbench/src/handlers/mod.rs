//! Command handlers
//!
//! Each command is a plain function over `&mut HostState` and its typed
//! parameters. `HostCommand` adapts one into a `CommandHandler` that parses
//! the parameters on the session task and runs the body on the main thread.

mod blueprint;
mod discovery;
mod graph_edit;
mod nodes;

use async_trait::async_trait;
use benchproto::params::{parse, schema_of};
use benchproto::CommandError;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::dispatch::{CommandHandler, CommandRegistry};
use crate::editor::HostState;
use crate::graph::{Graph, GraphError};
use crate::marshal::MainThread;

pub use blueprint::{
    add_blueprint_variable, add_function_graph, compile_blueprint, create_blueprint,
};
pub use discovery::{discover_operations, CacheStatsCommand};
pub use graph_edit::{connect_pins, disconnect_pins, get_graph};
pub use nodes::{
    create_node_by_key, create_node_from_descriptor, delete_node, insert_reroute_nodes,
    set_pin_default,
};

type HostFn<P> = fn(&mut HostState, P) -> Result<Value, CommandError>;

/// A command whose body runs on the main thread.
pub struct HostCommand<P> {
    main: MainThread,
    description: &'static str,
    run: HostFn<P>,
}

impl<P> HostCommand<P> {
    pub fn new(main: MainThread, description: &'static str, run: HostFn<P>) -> Self {
        Self {
            main,
            description,
            run,
        }
    }
}

#[async_trait]
impl<P> CommandHandler for HostCommand<P>
where
    P: DeserializeOwned + JsonSchema + Send + 'static,
{
    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<P>()
    }

    async fn handle(&self, parameters: Map<String, Value>) -> Result<Value, CommandError> {
        let params: P = parse(parameters)?;
        let run = self.run;
        self.main.run(move |host| run(host, params)).await?
    }
}

/// Register every editor command against `main`.
pub fn register_all(registry: &mut CommandRegistry, main: &MainThread) {
    // core
    registry.register(
        "discover_operations",
        HostCommand::new(
            main.clone(),
            "Search the operations that can be placed at a graph location",
            discover_operations,
        ),
    );
    registry.register(
        "create_node_by_key",
        HostCommand::new(main.clone(), "Create a node from a descriptor key", create_node_by_key),
    );
    registry.register(
        "create_node_from_descriptor",
        HostCommand::new(
            main.clone(),
            "Create a node from a full operation descriptor",
            create_node_from_descriptor,
        ),
    );
    registry.register(
        "insert_reroute_nodes",
        HostCommand::new(
            main.clone(),
            "Route a link through reroute nodes at the given waypoints",
            insert_reroute_nodes,
        ),
    );

    // blueprints
    registry.register(
        "create_blueprint",
        HostCommand::new(main.clone(), "Create a blueprint with an empty event graph", create_blueprint),
    );
    registry.register(
        "add_blueprint_variable",
        HostCommand::new(main.clone(), "Add a member variable to a blueprint", add_blueprint_variable),
    );
    registry.register(
        "add_function_graph",
        HostCommand::new(main.clone(), "Add a function graph to a blueprint", add_function_graph),
    );
    registry.register(
        "compile_blueprint",
        HostCommand::new(
            main.clone(),
            "Recompile a blueprint and refresh its nodes",
            compile_blueprint,
        ),
    );

    // graph editing
    registry.register("get_graph", HostCommand::new(main.clone(), "Snapshot one graph", get_graph));
    registry.register(
        "connect_pins",
        HostCommand::new(main.clone(), "Link two pins, in either order", connect_pins),
    );
    registry.register(
        "disconnect_pins",
        HostCommand::new(main.clone(), "Remove the link between two pins", disconnect_pins),
    );
    registry.register("delete_node", HostCommand::new(main.clone(), "Remove a node and its links", delete_node));
    registry.register(
        "set_pin_default",
        HostCommand::new(main.clone(), "Set the literal default of an input pin", set_pin_default),
    );

    registry.register("get_cache_stats", CacheStatsCommand::new(main.clone()));
}

// === Shared helpers ===

pub(crate) fn parse_node_id(raw: &str) -> Result<Uuid, CommandError> {
    Uuid::parse_str(raw).map_err(|e| CommandError::invalid_params(format!("node-id '{raw}': {e}")))
}

pub(crate) fn node_payload(graph: &Graph, id: Uuid) -> Result<Value, CommandError> {
    let node = graph.node(id).ok_or(GraphError::NodeNotFound(id))?;
    Ok(json!({
        "node-id": id,
        "graph": graph.name(),
        "node": node,
    }))
}

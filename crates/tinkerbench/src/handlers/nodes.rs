//! Node creation, routing, and per-node edits

use std::collections::BTreeMap;

use benchproto::params::{
    CreateNodeByKeyParams, CreateNodeFromDescriptorParams, DeleteNodeParams,
    InsertRerouteNodesParams, SetPinDefaultParams,
};
use benchproto::CommandError;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::catalog::resolve_key;
use crate::descriptor::{OperationDescriptor, NODE_KINDS};
use crate::editor::HostState;
use crate::graph::GraphError;
use crate::materializer::{apply_defaults, materialize, MaterializeError};
use crate::router::insert_passthrough;

use super::{node_payload, parse_node_id};

/// Materialize a cached descriptor. A cache miss or stale entry resolves the
/// key straight from the live registry; the catalog is never walked here.
pub fn create_node_by_key(
    host: &mut HostState,
    params: CreateNodeByKeyParams,
) -> Result<Value, CommandError> {
    let blueprint = host.target_blueprint(params.blueprint.as_deref())?;

    let (descriptor, cache_hit) = match host.cache.lookup(&params.key, &host.registry) {
        Some(descriptor) => (descriptor, true),
        None => {
            let descriptor = resolve_key(&host.registry, &params.key)?;
            host.cache.insert(&descriptor);
            (descriptor, false)
        }
    };
    debug!(key = %params.key, cache_hit, "creating node by key");

    let (registry, graph) = host.graph_mut(&blueprint, &params.graph)?;
    let id = materialize(
        registry,
        graph,
        &descriptor,
        params.position.unwrap_or_default(),
        &params.pin_defaults,
    )?;

    let mut payload = node_payload(graph, id)?;
    payload["cache-hit"] = json!(cache_hit);
    Ok(payload)
}

/// Materialize a descriptor supplied in full by the client.
pub fn create_node_from_descriptor(
    host: &mut HostState,
    params: CreateNodeFromDescriptorParams,
) -> Result<Value, CommandError> {
    // the kind tag is checked first so an unknown kind is not reported as a
    // generic parameter error
    match params.descriptor.get("node-kind").and_then(Value::as_str) {
        Some(tag) if NODE_KINDS.contains(&tag) => {}
        Some(tag) => return Err(MaterializeError::UnresolvedKind(tag.to_string()).into()),
        None => {
            return Err(MaterializeError::UnresolvedKind("descriptor has no node-kind".into()).into())
        }
    }
    let descriptor: OperationDescriptor = serde_json::from_value(params.descriptor)
        .map_err(|e| CommandError::invalid_params(format!("descriptor: {e}")))?;

    let blueprint = host.target_blueprint(params.blueprint.as_deref())?;
    let (registry, graph) = host.graph_mut(&blueprint, &params.graph)?;
    let id = materialize(
        registry,
        graph,
        &descriptor,
        params.position.unwrap_or_default(),
        &params.pin_defaults,
    )?;
    node_payload(graph, id)
}

pub fn insert_reroute_nodes(
    host: &mut HostState,
    params: InsertRerouteNodesParams,
) -> Result<Value, CommandError> {
    let source = parse_node_id(&params.source.node_id)?;
    let target = parse_node_id(&params.target.node_id)?;

    let blueprint = host.target_blueprint(params.blueprint.as_deref())?;
    let (registry, graph) = host.graph_mut(&blueprint, &params.graph)?;
    let ids = insert_passthrough(
        registry,
        graph,
        (source, &params.source.pin),
        (target, &params.target.pin),
        &params.waypoints,
    )?;

    let nodes: Vec<_> = ids.iter().filter_map(|id| graph.node(*id)).collect();
    info!(count = ids.len(), graph = graph.name(), "inserted reroute nodes");
    Ok(json!({
        "node-ids": ids,
        "nodes": nodes,
    }))
}

pub fn delete_node(host: &mut HostState, params: DeleteNodeParams) -> Result<Value, CommandError> {
    let id = parse_node_id(&params.node_id)?;
    let (_, graph) = host.graph_mut(&params.blueprint, &params.graph)?;
    graph.remove_node(id).ok_or(GraphError::NodeNotFound(id))?;
    Ok(json!({ "deleted": id }))
}

pub fn set_pin_default(
    host: &mut HostState,
    params: SetPinDefaultParams,
) -> Result<Value, CommandError> {
    let id = parse_node_id(&params.node_id)?;
    let (_, graph) = host.graph_mut(&params.blueprint, &params.graph)?;
    let node = graph.node_mut(id).ok_or(GraphError::NodeNotFound(id))?;

    let defaults = BTreeMap::from([(params.pin, params.value)]);
    apply_defaults(&mut node.pins, &defaults)?;
    node_payload(graph, id)
}

//! Path router
//!
//! Inserts reroute (passthrough) nodes along the link between two pins.
//! Each reroute takes the source pin's type, so every hop stays as
//! compatible as the original link and dataflow is unchanged. A route that
//! would displace some other link from a single-link pin is refused.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::descriptor::{describe_reroute, pin_names};
use crate::graph::{Graph, GraphError};
use crate::materializer::{materialize, MaterializeError};
use crate::primitives::{PinDirection, Position};
use crate::reflection::TypeRegistry;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("at least one waypoint is required")]
    NoWaypoints,

    #[error("{node}.{pin} is already linked to {linked_node}.{linked_pin}")]
    PinOccupied {
        node: Uuid,
        pin: String,
        linked_node: Uuid,
        linked_pin: String,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

/// Route the `source` -> `target` link through one reroute per waypoint,
/// in waypoint order. Pin arguments may be given in either direction.
/// On failure the graph is left as it was.
pub fn insert_passthrough(
    registry: &TypeRegistry,
    graph: &mut Graph,
    source: (Uuid, &str),
    target: (Uuid, &str),
    waypoints: &[Position],
) -> Result<Vec<Uuid>, RouteError> {
    if waypoints.is_empty() {
        return Err(RouteError::NoWaypoints);
    }

    let (source, target) = graph.validate_link(source, target, registry)?;
    ensure_free(graph, source, target)?;
    ensure_free(graph, target, source)?;
    let source_type = graph.pin(source.0, source.1)?.pin_type();
    let hop_type = if source_type.is_wildcard() {
        graph.pin(target.0, target.1)?.pin_type()
    } else {
        source_type
    };

    let had_link = graph.disconnect(source, target);

    let mut created = Vec::with_capacity(waypoints.len());
    for waypoint in waypoints {
        match materialize(registry, graph, &describe_reroute(), *waypoint, &BTreeMap::new()) {
            Ok(id) => {
                if let Some(node) = graph.node_mut(id) {
                    for pin in &mut node.pins {
                        pin.retype(&hop_type);
                    }
                }
                created.push(id);
            }
            Err(e) => {
                rollback(registry, graph, &created, had_link.then_some((source, target)));
                return Err(e.into());
            }
        }
    }

    if let Err(e) = wire_chain(registry, graph, source, target, &created) {
        rollback(registry, graph, &created, had_link.then_some((source, target)));
        return Err(e.into());
    }

    debug!(
        hops = created.len(),
        source = %source.0,
        target = %target.0,
        "inserted reroute nodes"
    );
    Ok(created)
}

/// Data inputs and exec outputs hold one link. Routing through such a pin
/// is only allowed when its current link, if any, is to `other`.
fn ensure_free(graph: &Graph, pin: (Uuid, &str), other: (Uuid, &str)) -> Result<(), RouteError> {
    let desc = graph.pin(pin.0, pin.1)?;
    let single = match desc.direction {
        PinDirection::Input => !desc.is_exec(),
        PinDirection::Output => desc.is_exec(),
    };
    if !single {
        return Ok(());
    }
    let displaced = graph
        .linked_pins(pin.0, pin.1)
        .into_iter()
        .find(|(node, name)| !(*node == other.0 && name == other.1));
    match displaced {
        Some((linked_node, linked_pin)) => Err(RouteError::PinOccupied {
            node: pin.0,
            pin: pin.1.to_string(),
            linked_node,
            linked_pin,
        }),
        None => Ok(()),
    }
}

fn wire_chain(
    registry: &TypeRegistry,
    graph: &mut Graph,
    source: (Uuid, &str),
    target: (Uuid, &str),
    chain: &[Uuid],
) -> Result<(), GraphError> {
    let mut upstream = source;
    for &reroute in chain {
        graph.connect(upstream, (reroute, pin_names::REROUTE_IN), registry)?;
        upstream = (reroute, pin_names::REROUTE_OUT);
    }
    graph.connect(upstream, target, registry)
}

fn rollback(
    registry: &TypeRegistry,
    graph: &mut Graph,
    created: &[Uuid],
    original: Option<((Uuid, &str), (Uuid, &str))>,
) {
    for id in created {
        graph.remove_node(*id);
    }
    if let Some((source, target)) = original {
        if let Err(e) = graph.connect(source, target, registry) {
            warn!(
                error = %e,
                source = %source.0,
                target = %target.0,
                "could not restore link after failed reroute"
            );
        }
    }
}

//! Node materializer
//!
//! Turns one exact descriptor into a live node. The node kind and its
//! target member come straight from the descriptor metadata; nothing is
//! searched for by name. After the descriptor's pins are populated the node
//! is reconstructed against the live registry, so a signature that changed
//! since discovery yields the current pin layout with defaults carried over.

use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::descriptor::{describe, OperationDescriptor, OperationKind};
use crate::graph::{Graph, GraphKind, GraphNode};
use crate::primitives::{PinDescriptor, PinDirection, Position};
use crate::reflection::{TypeKind, TypeRegistry};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MaterializeError {
    #[error("unresolved node kind: {0}")]
    UnresolvedKind(String),

    #[error("stale template for '{key}': {reason}")]
    StaleTemplate { key: String, reason: String },

    #[error("construction rejected: {0}")]
    Rejected(String),

    #[error("node has no pin '{0}'")]
    PinNotFound(String),
}

impl MaterializeError {
    fn stale(key: &str, reason: impl ToString) -> Self {
        MaterializeError::StaleTemplate {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Instantiate `descriptor` in `graph` at `position`. Returns the new node's id.
pub fn materialize(
    registry: &TypeRegistry,
    graph: &mut Graph,
    descriptor: &OperationDescriptor,
    position: Position,
    pin_defaults: &BTreeMap<String, String>,
) -> Result<Uuid, MaterializeError> {
    let key = &descriptor.key;
    if *key != descriptor.kind.key() {
        return Err(MaterializeError::Rejected(format!(
            "key '{key}' does not match its {} metadata",
            descriptor.kind.tag()
        )));
    }

    if let Some(template) = &descriptor.template {
        if Some(template.type_path.as_str()) != descriptor.kind.template_path() {
            return Err(MaterializeError::Rejected(format!(
                "template {template} does not back '{key}'"
            )));
        }
        if !registry.is_live(template) {
            return Err(MaterializeError::stale(
                key,
                format!("{template} has been unloaded or recompiled"),
            ));
        }
    }

    let live = describe(registry, &descriptor.kind).map_err(|e| MaterializeError::stale(key, e))?;

    check_constructible(registry, graph, &descriptor.kind)?;

    let mut pins = descriptor.pins.clone();
    apply_defaults(&mut pins, pin_defaults)?;
    let pins = reconcile(pins, live.pins);

    let node = GraphNode {
        id: Uuid::new_v4(),
        title: live.display_name,
        key: key.clone(),
        kind: descriptor.kind.clone(),
        position,
        pins,
        template: live.template,
        created_at: Utc::now(),
    };
    let id = graph.add_node(node);
    debug!(%id, key = %key, graph = graph.name(), "materialized node");
    Ok(id)
}

/// Host-side rules a descriptor can be well-formed and still violate.
fn check_constructible(
    registry: &TypeRegistry,
    graph: &Graph,
    kind: &OperationKind,
) -> Result<(), MaterializeError> {
    let reject = |msg: String| Err(MaterializeError::Rejected(msg));

    match kind {
        OperationKind::Event { owner_type, event } => {
            if graph.kind() == GraphKind::Function {
                return reject(format!("events cannot be placed in function graph '{}'", graph.name()));
            }
            if !registry.is_subclass_of(graph.owner_class(), owner_type) {
                return reject(format!(
                    "{} does not implement events of {owner_type}",
                    graph.owner_class()
                ));
            }
            let duplicate = graph.nodes().any(|n| {
                matches!(&n.kind, OperationKind::Event { owner_type: o, event: e } if o == owner_type && e == event)
            });
            if duplicate {
                return reject(format!("event '{event}' already exists in '{}'", graph.name()));
            }
        }
        OperationKind::VariableSet { owner_type, variable } => {
            let read_only = registry
                .get(owner_type)
                .and_then(|t| t.info.variable(variable))
                .is_some_and(|v| v.read_only);
            if read_only {
                return reject(format!("variable '{variable}' is read-only"));
            }
        }
        OperationKind::FunctionCall { owner_type, function } => {
            let latent = registry
                .get(owner_type)
                .and_then(|t| t.info.function(function))
                .is_some_and(|f| f.latent);
            if latent && graph.kind() == GraphKind::Function {
                return reject(format!(
                    "latent function '{function}' cannot be called from function graph '{}'",
                    graph.name()
                ));
            }
        }
        OperationKind::Cast { target_type } => {
            let is_class = registry
                .get(target_type)
                .is_some_and(|t| t.info.kind == TypeKind::Class);
            if !is_class {
                return reject(format!("'{target_type}' is not a class"));
            }
        }
        OperationKind::VariableGet { .. } | OperationKind::Reroute => {}
    }
    Ok(())
}

/// Apply caller-supplied literal defaults to input data pins.
pub fn apply_defaults(
    pins: &mut [PinDescriptor],
    defaults: &BTreeMap<String, String>,
) -> Result<(), MaterializeError> {
    for (name, value) in defaults {
        let pin = pins
            .iter_mut()
            .find(|p| &p.name == name)
            .ok_or_else(|| MaterializeError::PinNotFound(name.clone()))?;
        if pin.direction != PinDirection::Input || pin.is_exec() {
            return Err(MaterializeError::Rejected(format!(
                "pin '{name}' does not take a default value"
            )));
        }
        pin.default_value = Some(value.clone());
    }
    Ok(())
}

/// Live layout wins; defaults survive on pins that kept their shape.
fn reconcile(populated: Vec<PinDescriptor>, live: Vec<PinDescriptor>) -> Vec<PinDescriptor> {
    live.into_iter()
        .map(|mut pin| {
            let previous = populated.iter().find(|p| {
                p.name == pin.name
                    && p.direction == pin.direction
                    && p.type_category == pin.type_category
            });
            if let Some(previous) = previous {
                if previous.default_value.is_some() {
                    pin.default_value = previous.default_value.clone();
                }
            }
            pin
        })
        .collect()
}

/// Refresh an existing node against the live registry. Reroutes keep the
/// type they were given. Returns `false` if the node's template is gone.
pub fn reconstruct(registry: &TypeRegistry, node: &mut GraphNode) -> bool {
    if node.kind == OperationKind::Reroute {
        return true;
    }
    match describe(registry, &node.kind) {
        Ok(live) => {
            let pins = std::mem::take(&mut node.pins);
            node.pins = reconcile(pins, live.pins);
            node.template = live.template;
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::resolve_key;
    use crate::descriptor::describe_reroute;
    use crate::editor::{Blueprint, HostState, EVENT_GRAPH};
    use crate::reflection::{paths, ReflectedVariable};
    use crate::primitives::{PinShape, PinType};
    use pretty_assertions::assert_eq;

    fn shapes(graph: &Graph, id: Uuid) -> Vec<PinShape> {
        graph.node(id).unwrap().pins.iter().map(|p| p.shape()).collect()
    }

    fn host() -> HostState {
        let mut host = HostState::with_builtins();
        host.create_blueprint("BP_Test", None).unwrap();
        host
    }

    #[test]
    fn test_same_key_same_shapes() {
        let mut host = host();
        let key = format!("fn:{}:FClamp", paths::MATH_LIBRARY);
        let desc = resolve_key(&host.registry, &key).unwrap();
        let (registry, graph) = host.graph_mut("BP_Test", EVENT_GRAPH).unwrap();

        let a = materialize(registry, graph, &desc, [0.0, 0.0], &BTreeMap::new()).unwrap();
        let b = materialize(registry, graph, &desc, [300.0, 0.0], &BTreeMap::new()).unwrap();
        assert_ne!(a, b);
        assert_eq!(shapes(graph, a), shapes(graph, b));
        assert_eq!(graph.node(b).unwrap().position, [300.0, 0.0]);
    }

    #[test]
    fn test_declared_and_explicit_defaults() {
        let mut host = host();
        let desc = resolve_key(&host.registry, &format!("fn:{}:FClamp", paths::MATH_LIBRARY)).unwrap();
        let (registry, graph) = host.graph_mut("BP_Test", EVENT_GRAPH).unwrap();

        let defaults = BTreeMap::from([("Min".to_string(), "-5.0".to_string())]);
        let id = materialize(registry, graph, &desc, [0.0, 0.0], &defaults).unwrap();
        let node = graph.node(id).unwrap();
        assert_eq!(node.pin("Min").unwrap().default_value.as_deref(), Some("-5.0"));
        assert_eq!(node.pin("Max").unwrap().default_value.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_default_on_unknown_or_output_pin() {
        let mut host = host();
        let desc = resolve_key(&host.registry, &format!("fn:{}:FClamp", paths::MATH_LIBRARY)).unwrap();
        let (registry, graph) = host.graph_mut("BP_Test", EVENT_GRAPH).unwrap();

        let unknown = BTreeMap::from([("Nope".to_string(), "1".to_string())]);
        assert_eq!(
            materialize(registry, graph, &desc, [0.0, 0.0], &unknown),
            Err(MaterializeError::PinNotFound("Nope".into()))
        );
        let output = BTreeMap::from([("ReturnValue".to_string(), "1".to_string())]);
        assert!(matches!(
            materialize(registry, graph, &desc, [0.0, 0.0], &output),
            Err(MaterializeError::Rejected(_))
        ));
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_stale_descriptor_after_compile() {
        let mut host = host();
        let class = Blueprint::generated_class_path("BP_Test");
        host.add_variable("BP_Test", ReflectedVariable::new("Health", PinType::real()))
            .unwrap();
        let desc = resolve_key(&host.registry, &format!("var-get:{class}:Health")).unwrap();

        host.compile_blueprint("BP_Test").unwrap();
        let (registry, graph) = host.graph_mut("BP_Test", EVENT_GRAPH).unwrap();
        assert!(matches!(
            materialize(registry, graph, &desc, [0.0, 0.0], &BTreeMap::new()),
            Err(MaterializeError::StaleTemplate { .. })
        ));
    }

    #[test]
    fn test_descriptor_for_unloaded_type_is_stale() {
        let mut host = host();
        let desc = resolve_key(&host.registry, &format!("fn:{}:Jump", paths::CHARACTER)).unwrap();
        let mut handmade = desc.clone();
        handmade.template = None;

        host.registry.unload(paths::CHARACTER);
        let (registry, graph) = host.graph_mut("BP_Test", EVENT_GRAPH).unwrap();
        for d in [&desc, &handmade] {
            assert!(matches!(
                materialize(registry, graph, d, [0.0, 0.0], &BTreeMap::new()),
                Err(MaterializeError::StaleTemplate { .. })
            ));
        }
    }

    #[test]
    fn test_mismatched_key_rejected() {
        let mut host = host();
        let mut desc = resolve_key(&host.registry, &format!("fn:{}:Lerp", paths::MATH_LIBRARY)).unwrap();
        desc.key = format!("fn:{}:FClamp", paths::MATH_LIBRARY);
        let (registry, graph) = host.graph_mut("BP_Test", EVENT_GRAPH).unwrap();
        assert!(matches!(
            materialize(registry, graph, &desc, [0.0, 0.0], &BTreeMap::new()),
            Err(MaterializeError::Rejected(_))
        ));
    }

    #[test]
    fn test_duplicate_event_rejected() {
        let mut host = host();
        let desc = resolve_key(&host.registry, &format!("event:{}:ReceiveBeginPlay", paths::ACTOR)).unwrap();
        let (registry, graph) = host.graph_mut("BP_Test", EVENT_GRAPH).unwrap();
        materialize(registry, graph, &desc, [0.0, 0.0], &BTreeMap::new()).unwrap();
        assert!(matches!(
            materialize(registry, graph, &desc, [0.0, 200.0], &BTreeMap::new()),
            Err(MaterializeError::Rejected(_))
        ));
    }

    #[test]
    fn test_event_from_unrelated_class_rejected() {
        let mut host = host();
        let desc = resolve_key(&host.registry, &format!("event:{}:OnLanded", paths::CHARACTER)).unwrap();
        let (registry, graph) = host.graph_mut("BP_Test", EVENT_GRAPH).unwrap();
        assert!(matches!(
            materialize(registry, graph, &desc, [0.0, 0.0], &BTreeMap::new()),
            Err(MaterializeError::Rejected(_))
        ));
    }

    #[test]
    fn test_function_graph_rules() {
        let mut host = host();
        host.add_function_graph("BP_Test", "Helper", false).unwrap();
        let delay = resolve_key(&host.registry, &format!("fn:{}:Delay", paths::SYSTEM_LIBRARY)).unwrap();
        let begin = resolve_key(&host.registry, &format!("event:{}:ReceiveBeginPlay", paths::ACTOR)).unwrap();
        let (registry, graph) = host.graph_mut("BP_Test", "Helper").unwrap();

        for desc in [&delay, &begin] {
            assert!(matches!(
                materialize(registry, graph, desc, [0.0, 0.0], &BTreeMap::new()),
                Err(MaterializeError::Rejected(_))
            ));
        }
    }

    #[test]
    fn test_read_only_setter_rejected() {
        let mut host = host();
        let desc = crate::descriptor::describe_variable_set(
            host.registry.get(paths::ACTOR).unwrap(),
            host.registry.get(paths::ACTOR).unwrap().info.variable("bHidden").unwrap(),
        );
        let (registry, graph) = host.graph_mut("BP_Test", EVENT_GRAPH).unwrap();
        assert!(matches!(
            materialize(registry, graph, &desc, [0.0, 0.0], &BTreeMap::new()),
            Err(MaterializeError::Rejected(_))
        ));
    }

    #[test]
    fn test_reconstruct_picks_up_signature_change() {
        let mut host = host();
        let key = format!("fn:{}:FClamp", paths::MATH_LIBRARY);
        let mut desc = resolve_key(&host.registry, &key).unwrap();
        // a client holding an older signature with one extra pin
        desc.pins.push(PinDescriptor::input("Legacy", &PinType::bool()));
        desc.pins[1].default_value = Some("0.25".into());

        let (registry, graph) = host.graph_mut("BP_Test", EVENT_GRAPH).unwrap();
        let id = materialize(registry, graph, &desc, [0.0, 0.0], &BTreeMap::new()).unwrap();
        let node = graph.node(id).unwrap();
        assert!(node.pin("Legacy").is_none());
        assert_eq!(node.pin("Min").unwrap().default_value.as_deref(), Some("0.25"));
    }

    #[test]
    fn test_reroute_materializes_without_template() {
        let mut host = host();
        let (registry, graph) = host.graph_mut("BP_Test", EVENT_GRAPH).unwrap();
        let id = materialize(registry, graph, &describe_reroute(), [10.0, 10.0], &BTreeMap::new()).unwrap();
        assert_eq!(graph.node(id).unwrap().pins.len(), 2);
    }
}

//! Node graphs
//!
//! Live nodes and pin-to-pin links on petgraph's StableGraph. Edges always
//! run from an output pin to an input pin. Data inputs and exec outputs
//! accept a single link; connecting a new one replaces the old.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::descriptor::OperationKind;
use crate::primitives::{PinDescriptor, PinDirection, PinType, Position, TemplateRef};
use crate::reflection::TypeRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphKind {
    EventGraph,
    Function,
}

/// A link between two pins, stored on the output -> input edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub source_pin: String,
    pub target_pin: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(Uuid),

    #[error("pin not found: {node}.{pin}")]
    PinNotFound { node: Uuid, pin: String },

    #[error("cannot connect {source_pin} ({source_type}) to {target_pin} ({target_type})")]
    IncompatiblePins {
        source_pin: String,
        source_type: String,
        target_pin: String,
        target_type: String,
    },

    #[error("pins {0} and {1} have the same direction")]
    SameDirection(String, String),

    #[error("cannot link node {0} to itself")]
    SelfLink(Uuid),
}

/// A live node instance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GraphNode {
    pub id: Uuid,
    pub title: String,
    /// Key of the descriptor this node was materialized from
    pub key: String,
    #[serde(flatten)]
    pub kind: OperationKind,
    pub position: Position,
    pub pins: Vec<PinDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateRef>,
    pub created_at: DateTime<Utc>,
}

impl GraphNode {
    pub fn pin(&self, name: &str) -> Option<&PinDescriptor> {
        self.pins.iter().find(|p| p.name == name)
    }

    pub fn pin_mut(&mut self, name: &str) -> Option<&mut PinDescriptor> {
        self.pins.iter_mut().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LinkSnapshot {
    pub source_node: Uuid,
    pub source_pin: String,
    pub target_node: Uuid,
    pub target_pin: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GraphSnapshot {
    pub name: String,
    pub kind: GraphKind,
    pub owner_class: String,
    pub nodes: Vec<GraphNode>,
    pub links: Vec<LinkSnapshot>,
}

/// One editable graph inside a blueprint.
#[derive(Debug)]
pub struct Graph {
    name: String,
    kind: GraphKind,
    owner_class: String,
    inner: StableGraph<GraphNode, Link>,
    index_map: HashMap<Uuid, NodeIndex>,
}

impl Graph {
    pub fn new(name: impl Into<String>, kind: GraphKind, owner_class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            owner_class: owner_class.into(),
            inner: StableGraph::new(),
            index_map: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    /// Class that owns this graph (the blueprint's generated class)
    pub fn owner_class(&self) -> &str {
        &self.owner_class
    }

    pub fn set_owner_class(&mut self, owner_class: impl Into<String>) {
        self.owner_class = owner_class.into();
    }

    pub fn add_node(&mut self, node: GraphNode) -> Uuid {
        let id = node.id;
        let index = self.inner.add_node(node);
        self.index_map.insert(id, index);
        id
    }

    /// Remove a node and every link touching it
    pub fn remove_node(&mut self, id: Uuid) -> Option<GraphNode> {
        let index = self.index_map.remove(&id)?;
        self.inner.remove_node(index)
    }

    pub fn node(&self, id: Uuid) -> Option<&GraphNode> {
        let index = self.index_map.get(&id)?;
        self.inner.node_weight(*index)
    }

    pub fn node_mut(&mut self, id: Uuid) -> Option<&mut GraphNode> {
        let index = self.index_map.get(&id)?;
        self.inner.node_weight_mut(*index)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.index_map.contains_key(&id)
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> Vec<Uuid> {
        self.inner
            .node_indices()
            .filter_map(|idx| self.inner.node_weight(idx).map(|n| n.id))
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inner.node_weights()
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn pin(&self, node: Uuid, pin: &str) -> Result<&PinDescriptor, GraphError> {
        self.node(node)
            .ok_or(GraphError::NodeNotFound(node))?
            .pin(pin)
            .ok_or_else(|| GraphError::PinNotFound {
                node,
                pin: pin.to_string(),
            })
    }

    /// Order two pin endpoints as (output, input).
    fn orient<'a>(
        &self,
        a: (Uuid, &'a str),
        b: (Uuid, &'a str),
    ) -> Result<((Uuid, &'a str), (Uuid, &'a str)), GraphError> {
        let a_dir = self.pin(a.0, a.1)?.direction;
        let b_dir = self.pin(b.0, b.1)?.direction;
        match (a_dir, b_dir) {
            (PinDirection::Output, PinDirection::Input) => Ok((a, b)),
            (PinDirection::Input, PinDirection::Output) => Ok((b, a)),
            _ => Err(GraphError::SameDirection(
                format!("{}.{}", a.0, a.1),
                format!("{}.{}", b.0, b.1),
            )),
        }
    }

    /// Check that `a` and `b` could be linked, returning them as (output, input).
    pub fn validate_link<'a>(
        &self,
        a: (Uuid, &'a str),
        b: (Uuid, &'a str),
        registry: &TypeRegistry,
    ) -> Result<((Uuid, &'a str), (Uuid, &'a str)), GraphError> {
        if a.0 == b.0 {
            return Err(GraphError::SelfLink(a.0));
        }
        let (source, target) = self.orient(a, b)?;
        let source_type = self.pin(source.0, source.1)?.pin_type();
        let target_type = self.pin(target.0, target.1)?.pin_type();
        if !registry.pins_compatible(&source_type, &target_type) {
            return Err(GraphError::IncompatiblePins {
                source_pin: source.1.to_string(),
                source_type: source_type.to_string(),
                target_pin: target.1.to_string(),
                target_type: target_type.to_string(),
            });
        }
        Ok((source, target))
    }

    /// Link two pins, in either argument order.
    pub fn connect(
        &mut self,
        a: (Uuid, &str),
        b: (Uuid, &str),
        registry: &TypeRegistry,
    ) -> Result<(), GraphError> {
        let (source, target) = self.validate_link(a, b, registry)?;
        if self.find_link(source, target).is_some() {
            return Ok(());
        }

        // single-link pins: data inputs and exec outputs
        if !self.pin(target.0, target.1)?.is_exec() {
            self.unlink_pin(target.0, target.1);
        }
        if self.pin(source.0, source.1)?.is_exec() {
            self.unlink_pin(source.0, source.1);
        }

        let source_idx = self.index_of(source.0)?;
        let target_idx = self.index_of(target.0)?;
        self.inner.add_edge(
            source_idx,
            target_idx,
            Link {
                source_pin: source.1.to_string(),
                target_pin: target.1.to_string(),
            },
        );
        Ok(())
    }

    fn index_of(&self, id: Uuid) -> Result<NodeIndex, GraphError> {
        self.index_map
            .get(&id)
            .copied()
            .ok_or(GraphError::NodeNotFound(id))
    }

    fn find_link(&self, source: (Uuid, &str), target: (Uuid, &str)) -> Option<EdgeIndex> {
        let source_idx = self.index_map.get(&source.0)?;
        let target_idx = self.index_map.get(&target.0)?;
        self.inner
            .edges_directed(*source_idx, Direction::Outgoing)
            .find(|e| {
                e.target() == *target_idx
                    && e.weight().source_pin == source.1
                    && e.weight().target_pin == target.1
            })
            .map(|e| e.id())
    }

    pub fn is_linked(&self, a: (Uuid, &str), b: (Uuid, &str)) -> bool {
        self.find_link(a, b).is_some() || self.find_link(b, a).is_some()
    }

    /// Remove the link between two pins, in either argument order.
    pub fn disconnect(&mut self, a: (Uuid, &str), b: (Uuid, &str)) -> bool {
        let edge = self.find_link(a, b).or_else(|| self.find_link(b, a));
        match edge {
            Some(edge) => self.inner.remove_edge(edge).is_some(),
            None => false,
        }
    }

    /// Remove every link on one pin. Returns how many were removed.
    pub fn unlink_pin(&mut self, node: Uuid, pin: &str) -> usize {
        let Some(&index) = self.index_map.get(&node) else {
            return 0;
        };
        let edges: Vec<EdgeIndex> = self
            .inner
            .edges_directed(index, Direction::Outgoing)
            .filter(|e| e.weight().source_pin == pin)
            .chain(
                self.inner
                    .edges_directed(index, Direction::Incoming)
                    .filter(|e| e.weight().target_pin == pin),
            )
            .map(|e| e.id())
            .collect();
        for edge in &edges {
            self.inner.remove_edge(*edge);
        }
        edges.len()
    }

    /// Pins linked to `node.pin`, as (node, pin) pairs.
    pub fn linked_pins(&self, node: Uuid, pin: &str) -> Vec<(Uuid, String)> {
        let Some(&index) = self.index_map.get(&node) else {
            return vec![];
        };
        let outgoing = self
            .inner
            .edges_directed(index, Direction::Outgoing)
            .filter(|e| e.weight().source_pin == pin)
            .filter_map(|e| {
                let other = self.inner.node_weight(e.target())?;
                Some((other.id, e.weight().target_pin.clone()))
            });
        let incoming = self
            .inner
            .edges_directed(index, Direction::Incoming)
            .filter(|e| e.weight().target_pin == pin)
            .filter_map(|e| {
                let other = self.inner.node_weight(e.source())?;
                Some((other.id, e.weight().source_pin.clone()))
            });
        outgoing.chain(incoming).collect()
    }

    /// Type of a pin, or `None` if the node or pin is missing.
    pub fn pin_type(&self, node: Uuid, pin: &str) -> Option<PinType> {
        self.pin(node, pin).ok().map(|p| p.pin_type())
    }

    pub fn links(&self) -> Vec<LinkSnapshot> {
        self.inner
            .edge_references()
            .filter_map(|e| {
                let source = self.inner.node_weight(e.source())?;
                let target = self.inner.node_weight(e.target())?;
                Some(LinkSnapshot {
                    source_node: source.id,
                    source_pin: e.weight().source_pin.clone(),
                    target_node: target.id,
                    target_pin: e.weight().target_pin.clone(),
                })
            })
            .collect()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            name: self.name.clone(),
            kind: self.kind,
            owner_class: self.owner_class.clone(),
            nodes: self.nodes().cloned().collect(),
            links: self.links(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::describe_reroute;
    use crate::primitives::PinType;
    use crate::reflection::paths;

    fn node(pins: Vec<PinDescriptor>) -> GraphNode {
        let template = describe_reroute();
        GraphNode {
            id: Uuid::new_v4(),
            title: "test".into(),
            key: template.key,
            kind: template.kind,
            position: [0.0, 0.0],
            pins,
            template: None,
            created_at: Utc::now(),
        }
    }

    fn real_source() -> GraphNode {
        node(vec![PinDescriptor::output("Out", &PinType::real())])
    }

    fn real_sink() -> GraphNode {
        node(vec![
            PinDescriptor::input("In", &PinType::real()),
            PinDescriptor::input("Exec", &PinType::exec()),
        ])
    }

    fn graph() -> Graph {
        Graph::new("EventGraph", GraphKind::EventGraph, paths::ACTOR)
    }

    #[test]
    fn test_add_and_connect() {
        let registry = TypeRegistry::with_builtins();
        let mut g = graph();
        let a = g.add_node(real_source());
        let b = g.add_node(real_sink());

        g.connect((a, "Out"), (b, "In"), &registry).unwrap();
        assert_eq!(g.link_count(), 1);
        assert!(g.is_linked((a, "Out"), (b, "In")));
        assert!(g.is_linked((b, "In"), (a, "Out")));
    }

    #[test]
    fn test_connect_orients_input_first_arguments() {
        let registry = TypeRegistry::with_builtins();
        let mut g = graph();
        let a = g.add_node(real_source());
        let b = g.add_node(real_sink());

        g.connect((b, "In"), (a, "Out"), &registry).unwrap();
        let links = g.links();
        assert_eq!(links[0].source_node, a);
        assert_eq!(links[0].target_node, b);
    }

    #[test]
    fn test_type_mismatch() {
        let registry = TypeRegistry::with_builtins();
        let mut g = graph();
        let a = g.add_node(real_source());
        let b = g.add_node(real_sink());

        let err = g.connect((a, "Out"), (b, "Exec"), &registry).unwrap_err();
        assert!(matches!(err, GraphError::IncompatiblePins { .. }));
        assert_eq!(g.link_count(), 0);
    }

    #[test]
    fn test_same_direction_and_self_link() {
        let registry = TypeRegistry::with_builtins();
        let mut g = graph();
        let a = g.add_node(real_source());
        let b = g.add_node(real_source());
        assert!(matches!(
            g.connect((a, "Out"), (b, "Out"), &registry),
            Err(GraphError::SameDirection(..))
        ));

        let c = g.add_node(node(vec![
            PinDescriptor::output("Out", &PinType::real()),
            PinDescriptor::input("In", &PinType::real()),
        ]));
        assert!(matches!(
            g.connect((c, "Out"), (c, "In"), &registry),
            Err(GraphError::SelfLink(_))
        ));
    }

    #[test]
    fn test_missing_pin() {
        let registry = TypeRegistry::with_builtins();
        let mut g = graph();
        let a = g.add_node(real_source());
        let b = g.add_node(real_sink());
        assert!(matches!(
            g.connect((a, "Nope"), (b, "In"), &registry),
            Err(GraphError::PinNotFound { .. })
        ));
        assert!(matches!(
            g.connect((a, "Out"), (Uuid::new_v4(), "In"), &registry),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_data_input_takes_single_link() {
        let registry = TypeRegistry::with_builtins();
        let mut g = graph();
        let a = g.add_node(real_source());
        let b = g.add_node(real_source());
        let sink = g.add_node(real_sink());

        g.connect((a, "Out"), (sink, "In"), &registry).unwrap();
        g.connect((b, "Out"), (sink, "In"), &registry).unwrap();

        assert_eq!(g.link_count(), 1);
        assert!(g.is_linked((b, "Out"), (sink, "In")));
        assert!(!g.is_linked((a, "Out"), (sink, "In")));
    }

    #[test]
    fn test_data_output_fans_out() {
        let registry = TypeRegistry::with_builtins();
        let mut g = graph();
        let a = g.add_node(real_source());
        let s1 = g.add_node(real_sink());
        let s2 = g.add_node(real_sink());

        g.connect((a, "Out"), (s1, "In"), &registry).unwrap();
        g.connect((a, "Out"), (s2, "In"), &registry).unwrap();
        assert_eq!(g.linked_pins(a, "Out").len(), 2);
    }

    #[test]
    fn test_duplicate_connect_is_noop() {
        let registry = TypeRegistry::with_builtins();
        let mut g = graph();
        let a = g.add_node(real_source());
        let b = g.add_node(real_sink());
        g.connect((a, "Out"), (b, "In"), &registry).unwrap();
        g.connect((a, "Out"), (b, "In"), &registry).unwrap();
        assert_eq!(g.link_count(), 1);
    }

    #[test]
    fn test_disconnect_and_remove() {
        let registry = TypeRegistry::with_builtins();
        let mut g = graph();
        let a = g.add_node(real_source());
        let b = g.add_node(real_sink());
        g.connect((a, "Out"), (b, "In"), &registry).unwrap();

        assert!(g.disconnect((b, "In"), (a, "Out")));
        assert!(!g.disconnect((a, "Out"), (b, "In")));

        g.connect((a, "Out"), (b, "In"), &registry).unwrap();
        assert!(g.remove_node(a).is_some());
        assert_eq!(g.link_count(), 0);
        assert!(g.node(a).is_none());
    }

    #[test]
    fn test_snapshot() {
        let registry = TypeRegistry::with_builtins();
        let mut g = graph();
        let a = g.add_node(real_source());
        let b = g.add_node(real_sink());
        g.connect((a, "Out"), (b, "In"), &registry).unwrap();

        let snapshot = g.snapshot();
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.nodes[0].id, a);
        assert_eq!(snapshot.links.len(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["links"][0]["source-pin"], "Out");
        assert_eq!(json["nodes"][0]["node-kind"], "synthetic-passthrough");
    }
}

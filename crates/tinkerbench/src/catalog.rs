//! Reflection catalog walker
//!
//! Enumerates the live type registry into operation descriptors, either
//! restricted to what is valid at a graph location (the default) or
//! unfiltered. A context with no graph location falls back to the
//! unfiltered walk. For the same registry state and context the output is
//! the same sequence in the same order.

use std::collections::HashSet;

use benchproto::params::DiscoveryMode;
use thiserror::Error;
use tracing::debug;

use crate::descriptor::{
    describe, describe_cast, describe_event, describe_function, describe_reroute,
    describe_variable_get, describe_variable_set, KeyError, OperationDescriptor, OperationKind,
};
use crate::graph::GraphKind;
use crate::primitives::{PinCategory, PinDirection, PinType};
use crate::reflection::{RegisteredType, TypeRegistry};

/// Where in a graph the new node would go.
#[derive(Debug, Clone, Default)]
pub struct CatalogContext {
    /// Class whose members are reachable without a target (the blueprint's class)
    pub owner_class: Option<String>,
    pub graph_kind: Option<GraphKind>,
    /// Existing pin the new node should connect to
    pub pin: Option<PinContext>,
}

impl CatalogContext {
    /// No owner class and no pin: nothing to restrict the walk with.
    pub fn is_empty(&self) -> bool {
        self.owner_class.is_none() && self.pin.is_none()
    }

    /// The walk actually performed for the requested mode.
    pub fn effective_mode(&self, requested: DiscoveryMode) -> DiscoveryMode {
        if self.is_empty() {
            DiscoveryMode::Unfiltered
        } else {
            requested
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PinContext {
    pub ty: PinType,
    pub direction: PinDirection,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogFilters {
    pub mode: DiscoveryMode,
    pub include_deprecated: bool,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("template for '{key}' is not loaded: {reason}")]
    Stale { key: String, reason: String },
}

/// Collects descriptors in walk order, dropping duplicates and anything the
/// filters exclude.
struct Collector {
    seen: HashSet<String>,
    out: Vec<OperationDescriptor>,
    include_deprecated: bool,
    function_graph: bool,
}

impl Collector {
    fn new(filters: &CatalogFilters, graph_kind: Option<GraphKind>) -> Self {
        Self {
            seen: HashSet::new(),
            out: Vec::new(),
            include_deprecated: filters.include_deprecated,
            function_graph: graph_kind == Some(GraphKind::Function),
        }
    }

    fn push(&mut self, desc: OperationDescriptor) {
        if desc.deprecated && !self.include_deprecated {
            return;
        }
        if self.function_graph
            && (desc.latent || matches!(desc.kind, OperationKind::Event { .. }))
        {
            return;
        }
        if self.seen.insert(desc.key.clone()) {
            self.out.push(desc);
        }
    }

    fn push_members(&mut self, ty: &RegisteredType, with_events: bool) {
        for function in &ty.info.functions {
            self.push(describe_function(ty, function));
        }
        for variable in &ty.info.variables {
            self.push(describe_variable_get(ty, variable));
            if !variable.read_only {
                self.push(describe_variable_set(ty, variable));
            }
        }
        if with_events {
            for event in &ty.info.events {
                self.push(describe_event(ty, event));
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct CatalogWalker {
    walks: u64,
}

impl CatalogWalker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of enumerations performed so far.
    pub fn walks(&self) -> u64 {
        self.walks
    }

    pub fn enumerate(
        &mut self,
        registry: &TypeRegistry,
        context: &CatalogContext,
        filters: &CatalogFilters,
    ) -> Vec<OperationDescriptor> {
        self.walks += 1;
        let mode = context.effective_mode(filters.mode);
        let descriptors = match mode {
            DiscoveryMode::Context => walk_context(registry, context, filters),
            DiscoveryMode::Unfiltered => walk_all(registry, filters),
        };
        debug!(
            ?mode,
            count = descriptors.len(),
            walk = self.walks,
            "catalog walk complete"
        );
        descriptors
    }
}

fn walk_context(
    registry: &TypeRegistry,
    context: &CatalogContext,
    filters: &CatalogFilters,
) -> Vec<OperationDescriptor> {
    let mut collector = Collector::new(filters, context.graph_kind);

    for lib in registry.libraries() {
        collector.push_members(lib, false);
    }

    if let Some(owner) = &context.owner_class {
        for ty in registry.ancestors(owner) {
            collector.push_members(ty, true);
        }
    }

    let object_pin = context.pin.as_ref().and_then(|pin| match pin.ty.category {
        PinCategory::Object | PinCategory::Class => pin.ty.sub_type.clone(),
        _ => None,
    });

    match (&context.pin, &object_pin) {
        (_, Some(class)) => {
            // members reachable through the pin's object
            for ty in registry.ancestors(class) {
                collector.push_members(ty, false);
            }
            for sub in registry.subclasses_of(class) {
                collector.push(describe_cast(sub));
            }
        }
        (None, None) => {
            for class in registry.classes() {
                collector.push(describe_cast(class));
            }
        }
        (Some(_), None) => {}
    }

    collector.push(describe_reroute());

    let mut descriptors = collector.out;
    if let Some(pin) = &context.pin {
        descriptors.retain(|desc| connects_to(registry, desc, pin));
    }
    descriptors
}

fn walk_all(registry: &TypeRegistry, filters: &CatalogFilters) -> Vec<OperationDescriptor> {
    let mut collector = Collector::new(filters, None);
    for ty in registry.iter() {
        collector.push_members(ty, true);
    }
    for class in registry.classes() {
        collector.push(describe_cast(class));
    }
    collector.push(describe_reroute());
    collector.out
}

/// True if some visible pin on `desc` can be linked to the context pin.
pub fn connects_to(registry: &TypeRegistry, desc: &OperationDescriptor, pin: &PinContext) -> bool {
    desc.visible_pins()
        .filter(|p| p.direction == pin.direction.opposite())
        .any(|p| match pin.direction {
            PinDirection::Output => registry.pins_compatible(&pin.ty, &p.pin_type()),
            PinDirection::Input => registry.pins_compatible(&p.pin_type(), &pin.ty),
        })
}

/// Build the descriptor for `key` straight from the registry, without a walk.
pub fn resolve_key(registry: &TypeRegistry, key: &str) -> Result<OperationDescriptor, CatalogError> {
    let kind = OperationKind::parse_key(key)?;
    describe(registry, &kind).map_err(|e| CatalogError::Stale {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

//! Host editor state
//!
//! Everything that lives on the main thread: the type registry, the
//! descriptor cache, the catalog walker, and the blueprints with their
//! graphs. Only the main loop ever holds a `&mut HostState`.

use std::collections::BTreeMap;

use benchconf::DiscoveryConfig;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::DescriptorCache;
use crate::catalog::CatalogWalker;
use crate::graph::{Graph, GraphKind};
use crate::materializer::reconstruct;
use crate::primitives::Generation;
use crate::reflection::{paths, ReflectedFunction, ReflectedType, ReflectedVariable, TypeKind, TypeRegistry};

pub const BLUEPRINT_ROOT: &str = "/Game/Blueprints";
pub const EVENT_GRAPH: &str = "EventGraph";
/// Blueprint used by node commands that do not name one.
pub const SCRATCH_BLUEPRINT: &str = "BP_Scratch";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error("blueprint not found: {0}")]
    BlueprintNotFound(String),

    #[error("graph '{graph}' not found in blueprint '{blueprint}'")]
    GraphNotFound { blueprint: String, graph: String },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("parent class not found or not a class: {0}")]
    ParentNotFound(String),

    #[error("invalid name '{0}': use letters, digits, and underscores")]
    InvalidName(String),
}

fn validate_name(name: &str) -> Result<(), EditorError> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(EditorError::InvalidName(name.to_string()))
    }
}

/// A blueprint asset: a generated class plus the graphs that define it.
#[derive(Debug)]
pub struct Blueprint {
    name: String,
    parent_class: String,
    variables: Vec<ReflectedVariable>,
    functions: Vec<ReflectedFunction>,
    graphs: BTreeMap<String, Graph>,
    generation: Generation,
    compile_count: u32,
}

impl Blueprint {
    pub fn generated_class_path(name: &str) -> String {
        format!("{BLUEPRINT_ROOT}/{name}.{name}_C")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_class(&self) -> &str {
        &self.parent_class
    }

    pub fn generated_class(&self) -> String {
        Self::generated_class_path(&self.name)
    }

    pub fn variables(&self) -> &[ReflectedVariable] {
        &self.variables
    }

    /// Generation of the generated class as last registered.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn compile_count(&self) -> u32 {
        self.compile_count
    }

    pub fn graph(&self, name: &str) -> Option<&Graph> {
        self.graphs.get(name)
    }

    pub fn graph_names(&self) -> Vec<String> {
        self.graphs.keys().cloned().collect()
    }

    fn generated_type(&self) -> ReflectedType {
        let mut ty = ReflectedType::class(self.generated_class(), &self.name);
        ty.parent = Some(self.parent_class.clone());
        ty.variables = self.variables.clone();
        ty.functions = self.functions.clone();
        ty
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RefreshReport {
    pub refreshed: usize,
    pub orphaned: Vec<Uuid>,
}

pub struct HostState {
    pub registry: TypeRegistry,
    pub cache: DescriptorCache,
    pub walker: CatalogWalker,
    pub discovery: DiscoveryConfig,
    blueprints: BTreeMap<String, Blueprint>,
}

impl HostState {
    pub fn new(registry: TypeRegistry, discovery: DiscoveryConfig) -> Self {
        Self {
            registry,
            cache: DescriptorCache::new(),
            walker: CatalogWalker::new(),
            discovery,
            blueprints: BTreeMap::new(),
        }
    }

    /// Host with the builtin library and default discovery settings.
    pub fn with_builtins() -> Self {
        Self::new(TypeRegistry::with_builtins(), DiscoveryConfig::default())
    }

    pub fn blueprint(&self, name: &str) -> Result<&Blueprint, EditorError> {
        self.blueprints
            .get(name)
            .ok_or_else(|| EditorError::BlueprintNotFound(name.to_string()))
    }

    fn blueprint_mut(&mut self, name: &str) -> Result<&mut Blueprint, EditorError> {
        self.blueprints
            .get_mut(name)
            .ok_or_else(|| EditorError::BlueprintNotFound(name.to_string()))
    }

    pub fn blueprints(&self) -> impl Iterator<Item = &Blueprint> {
        self.blueprints.values()
    }

    pub fn create_blueprint(&mut self, name: &str, parent: Option<&str>) -> Result<&Blueprint, EditorError> {
        validate_name(name)?;
        if self.blueprints.contains_key(name) {
            return Err(EditorError::AlreadyExists(name.to_string()));
        }

        let parent = parent.unwrap_or(paths::ACTOR);
        match self.registry.get(parent) {
            Some(ty) if ty.info.kind == TypeKind::Class => {}
            _ => return Err(EditorError::ParentNotFound(parent.to_string())),
        }

        let class_path = Blueprint::generated_class_path(name);
        let mut graphs = BTreeMap::new();
        graphs.insert(
            EVENT_GRAPH.to_string(),
            Graph::new(EVENT_GRAPH, GraphKind::EventGraph, &class_path),
        );

        let mut blueprint = Blueprint {
            name: name.to_string(),
            parent_class: parent.to_string(),
            variables: Vec::new(),
            functions: Vec::new(),
            graphs,
            generation: 0,
            compile_count: 0,
        };
        blueprint.generation = self.registry.register(blueprint.generated_type());
        info!(blueprint = name, parent, "created blueprint");

        Ok(self.blueprints.entry(name.to_string()).or_insert(blueprint))
    }

    /// Name of the blueprint a node command targets. `None` selects the
    /// scratch blueprint, created on first use.
    pub fn target_blueprint(&mut self, name: Option<&str>) -> Result<String, EditorError> {
        match name {
            Some(name) => self.blueprint(name).map(|bp| bp.name().to_string()),
            None => {
                if !self.blueprints.contains_key(SCRATCH_BLUEPRINT) {
                    self.create_blueprint(SCRATCH_BLUEPRINT, None)?;
                }
                Ok(SCRATCH_BLUEPRINT.to_string())
            }
        }
    }

    /// Add a member variable. The generated class is re-registered.
    pub fn add_variable(&mut self, blueprint: &str, variable: ReflectedVariable) -> Result<Generation, EditorError> {
        validate_name(&variable.name)?;
        let bp = self.blueprint_mut(blueprint)?;
        if bp.variables.iter().any(|v| v.name == variable.name) {
            return Err(EditorError::AlreadyExists(format!("{blueprint}.{}", variable.name)));
        }
        bp.variables.push(variable);
        self.regenerate(blueprint)
    }

    /// Add a function graph and its callable function. The generated class is re-registered.
    pub fn add_function_graph(&mut self, blueprint: &str, name: &str, pure: bool) -> Result<Generation, EditorError> {
        validate_name(name)?;
        let bp = self.blueprint_mut(blueprint)?;
        if bp.graphs.contains_key(name) || bp.functions.iter().any(|f| f.name == name) {
            return Err(EditorError::AlreadyExists(format!("{blueprint}.{name}")));
        }

        let class_path = bp.generated_class();
        bp.graphs.insert(
            name.to_string(),
            Graph::new(name, GraphKind::Function, class_path),
        );
        let mut function = ReflectedFunction::new(name);
        function.category = "Blueprint Functions".to_string();
        function.pure = pure;
        bp.functions.push(function);
        self.regenerate(blueprint)
    }

    /// Compile: re-register the generated class under a new generation.
    /// Descriptors cached against the old generation become stale.
    pub fn compile_blueprint(&mut self, blueprint: &str) -> Result<Generation, EditorError> {
        self.blueprint_mut(blueprint)?.compile_count += 1;
        let generation = self.regenerate(blueprint)?;
        info!(blueprint, generation, "compiled blueprint");
        Ok(generation)
    }

    fn regenerate(&mut self, blueprint: &str) -> Result<Generation, EditorError> {
        let ty = self.blueprint(blueprint)?.generated_type();
        let generation = self.registry.register(ty);
        self.blueprint_mut(blueprint)?.generation = generation;
        Ok(generation)
    }

    /// Reconstruct every node in the blueprint's graphs against the live
    /// registry. Returns the ids of nodes whose template is gone.
    pub fn refresh_nodes(&mut self, blueprint: &str) -> Result<RefreshReport, EditorError> {
        let bp = self
            .blueprints
            .get_mut(blueprint)
            .ok_or_else(|| EditorError::BlueprintNotFound(blueprint.to_string()))?;

        let mut report = RefreshReport::default();
        for graph in bp.graphs.values_mut() {
            for id in graph.node_ids() {
                let Some(node) = graph.node_mut(id) else {
                    continue;
                };
                if reconstruct(&self.registry, node) {
                    report.refreshed += 1;
                } else {
                    report.orphaned.push(id);
                }
            }
        }
        if !report.orphaned.is_empty() {
            warn!(blueprint, orphaned = report.orphaned.len(), "nodes lost their template");
        }
        Ok(report)
    }

    pub fn graph(&self, blueprint: &str, graph: &str) -> Result<&Graph, EditorError> {
        self.blueprint(blueprint)?
            .graphs
            .get(graph)
            .ok_or_else(|| EditorError::GraphNotFound {
                blueprint: blueprint.to_string(),
                graph: graph.to_string(),
            })
    }

    /// A graph for editing, alongside the registry it is checked against.
    pub fn graph_mut(&mut self, blueprint: &str, graph: &str) -> Result<(&TypeRegistry, &mut Graph), EditorError> {
        let graphs = &mut self
            .blueprints
            .get_mut(blueprint)
            .ok_or_else(|| EditorError::BlueprintNotFound(blueprint.to_string()))?
            .graphs;
        let graph = graphs
            .get_mut(graph)
            .ok_or_else(|| EditorError::GraphNotFound {
                blueprint: blueprint.to_string(),
                graph: graph.to_string(),
            })?;
        Ok((&self.registry, graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{PinType, TemplateRef};

    #[test]
    fn test_create_blueprint_registers_class() {
        let mut host = HostState::with_builtins();
        let bp = host.create_blueprint("BP_Door", None).unwrap();
        assert_eq!(bp.generated_class(), "/Game/Blueprints/BP_Door.BP_Door_C");
        assert_eq!(bp.parent_class(), paths::ACTOR);
        assert_eq!(bp.graph_names(), vec![EVENT_GRAPH.to_string()]);

        let class = "/Game/Blueprints/BP_Door.BP_Door_C";
        assert!(host.registry.is_subclass_of(class, paths::ACTOR));
    }

    #[test]
    fn test_create_blueprint_errors() {
        let mut host = HostState::with_builtins();
        host.create_blueprint("BP_Door", None).unwrap();
        assert_eq!(
            host.create_blueprint("BP_Door", None).unwrap_err(),
            EditorError::AlreadyExists("BP_Door".into())
        );
        assert!(matches!(
            host.create_blueprint("BP_X", Some(paths::MATH_LIBRARY)),
            Err(EditorError::ParentNotFound(_))
        ));
        assert!(matches!(
            host.create_blueprint("bad name", None),
            Err(EditorError::InvalidName(_))
        ));
    }

    #[test]
    fn test_compile_bumps_generation() {
        let mut host = HostState::with_builtins();
        let first = host.create_blueprint("BP_Door", None).unwrap().generation();
        let class = Blueprint::generated_class_path("BP_Door");
        let old = TemplateRef::new(&class, first);

        let second = host.compile_blueprint("BP_Door").unwrap();
        assert!(second > first);
        assert!(!host.registry.is_live(&old));
        assert_eq!(host.blueprint("BP_Door").unwrap().compile_count(), 1);
    }

    #[test]
    fn test_add_variable_visible_on_generated_class() {
        let mut host = HostState::with_builtins();
        host.create_blueprint("BP_Door", None).unwrap();
        host.add_variable("BP_Door", ReflectedVariable::new("bIsOpen", PinType::bool()))
            .unwrap();

        let class = host.registry.get(&Blueprint::generated_class_path("BP_Door")).unwrap();
        assert!(class.info.variable("bIsOpen").is_some());

        let dup = host.add_variable("BP_Door", ReflectedVariable::new("bIsOpen", PinType::bool()));
        assert!(matches!(dup, Err(EditorError::AlreadyExists(_))));
    }

    #[test]
    fn test_add_function_graph() {
        let mut host = HostState::with_builtins();
        host.create_blueprint("BP_Door", None).unwrap();
        host.add_function_graph("BP_Door", "OpenDoor", false).unwrap();

        let graph = host.graph("BP_Door", "OpenDoor").unwrap();
        assert_eq!(graph.kind(), GraphKind::Function);
        let class = host.registry.get(&Blueprint::generated_class_path("BP_Door")).unwrap();
        assert!(class.info.function("OpenDoor").is_some());

        assert!(matches!(
            host.add_function_graph("BP_Door", EVENT_GRAPH, false),
            Err(EditorError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_graph_lookup_errors() {
        let mut host = HostState::with_builtins();
        assert!(matches!(
            host.graph("Nope", EVENT_GRAPH),
            Err(EditorError::BlueprintNotFound(_))
        ));
        host.create_blueprint("BP_Door", None).unwrap();
        assert!(matches!(
            host.graph_mut("BP_Door", "Nope"),
            Err(EditorError::GraphNotFound { .. })
        ));
    }

    #[test]
    fn test_target_blueprint_creates_scratch_once() {
        let mut host = HostState::with_builtins();
        assert_eq!(host.target_blueprint(None).unwrap(), SCRATCH_BLUEPRINT);
        let generation = host.blueprint(SCRATCH_BLUEPRINT).unwrap().generation();
        assert_eq!(host.target_blueprint(None).unwrap(), SCRATCH_BLUEPRINT);
        assert_eq!(host.blueprint(SCRATCH_BLUEPRINT).unwrap().generation(), generation);

        assert!(matches!(
            host.target_blueprint(Some("BP_Missing")),
            Err(EditorError::BlueprintNotFound(_))
        ));
    }
}

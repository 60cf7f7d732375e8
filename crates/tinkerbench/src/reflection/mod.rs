//! Reflected type registry
//!
//! The host's live type system: classes and function libraries with their
//! exposed functions, variables, and events. Every registration stamps the
//! type with a fresh generation; handles taken earlier (`TemplateRef`) stop
//! resolving once the type is unloaded or registered again.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::primitives::{Generation, PinCategory, PinType, TemplateRef};

mod builtin;
mod catalog_file;

pub use builtin::{builtin_types, paths};
pub use catalog_file::{load_catalog_file, parse_catalog, CatalogFileError};

/// Longest parent chain followed before assuming a cycle.
const MAX_HIERARCHY_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Instantiable class; members need a target object
    Class,
    /// Static function library; no instances
    Library,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectedParam {
    pub name: String,
    pub ty: PinType,
    pub default_value: Option<String>,
    /// Out-parameters become output pins
    pub is_output: bool,
    pub advanced: bool,
    pub tooltip: String,
}

impl ReflectedParam {
    pub fn new(name: impl Into<String>, ty: PinType) -> Self {
        Self {
            name: name.into(),
            ty,
            default_value: None,
            is_output: false,
            advanced: false,
            tooltip: String::new(),
        }
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn advanced(mut self) -> Self {
        self.advanced = true;
        self
    }

    pub fn output(mut self) -> Self {
        self.is_output = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReflectedFunction {
    pub name: String,
    pub display_name: Option<String>,
    pub category: String,
    pub keywords: Vec<String>,
    pub tooltip: String,
    pub params: Vec<ReflectedParam>,
    pub return_type: Option<PinType>,
    /// No exec pins
    pub pure: bool,
    /// No target pin
    pub is_static: bool,
    /// Completes asynchronously; only valid in event graphs
    pub latent: bool,
    pub deprecated: bool,
}

impl ReflectedFunction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectedVariable {
    pub name: String,
    pub ty: PinType,
    pub category: String,
    pub tooltip: String,
    pub read_only: bool,
    pub default_value: Option<String>,
}

impl ReflectedVariable {
    pub fn new(name: impl Into<String>, ty: PinType) -> Self {
        Self {
            name: name.into(),
            ty,
            category: String::new(),
            tooltip: String::new(),
            read_only: false,
            default_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectedEvent {
    pub name: String,
    pub display_name: Option<String>,
    pub tooltip: String,
    pub params: Vec<ReflectedParam>,
}

impl ReflectedEvent {
    pub fn display_name(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => format!("Event {}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectedType {
    pub path: String,
    pub display_name: String,
    pub kind: TypeKind,
    pub parent: Option<String>,
    pub functions: Vec<ReflectedFunction>,
    pub variables: Vec<ReflectedVariable>,
    pub events: Vec<ReflectedEvent>,
}

impl ReflectedType {
    pub fn class(path: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(path, display_name, TypeKind::Class)
    }

    pub fn library(path: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(path, display_name, TypeKind::Library)
    }

    fn new(path: impl Into<String>, display_name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            path: path.into(),
            display_name: display_name.into(),
            kind,
            parent: None,
            functions: Vec::new(),
            variables: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&ReflectedFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&ReflectedVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn event(&self, name: &str) -> Option<&ReflectedEvent> {
        self.events.iter().find(|e| e.name == name)
    }
}

/// A type as the registry holds it.
#[derive(Debug, Clone)]
pub struct RegisteredType {
    pub info: Arc<ReflectedType>,
    pub generation: Generation,
}

impl RegisteredType {
    pub fn template(&self) -> TemplateRef {
        TemplateRef::new(&self.info.path, self.generation)
    }

    pub fn path(&self) -> &str {
        &self.info.path
    }
}

/// Registry of all reflected types, keyed by path.
///
/// Iteration is in path order, which keeps catalog walks deterministic.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, RegisteredType>,
    last_generation: Generation,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the builtin engine library.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for ty in builtin_types() {
            registry.register(ty);
        }
        registry
    }

    /// Register or replace a type. Returns its new generation.
    pub fn register(&mut self, ty: ReflectedType) -> Generation {
        self.last_generation += 1;
        let generation = self.last_generation;
        debug!(path = %ty.path, generation, "registering type");
        self.types.insert(
            ty.path.clone(),
            RegisteredType {
                info: Arc::new(ty),
                generation,
            },
        );
        generation
    }

    /// Unload a type. Outstanding handles to it go stale.
    pub fn unload(&mut self, path: &str) -> bool {
        let removed = self.types.remove(path).is_some();
        if removed {
            debug!(path, "unloaded type");
        }
        removed
    }

    pub fn get(&self, path: &str) -> Option<&RegisteredType> {
        self.types.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.types.contains_key(path)
    }

    /// Resolve a handle, only if the type is still registered at that generation.
    pub fn resolve(&self, template: &TemplateRef) -> Option<&RegisteredType> {
        self.types
            .get(&template.type_path)
            .filter(|t| t.generation == template.generation)
    }

    pub fn is_live(&self, template: &TemplateRef) -> bool {
        self.resolve(template).is_some()
    }

    pub fn generation(&self) -> Generation {
        self.last_generation
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredType> {
        self.types.values()
    }

    pub fn libraries(&self) -> impl Iterator<Item = &RegisteredType> {
        self.iter().filter(|t| t.info.kind == TypeKind::Library)
    }

    pub fn classes(&self) -> impl Iterator<Item = &RegisteredType> {
        self.iter().filter(|t| t.info.kind == TypeKind::Class)
    }

    /// The type itself followed by each registered parent, nearest first.
    pub fn ancestors(&self, path: &str) -> Vec<&RegisteredType> {
        let mut chain = Vec::new();
        let mut current = self.types.get(path);
        while let Some(ty) = current {
            if chain.len() >= MAX_HIERARCHY_DEPTH {
                break;
            }
            chain.push(ty);
            current = ty.info.parent.as_deref().and_then(|p| self.types.get(p));
        }
        chain
    }

    /// True when `path` is `ancestor` or derives from it.
    pub fn is_subclass_of(&self, path: &str, ancestor: &str) -> bool {
        path == ancestor || self.ancestors(path).iter().any(|t| t.path() == ancestor)
    }

    /// Classes strictly derived from `path`, in path order.
    pub fn subclasses_of(&self, path: &str) -> Vec<&RegisteredType> {
        self.classes()
            .filter(|t| t.path() != path && self.is_subclass_of(t.path(), path))
            .collect()
    }

    /// Whether a value of type `from` may flow into a pin of type `to`.
    ///
    /// Wildcards accept anything. Object and class references may be
    /// upcast along the class hierarchy; other sub-typed categories must
    /// match exactly.
    pub fn pins_compatible(&self, from: &PinType, to: &PinType) -> bool {
        if from.is_wildcard() || to.is_wildcard() {
            return true;
        }
        if from.category != to.category || from.is_array != to.is_array {
            return false;
        }
        match (from.category, &from.sub_type, &to.sub_type) {
            (_, _, None) => true,
            (_, None, Some(_)) => !from.category.has_sub_type(),
            (PinCategory::Object | PinCategory::Class, Some(a), Some(b)) => {
                self.is_subclass_of(a, b)
            }
            (_, Some(a), Some(b)) => a == b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::with_builtins()
    }

    #[test]
    fn test_register_bumps_generation() {
        let mut reg = TypeRegistry::new();
        let g1 = reg.register(ReflectedType::library("/Test.Lib", "Lib"));
        let g2 = reg.register(ReflectedType::library("/Test.Lib", "Lib"));
        assert!(g2 > g1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_reregister_invalidates_old_handles() {
        let mut reg = TypeRegistry::new();
        let g1 = reg.register(ReflectedType::class("/Test.A", "A"));
        let old = TemplateRef::new("/Test.A", g1);
        assert!(reg.is_live(&old));

        reg.register(ReflectedType::class("/Test.A", "A"));
        assert!(!reg.is_live(&old));
    }

    #[test]
    fn test_unload_invalidates_handles() {
        let mut reg = TypeRegistry::new();
        let g = reg.register(ReflectedType::class("/Test.A", "A"));
        assert!(reg.unload("/Test.A"));
        assert!(!reg.is_live(&TemplateRef::new("/Test.A", g)));
        assert!(!reg.unload("/Test.A"));
    }

    #[test]
    fn test_builtin_hierarchy() {
        let reg = registry();
        assert!(reg.is_subclass_of(paths::CHARACTER, paths::ACTOR));
        assert!(reg.is_subclass_of(paths::CHARACTER, paths::OBJECT));
        assert!(!reg.is_subclass_of(paths::ACTOR, paths::PAWN));

        let chain: Vec<_> = reg
            .ancestors(paths::CHARACTER)
            .iter()
            .map(|t| t.path().to_string())
            .collect();
        assert_eq!(
            chain,
            vec![paths::CHARACTER, paths::PAWN, paths::ACTOR, paths::OBJECT]
        );
    }

    #[test]
    fn test_subclasses_of_actor() {
        let reg = registry();
        let subs: Vec<_> = reg
            .subclasses_of(paths::ACTOR)
            .iter()
            .map(|t| t.path().to_string())
            .collect();
        assert!(subs.contains(&paths::PAWN.to_string()));
        assert!(subs.contains(&paths::CHARACTER.to_string()));
        assert!(!subs.contains(&paths::ACTOR.to_string()));
    }

    #[test]
    fn test_ancestors_survive_cycles() {
        let mut reg = TypeRegistry::new();
        let mut a = ReflectedType::class("/Test.A", "A");
        a.parent = Some("/Test.B".into());
        let mut b = ReflectedType::class("/Test.B", "B");
        b.parent = Some("/Test.A".into());
        reg.register(a);
        reg.register(b);
        assert!(reg.ancestors("/Test.A").len() <= MAX_HIERARCHY_DEPTH);
        assert!(!reg.is_subclass_of("/Test.A", "/Test.C"));
    }

    #[test]
    fn test_pin_compatibility() {
        let reg = registry();
        assert!(reg.pins_compatible(&PinType::real(), &PinType::real()));
        assert!(!reg.pins_compatible(&PinType::real(), &PinType::int()));
        assert!(!reg.pins_compatible(&PinType::exec(), &PinType::bool()));
        assert!(reg.pins_compatible(&PinType::wildcard(), &PinType::exec()));
        assert!(!reg.pins_compatible(&PinType::real().array(), &PinType::real()));

        // upcast ok, downcast needs a cast node
        let character = PinType::object(paths::CHARACTER);
        let actor = PinType::object(paths::ACTOR);
        assert!(reg.pins_compatible(&character, &actor));
        assert!(!reg.pins_compatible(&actor, &character));

        let vector = PinType::structure(paths::VECTOR);
        let rotator = PinType::structure(paths::ROTATOR);
        assert!(reg.pins_compatible(&vector, &vector));
        assert!(!reg.pins_compatible(&vector, &rotator));
    }
}

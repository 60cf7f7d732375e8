//! Operation descriptors
//!
//! A descriptor is one instantiable node template: what kind of node it is,
//! the metadata needed to build it, and its pins in signature order. The
//! `key` is derived purely from the kind metadata, so it is stable across
//! runs for the same type/member identity.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::primitives::{PinDescriptor, PinType, TemplateRef};
use crate::reflection::{
    ReflectedEvent, ReflectedFunction, ReflectedType, ReflectedVariable, RegisteredType,
    TypeKind, TypeRegistry,
};

pub const REROUTE_KEY: &str = "reroute";

/// Pin names shared by several node kinds.
pub mod pin_names {
    pub const EXECUTE: &str = "execute";
    pub const THEN: &str = "then";
    pub const SELF: &str = "self";
    pub const RETURN_VALUE: &str = "ReturnValue";
    pub const CAST_FAILED: &str = "CastFailed";
    pub const CAST_OBJECT: &str = "Object";
    pub const REROUTE_IN: &str = "InputPin";
    pub const REROUTE_OUT: &str = "OutputPin";
    pub const SETTER_OUTPUT: &str = "Output_Get";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    tag = "node-kind",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case"
)]
pub enum OperationKind {
    FunctionCall { owner_type: String, function: String },
    VariableGet { owner_type: String, variable: String },
    VariableSet { owner_type: String, variable: String },
    Cast { target_type: String },
    Event { owner_type: String, event: String },
    #[serde(rename = "synthetic-passthrough")]
    Reroute,
}

/// Tags accepted in the `node-kind` field.
pub const NODE_KINDS: [&str; 6] = [
    "function-call",
    "variable-get",
    "variable-set",
    "cast",
    "event",
    "synthetic-passthrough",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("unknown node kind in key '{0}'")]
    UnknownKind(String),

    #[error("malformed key '{0}'")]
    Malformed(String),
}

impl OperationKind {
    pub fn tag(&self) -> &'static str {
        match self {
            OperationKind::FunctionCall { .. } => "function-call",
            OperationKind::VariableGet { .. } => "variable-get",
            OperationKind::VariableSet { .. } => "variable-set",
            OperationKind::Cast { .. } => "cast",
            OperationKind::Event { .. } => "event",
            OperationKind::Reroute => "synthetic-passthrough",
        }
    }

    /// Stable identity of the template this kind describes.
    pub fn key(&self) -> String {
        match self {
            OperationKind::FunctionCall {
                owner_type,
                function,
            } => format!("fn:{owner_type}:{function}"),
            OperationKind::VariableGet {
                owner_type,
                variable,
            } => format!("var-get:{owner_type}:{variable}"),
            OperationKind::VariableSet {
                owner_type,
                variable,
            } => format!("var-set:{owner_type}:{variable}"),
            OperationKind::Cast { target_type } => format!("cast:{target_type}"),
            OperationKind::Event { owner_type, event } => format!("event:{owner_type}:{event}"),
            OperationKind::Reroute => REROUTE_KEY.to_string(),
        }
    }

    pub fn parse_key(key: &str) -> Result<Self, KeyError> {
        if key == REROUTE_KEY {
            return Ok(OperationKind::Reroute);
        }

        let (prefix, rest) = key
            .split_once(':')
            .ok_or_else(|| KeyError::UnknownKind(key.to_string()))?;

        let owner_member = || -> Result<(String, String), KeyError> {
            match rest.rsplit_once(':') {
                Some((owner, member)) if !owner.is_empty() && !member.is_empty() => {
                    Ok((owner.to_string(), member.to_string()))
                }
                _ => Err(KeyError::Malformed(key.to_string())),
            }
        };

        match prefix {
            "fn" => {
                let (owner_type, function) = owner_member()?;
                Ok(OperationKind::FunctionCall {
                    owner_type,
                    function,
                })
            }
            "var-get" => {
                let (owner_type, variable) = owner_member()?;
                Ok(OperationKind::VariableGet {
                    owner_type,
                    variable,
                })
            }
            "var-set" => {
                let (owner_type, variable) = owner_member()?;
                Ok(OperationKind::VariableSet {
                    owner_type,
                    variable,
                })
            }
            "event" => {
                let (owner_type, event) = owner_member()?;
                Ok(OperationKind::Event { owner_type, event })
            }
            "cast" if !rest.is_empty() => Ok(OperationKind::Cast {
                target_type: rest.to_string(),
            }),
            "cast" => Err(KeyError::Malformed(key.to_string())),
            _ => Err(KeyError::UnknownKind(key.to_string())),
        }
    }

    /// Registry path whose liveness backs this kind. `None` for reroutes.
    pub fn template_path(&self) -> Option<&str> {
        match self {
            OperationKind::FunctionCall { owner_type, .. }
            | OperationKind::VariableGet { owner_type, .. }
            | OperationKind::VariableSet { owner_type, .. }
            | OperationKind::Event { owner_type, .. } => Some(owner_type),
            OperationKind::Cast { target_type } => Some(target_type),
            OperationKind::Reroute => None,
        }
    }

    /// Function, variable, or event name, if the kind has one.
    pub fn member_name(&self) -> Option<&str> {
        match self {
            OperationKind::FunctionCall { function, .. } => Some(function),
            OperationKind::VariableGet { variable, .. }
            | OperationKind::VariableSet { variable, .. } => Some(variable),
            OperationKind::Event { event, .. } => Some(event),
            OperationKind::Cast { .. } | OperationKind::Reroute => None,
        }
    }
}

/// One instantiable node template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OperationDescriptor {
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tooltip: String,
    #[serde(flatten)]
    pub kind: OperationKind,
    #[serde(default)]
    pub pins: Vec<PinDescriptor>,
    /// Only meaningful as the output of one ranking pass
    #[serde(default)]
    pub relevance_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateRef>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub latent: bool,
}

impl OperationDescriptor {
    fn new(kind: OperationKind, display_name: impl Into<String>) -> Self {
        Self {
            key: kind.key(),
            display_name: display_name.into(),
            category: String::new(),
            keywords: Vec::new(),
            tooltip: String::new(),
            kind,
            pins: Vec::new(),
            relevance_score: 0,
            template: None,
            deprecated: false,
            latent: false,
        }
    }

    pub fn pin(&self, name: &str) -> Option<&PinDescriptor> {
        self.pins.iter().find(|p| p.name == name)
    }

    pub fn visible_pins(&self) -> impl Iterator<Item = &PinDescriptor> {
        self.pins.iter().filter(|p| !p.is_hidden)
    }
}

// =============================================================================
// PIN LAYOUTS
// =============================================================================

fn exec_pins() -> [PinDescriptor; 2] {
    [
        PinDescriptor::input(pin_names::EXECUTE, &PinType::exec()),
        PinDescriptor::output(pin_names::THEN, &PinType::exec()),
    ]
}

fn self_pin(owner: &ReflectedType) -> PinDescriptor {
    PinDescriptor::input(pin_names::SELF, &PinType::object(&owner.path)).with_tooltip("Target")
}

pub fn function_pins(owner: &ReflectedType, function: &ReflectedFunction) -> Vec<PinDescriptor> {
    let mut pins = Vec::new();
    if !function.pure {
        pins.extend(exec_pins());
    }
    if !function.is_static && owner.kind == TypeKind::Class {
        pins.push(self_pin(owner));
    }
    for param in &function.params {
        let pin = if param.is_output {
            PinDescriptor::output(&param.name, &param.ty)
        } else {
            PinDescriptor::input(&param.name, &param.ty)
                .with_default(param.default_value.clone())
        };
        pins.push(
            pin.advanced(param.advanced)
                .with_tooltip(param.tooltip.clone()),
        );
    }
    if let Some(ret) = &function.return_type {
        pins.push(PinDescriptor::output(pin_names::RETURN_VALUE, ret));
    }
    pins
}

pub fn variable_get_pins(owner: &ReflectedType, variable: &ReflectedVariable) -> Vec<PinDescriptor> {
    vec![
        self_pin(owner).hidden(),
        PinDescriptor::output(&variable.name, &variable.ty).with_tooltip(variable.tooltip.clone()),
    ]
}

pub fn variable_set_pins(owner: &ReflectedType, variable: &ReflectedVariable) -> Vec<PinDescriptor> {
    let mut pins = exec_pins().to_vec();
    pins.push(self_pin(owner).hidden());
    pins.push(
        PinDescriptor::input(&variable.name, &variable.ty)
            .with_default(variable.default_value.clone())
            .with_tooltip(variable.tooltip.clone()),
    );
    pins.push(PinDescriptor::output(pin_names::SETTER_OUTPUT, &variable.ty));
    pins
}

pub fn cast_pins(target: &ReflectedType) -> Vec<PinDescriptor> {
    let mut pins = exec_pins().to_vec();
    pins.push(PinDescriptor::output(pin_names::CAST_FAILED, &PinType::exec()));
    pins.push(PinDescriptor::input(
        pin_names::CAST_OBJECT,
        &PinType::object(crate::reflection::paths::OBJECT),
    ));
    pins.push(PinDescriptor::output(
        cast_output_pin(target),
        &PinType::object(&target.path),
    ));
    pins
}

/// `As<DisplayName>` with spaces removed.
pub fn cast_output_pin(target: &ReflectedType) -> String {
    let name: String = target
        .display_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    format!("As{name}")
}

pub fn event_pins(event: &ReflectedEvent) -> Vec<PinDescriptor> {
    let mut pins = vec![PinDescriptor::output(pin_names::THEN, &PinType::exec())];
    pins.extend(
        event
            .params
            .iter()
            .map(|p| PinDescriptor::output(&p.name, &p.ty).with_tooltip(p.tooltip.clone())),
    );
    pins
}

pub fn reroute_pins(ty: &PinType) -> Vec<PinDescriptor> {
    vec![
        PinDescriptor::input(pin_names::REROUTE_IN, ty),
        PinDescriptor::output(pin_names::REROUTE_OUT, ty),
    ]
}

// =============================================================================
// DESCRIPTOR CONSTRUCTION
// =============================================================================

pub fn describe_function(owner: &RegisteredType, function: &ReflectedFunction) -> OperationDescriptor {
    let kind = OperationKind::FunctionCall {
        owner_type: owner.info.path.clone(),
        function: function.name.clone(),
    };
    let mut desc = OperationDescriptor::new(kind, function.display_name());
    desc.category = if function.category.is_empty() {
        owner.info.display_name.clone()
    } else {
        function.category.clone()
    };
    desc.keywords = function.keywords.clone();
    desc.tooltip = function.tooltip.clone();
    desc.pins = function_pins(&owner.info, function);
    desc.template = Some(owner.template());
    desc.deprecated = function.deprecated;
    desc.latent = function.latent;
    desc
}

pub fn describe_variable_get(owner: &RegisteredType, variable: &ReflectedVariable) -> OperationDescriptor {
    let kind = OperationKind::VariableGet {
        owner_type: owner.info.path.clone(),
        variable: variable.name.clone(),
    };
    let mut desc = OperationDescriptor::new(kind, format!("Get {}", variable.name));
    desc.category = variable_category(owner, variable);
    desc.keywords = vec!["get".to_string(), variable.name.to_lowercase()];
    desc.tooltip = variable.tooltip.clone();
    desc.pins = variable_get_pins(&owner.info, variable);
    desc.template = Some(owner.template());
    desc
}

pub fn describe_variable_set(owner: &RegisteredType, variable: &ReflectedVariable) -> OperationDescriptor {
    let kind = OperationKind::VariableSet {
        owner_type: owner.info.path.clone(),
        variable: variable.name.clone(),
    };
    let mut desc = OperationDescriptor::new(kind, format!("Set {}", variable.name));
    desc.category = variable_category(owner, variable);
    desc.keywords = vec!["set".to_string(), variable.name.to_lowercase()];
    desc.tooltip = variable.tooltip.clone();
    desc.pins = variable_set_pins(&owner.info, variable);
    desc.template = Some(owner.template());
    desc
}

fn variable_category(owner: &RegisteredType, variable: &ReflectedVariable) -> String {
    if variable.category.is_empty() {
        format!("Variables|{}", owner.info.display_name)
    } else {
        format!("Variables|{}", variable.category)
    }
}

pub fn describe_cast(target: &RegisteredType) -> OperationDescriptor {
    let kind = OperationKind::Cast {
        target_type: target.info.path.clone(),
    };
    let mut desc = OperationDescriptor::new(kind, format!("Cast To {}", target.info.display_name));
    desc.category = "Utilities|Casting".to_string();
    desc.keywords = vec!["cast".to_string(), "convert".to_string()];
    desc.tooltip = format!(
        "Tries to access object as {}; execution follows CastFailed if it is not one",
        target.info.display_name
    );
    desc.pins = cast_pins(&target.info);
    desc.template = Some(target.template());
    desc
}

pub fn describe_event(owner: &RegisteredType, event: &ReflectedEvent) -> OperationDescriptor {
    let kind = OperationKind::Event {
        owner_type: owner.info.path.clone(),
        event: event.name.clone(),
    };
    let mut desc = OperationDescriptor::new(kind, event.display_name());
    desc.category = "Add Event".to_string();
    desc.keywords = vec!["event".to_string()];
    desc.tooltip = event.tooltip.clone();
    desc.pins = event_pins(event);
    desc.template = Some(owner.template());
    desc
}

pub fn describe_reroute() -> OperationDescriptor {
    let mut desc = OperationDescriptor::new(OperationKind::Reroute, "Add Reroute Node");
    desc.category = "Utilities".to_string();
    desc.keywords = vec!["reroute".into(), "knot".into(), "passthrough".into()];
    desc.tooltip = "Reroute node (a passthrough used to tidy up wires)".to_string();
    desc.pins = reroute_pins(&PinType::wildcard());
    desc
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescribeError {
    #[error("type '{0}' is not loaded")]
    TypeNotLoaded(String),

    #[error("'{owner}' has no member '{member}'")]
    MemberNotFound { owner: String, member: String },
}

/// Build the descriptor for `kind` from the live registry. No searching:
/// the owner is looked up by path and the member by exact name.
pub fn describe(registry: &TypeRegistry, kind: &OperationKind) -> Result<OperationDescriptor, DescribeError> {
    let owner = match kind.template_path() {
        Some(path) => Some(
            registry
                .get(path)
                .ok_or_else(|| DescribeError::TypeNotLoaded(path.to_string()))?,
        ),
        None => None,
    };

    let missing = |owner: &RegisteredType, member: &str| DescribeError::MemberNotFound {
        owner: owner.path().to_string(),
        member: member.to_string(),
    };

    match (kind, owner) {
        (OperationKind::Reroute, _) => Ok(describe_reroute()),
        (OperationKind::FunctionCall { function, .. }, Some(owner)) => owner
            .info
            .function(function)
            .map(|f| describe_function(owner, f))
            .ok_or_else(|| missing(owner, function)),
        (OperationKind::VariableGet { variable, .. }, Some(owner)) => owner
            .info
            .variable(variable)
            .map(|v| describe_variable_get(owner, v))
            .ok_or_else(|| missing(owner, variable)),
        (OperationKind::VariableSet { variable, .. }, Some(owner)) => owner
            .info
            .variable(variable)
            .map(|v| describe_variable_set(owner, v))
            .ok_or_else(|| missing(owner, variable)),
        (OperationKind::Event { event, .. }, Some(owner)) => owner
            .info
            .event(event)
            .map(|e| describe_event(owner, e))
            .ok_or_else(|| missing(owner, event)),
        (OperationKind::Cast { .. }, Some(target)) => Ok(describe_cast(target)),
        // template_path() is Some for every non-reroute kind
        (_, None) => Err(DescribeError::TypeNotLoaded(kind.key())),
    }
}

//! Core primitives for tinkerbench
//!
//! Pin types, pin descriptors, and the non-owning template handle that
//! everything above the type registry is built from.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use benchproto::Position;

/// Monotonic registration counter. A template handle is live only while the
/// registry still holds its type at the same generation.
pub type Generation = u64;

// =============================================================================
// PIN TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinCategory {
    Exec,
    Bool,
    Byte,
    Int,
    Int64,
    Real,
    Name,
    String,
    Text,
    Struct,
    Object,
    Class,
    Enum,
    Wildcard,
}

impl PinCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinCategory::Exec => "exec",
            PinCategory::Bool => "bool",
            PinCategory::Byte => "byte",
            PinCategory::Int => "int",
            PinCategory::Int64 => "int64",
            PinCategory::Real => "real",
            PinCategory::Name => "name",
            PinCategory::String => "string",
            PinCategory::Text => "text",
            PinCategory::Struct => "struct",
            PinCategory::Object => "object",
            PinCategory::Class => "class",
            PinCategory::Enum => "enum",
            PinCategory::Wildcard => "wildcard",
        }
    }

    /// Categories whose values name a type path (`sub_type` is meaningful).
    pub fn has_sub_type(&self) -> bool {
        matches!(
            self,
            PinCategory::Struct | PinCategory::Object | PinCategory::Class | PinCategory::Enum
        )
    }
}

impl fmt::Display for PinCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full pin type: category plus the concrete type path for object-like pins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PinType {
    pub category: PinCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_reference: bool,
}

impl PinType {
    pub fn new(category: PinCategory) -> Self {
        Self {
            category,
            sub_type: None,
            is_array: false,
            is_reference: false,
        }
    }

    pub fn exec() -> Self {
        Self::new(PinCategory::Exec)
    }

    pub fn bool() -> Self {
        Self::new(PinCategory::Bool)
    }

    pub fn int() -> Self {
        Self::new(PinCategory::Int)
    }

    pub fn real() -> Self {
        Self::new(PinCategory::Real)
    }

    pub fn string() -> Self {
        Self::new(PinCategory::String)
    }

    pub fn name() -> Self {
        Self::new(PinCategory::Name)
    }

    pub fn wildcard() -> Self {
        Self::new(PinCategory::Wildcard)
    }

    pub fn object(path: impl Into<String>) -> Self {
        Self::with_sub_type(PinCategory::Object, path)
    }

    pub fn class(path: impl Into<String>) -> Self {
        Self::with_sub_type(PinCategory::Class, path)
    }

    pub fn structure(path: impl Into<String>) -> Self {
        Self::with_sub_type(PinCategory::Struct, path)
    }

    fn with_sub_type(category: PinCategory, path: impl Into<String>) -> Self {
        Self {
            sub_type: Some(path.into()),
            ..Self::new(category)
        }
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn by_ref(mut self) -> Self {
        self.is_reference = true;
        self
    }

    pub fn is_exec(&self) -> bool {
        self.category == PinCategory::Exec
    }

    pub fn is_wildcard(&self) -> bool {
        self.category == PinCategory::Wildcard
    }

    /// Parse a compact type spec as used in catalog files and commands.
    ///
    /// `bool`, `int`, `int64`, `byte`, `real` (or `float`/`double`), `string`,
    /// `name`, `text`, `exec`, `wildcard`, `object:<path>`, `class:<path>`,
    /// `struct:<path>`, `enum:<path>`. A trailing `[]` makes it an array.
    pub fn parse_spec(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let (spec, is_array) = match spec.strip_suffix("[]") {
            Some(inner) => (inner.trim(), true),
            None => (spec, false),
        };

        let ty = match spec.split_once(':') {
            Some((kind, path)) if !path.is_empty() => {
                let category = match kind {
                    "object" => PinCategory::Object,
                    "class" => PinCategory::Class,
                    "struct" => PinCategory::Struct,
                    "enum" => PinCategory::Enum,
                    _ => return None,
                };
                Self::with_sub_type(category, path)
            }
            Some(_) => return None,
            None => Self::new(match spec {
                "exec" => PinCategory::Exec,
                "bool" => PinCategory::Bool,
                "byte" => PinCategory::Byte,
                "int" => PinCategory::Int,
                "int64" => PinCategory::Int64,
                "real" | "float" | "double" => PinCategory::Real,
                "name" => PinCategory::Name,
                "string" => PinCategory::String,
                "text" => PinCategory::Text,
                "wildcard" => PinCategory::Wildcard,
                _ => return None,
            }),
        };

        Some(Self { is_array, ..ty })
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_type {
            Some(path) => write!(f, "{}:{}", self.category, path)?,
            None => write!(f, "{}", self.category)?,
        }
        if self.is_array {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

// =============================================================================
// PIN DESCRIPTORS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinDirection {
    Input,
    Output,
}

impl PinDirection {
    pub fn opposite(&self) -> Self {
        match self {
            PinDirection::Input => PinDirection::Output,
            PinDirection::Output => PinDirection::Input,
        }
    }
}

/// One pin, in signature order. Live nodes carry the same record so that a
/// node's pins can be compared directly against the descriptor it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PinDescriptor {
    pub name: String,
    pub type_category: PinCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concrete_type_path: Option<String>,
    pub direction: PinDirection,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub is_reference: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_advanced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub tooltip: String,
}

impl PinDescriptor {
    pub fn new(name: impl Into<String>, ty: &PinType, direction: PinDirection) -> Self {
        Self {
            name: name.into(),
            type_category: ty.category,
            concrete_type_path: ty.sub_type.clone(),
            direction,
            is_array: ty.is_array,
            is_reference: ty.is_reference,
            is_hidden: false,
            is_advanced: false,
            default_value: None,
            tooltip: String::new(),
        }
    }

    pub fn input(name: impl Into<String>, ty: &PinType) -> Self {
        Self::new(name, ty, PinDirection::Input)
    }

    pub fn output(name: impl Into<String>, ty: &PinType) -> Self {
        Self::new(name, ty, PinDirection::Output)
    }

    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }

    pub fn advanced(mut self, advanced: bool) -> Self {
        self.is_advanced = advanced;
        self
    }

    pub fn with_default(mut self, value: Option<String>) -> Self {
        self.default_value = value;
        self
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = tooltip.into();
        self
    }

    pub fn pin_type(&self) -> PinType {
        PinType {
            category: self.type_category,
            sub_type: self.concrete_type_path.clone(),
            is_array: self.is_array,
            is_reference: self.is_reference,
        }
    }

    /// Overwrite the type fields, keeping name, direction, and flags.
    pub fn retype(&mut self, ty: &PinType) {
        self.type_category = ty.category;
        self.concrete_type_path = ty.sub_type.clone();
        self.is_array = ty.is_array;
        self.is_reference = ty.is_reference;
    }

    pub fn is_exec(&self) -> bool {
        self.type_category == PinCategory::Exec
    }

    /// Name, category, and direction: what must match for two nodes created
    /// from the same key.
    pub fn shape(&self) -> PinShape {
        PinShape {
            name: self.name.clone(),
            category: self.type_category,
            concrete_type_path: self.concrete_type_path.clone(),
            direction: self.direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PinShape {
    pub name: String,
    pub category: PinCategory,
    pub concrete_type_path: Option<String>,
    pub direction: PinDirection,
}

// =============================================================================
// TEMPLATE HANDLES
// =============================================================================

/// Non-owning reference to a registered type at a specific generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TemplateRef {
    pub type_path: String,
    pub generation: Generation,
}

impl TemplateRef {
    pub fn new(type_path: impl Into<String>, generation: Generation) -> Self {
        Self {
            type_path: type_path.into(),
            generation,
        }
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.type_path, self.generation)
    }
}

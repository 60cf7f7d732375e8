//! TOML catalog files that add or replace reflected types at startup.
//!
//! ```toml
//! [[types]]
//! path = "/Game/Inventory.InventoryLibrary"
//! display-name = "Inventory Library"
//! kind = "library"
//!
//! [[types.functions]]
//! name = "AddItem"
//! display-name = "Add Item"
//! category = "Inventory"
//! keywords = ["add", "item"]
//! static = true
//! returns = "bool"
//!
//! [[types.functions.params]]
//! name = "Item"
//! type = "name"
//! default = "None"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::{
    ReflectedEvent, ReflectedFunction, ReflectedParam, ReflectedType, ReflectedVariable, TypeKind,
};
use crate::primitives::PinType;

#[derive(Debug, Error)]
pub enum CatalogFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{owner}: invalid type spec '{spec}' for '{member}'")]
    InvalidType {
        owner: String,
        member: String,
        spec: String,
    },
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    types: Vec<TypeDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TypeDef {
    path: String,
    #[serde(default)]
    display_name: Option<String>,
    kind: TypeKind,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    functions: Vec<FunctionDef>,
    #[serde(default)]
    variables: Vec<VariableDef>,
    #[serde(default)]
    events: Vec<EventDef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FunctionDef {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    tooltip: String,
    #[serde(default)]
    params: Vec<ParamDef>,
    #[serde(default)]
    returns: Option<String>,
    #[serde(default)]
    pure: bool,
    #[serde(default, rename = "static")]
    is_static: bool,
    #[serde(default)]
    latent: bool,
    #[serde(default)]
    deprecated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ParamDef {
    name: String,
    #[serde(rename = "type")]
    type_spec: String,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    output: bool,
    #[serde(default)]
    advanced: bool,
    #[serde(default)]
    tooltip: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct VariableDef {
    name: String,
    #[serde(rename = "type")]
    type_spec: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    tooltip: String,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct EventDef {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    tooltip: String,
    #[serde(default)]
    params: Vec<ParamDef>,
}

fn pin_type(owner: &str, member: &str, spec: &str) -> Result<PinType, CatalogFileError> {
    PinType::parse_spec(spec).ok_or_else(|| CatalogFileError::InvalidType {
        owner: owner.to_string(),
        member: member.to_string(),
        spec: spec.to_string(),
    })
}

fn convert_params(owner: &str, defs: Vec<ParamDef>) -> Result<Vec<ReflectedParam>, CatalogFileError> {
    defs.into_iter()
        .map(|d| {
            Ok(ReflectedParam {
                ty: pin_type(owner, &d.name, &d.type_spec)?,
                name: d.name,
                default_value: d.default,
                is_output: d.output,
                advanced: d.advanced,
                tooltip: d.tooltip,
            })
        })
        .collect()
}

impl TypeDef {
    fn into_reflected(self) -> Result<ReflectedType, CatalogFileError> {
        let owner = self.path.clone();
        let kind = self.kind;

        let functions = self
            .functions
            .into_iter()
            .map(|f| {
                let return_type = match &f.returns {
                    Some(spec) => Some(pin_type(&owner, &f.name, spec)?),
                    None => None,
                };
                Ok(ReflectedFunction {
                    params: convert_params(&owner, f.params)?,
                    name: f.name,
                    display_name: f.display_name,
                    category: f.category,
                    keywords: f.keywords,
                    tooltip: f.tooltip,
                    return_type,
                    pure: f.pure,
                    // library functions never take a target
                    is_static: f.is_static || kind == TypeKind::Library,
                    latent: f.latent,
                    deprecated: f.deprecated,
                })
            })
            .collect::<Result<Vec<_>, CatalogFileError>>()?;

        let variables = self
            .variables
            .into_iter()
            .map(|v| {
                Ok(ReflectedVariable {
                    ty: pin_type(&owner, &v.name, &v.type_spec)?,
                    name: v.name,
                    category: v.category,
                    tooltip: v.tooltip,
                    read_only: v.read_only,
                    default_value: v.default,
                })
            })
            .collect::<Result<Vec<_>, CatalogFileError>>()?;

        let events = self
            .events
            .into_iter()
            .map(|e| {
                Ok(ReflectedEvent {
                    params: convert_params(&owner, e.params)?,
                    name: e.name,
                    display_name: e.display_name,
                    tooltip: e.tooltip,
                })
            })
            .collect::<Result<Vec<_>, CatalogFileError>>()?;

        let display_name = self.display_name.unwrap_or_else(|| short_name(&self.path));

        Ok(ReflectedType {
            path: self.path,
            display_name,
            kind: self.kind,
            parent: self.parent,
            functions,
            variables,
            events,
        })
    }
}

/// `/Game/Foo.Bar` -> `Bar`
fn short_name(path: &str) -> String {
    path.rsplit(|c| c == '.' || c == '/').next().unwrap_or(path).to_string()
}

/// Parse catalog TOML. `origin` is only used in error messages.
pub fn parse_catalog(contents: &str, origin: &Path) -> Result<Vec<ReflectedType>, CatalogFileError> {
    let file: CatalogFile = toml::from_str(contents).map_err(|source| CatalogFileError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    file.types.into_iter().map(TypeDef::into_reflected).collect()
}

pub fn load_catalog_file(path: &Path) -> Result<Vec<ReflectedType>, CatalogFileError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CatalogFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&contents, path)
}

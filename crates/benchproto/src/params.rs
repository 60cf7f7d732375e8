//! Typed parameters for each command.
//!
//! Handlers deserialize `Request::parameters` into one of these; any failure
//! becomes `INVALID_PARAMS`. The schemas are served by `list_commands`.

use crate::envelope::CommandError;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Canvas position `[x, y]`.
pub type Position = [f64; 2];

/// Graph name used when a command omits `graph`.
pub const DEFAULT_GRAPH: &str = "EventGraph";

fn default_graph() -> String {
    DEFAULT_GRAPH.to_string()
}

/// Parse a parameter map into a typed record.
pub fn parse<T: DeserializeOwned>(params: Map<String, Value>) -> Result<T, CommandError> {
    serde_json::from_value(Value::Object(params))
        .map_err(|e| CommandError::invalid_params(e.to_string()))
}

/// JSON schema for a parameter record, as a plain JSON value.
///
/// Subschemas are inlined so clients never have to chase `$ref`s.
pub fn schema_of<T: JsonSchema>() -> Value {
    let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let gen = settings.into_generator();
    let schema = gen.into_root_schema_for::<T>();
    serde_json::to_value(&schema).unwrap_or_default()
}

/// Addresses one pin on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct PinAddress {
    pub node_id: String,
    pub pin: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Only operations reachable from the given context
    #[default]
    Context,
    /// Every operation the host knows about
    Unfiltered,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoverOperationsParams {
    /// Free text; empty matches everything
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Blueprint whose class provides member context
    #[serde(default)]
    pub blueprint: Option<String>,
    #[serde(default)]
    pub graph: Option<String>,
    /// Pin the new node must be connectable to
    #[serde(default)]
    pub context_pin: Option<PinAddress>,
    #[serde(default)]
    pub mode: DiscoveryMode,
    #[serde(default)]
    pub include_deprecated: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct CreateNodeByKeyParams {
    pub key: String,
    /// Defaults to the scratch blueprint
    #[serde(default)]
    pub blueprint: Option<String>,
    #[serde(default = "default_graph")]
    pub graph: String,
    #[serde(default)]
    pub position: Option<Position>,
    /// Pin name to literal default
    #[serde(default)]
    pub pin_defaults: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct CreateNodeFromDescriptorParams {
    /// A descriptor exactly as returned by `discover_operations`
    pub descriptor: Value,
    /// Defaults to the scratch blueprint
    #[serde(default)]
    pub blueprint: Option<String>,
    #[serde(default = "default_graph")]
    pub graph: String,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub pin_defaults: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct InsertRerouteNodesParams {
    /// Defaults to the scratch blueprint
    #[serde(default)]
    pub blueprint: Option<String>,
    #[serde(default = "default_graph")]
    pub graph: String,
    pub source: PinAddress,
    pub target: PinAddress,
    pub waypoints: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct CreateBlueprintParams {
    pub name: String,
    /// Type path of the parent class
    #[serde(default)]
    pub parent_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct AddBlueprintVariableParams {
    pub blueprint: String,
    pub name: String,
    /// `bool`, `int`, `real`, `string`, `name`, `text`, or `object:<type-path>`
    pub variable_type: String,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct AddFunctionGraphParams {
    pub blueprint: String,
    pub name: String,
    #[serde(default)]
    pub pure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct BlueprintParams {
    pub blueprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct GraphParams {
    pub blueprint: String,
    #[serde(default = "default_graph")]
    pub graph: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct PinLinkParams {
    pub blueprint: String,
    #[serde(default = "default_graph")]
    pub graph: String,
    pub source: PinAddress,
    pub target: PinAddress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct DeleteNodeParams {
    pub blueprint: String,
    #[serde(default = "default_graph")]
    pub graph: String,
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub struct SetPinDefaultParams {
    pub blueprint: String,
    #[serde(default = "default_graph")]
    pub graph: String,
    pub node_id: String,
    pub pin: String,
    pub value: String,
}

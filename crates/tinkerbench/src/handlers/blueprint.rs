//! Blueprint lifecycle commands

use benchproto::params::{
    AddBlueprintVariableParams, AddFunctionGraphParams, BlueprintParams, CreateBlueprintParams,
};
use benchproto::CommandError;
use serde_json::{json, Value};

use crate::editor::HostState;
use crate::primitives::PinType;
use crate::reflection::ReflectedVariable;

pub fn create_blueprint(
    host: &mut HostState,
    params: CreateBlueprintParams,
) -> Result<Value, CommandError> {
    let bp = host.create_blueprint(&params.name, params.parent_class.as_deref())?;
    Ok(json!({
        "name": bp.name(),
        "parent-class": bp.parent_class(),
        "generated-class": bp.generated_class(),
        "generation": bp.generation(),
        "graphs": bp.graph_names(),
    }))
}

pub fn add_blueprint_variable(
    host: &mut HostState,
    params: AddBlueprintVariableParams,
) -> Result<Value, CommandError> {
    let mut ty = PinType::parse_spec(&params.variable_type).ok_or_else(|| {
        CommandError::invalid_params(format!("unknown variable type '{}'", params.variable_type))
    })?;
    if ty.is_exec() || ty.is_wildcard() {
        return Err(CommandError::invalid_params(format!(
            "'{}' is not a variable type",
            params.variable_type
        )));
    }
    if params.is_array && !ty.is_array {
        ty = ty.array();
    }

    let mut variable = ReflectedVariable::new(&params.name, ty);
    variable.read_only = params.read_only;
    variable.default_value = params.default_value;
    variable.category = "Default".to_string();

    let type_name = variable.ty.to_string();
    let generation = host.add_variable(&params.blueprint, variable)?;
    Ok(json!({
        "blueprint": params.blueprint,
        "variable": params.name,
        "type": type_name,
        "generation": generation,
    }))
}

pub fn add_function_graph(
    host: &mut HostState,
    params: AddFunctionGraphParams,
) -> Result<Value, CommandError> {
    let generation = host.add_function_graph(&params.blueprint, &params.name, params.pure)?;
    Ok(json!({
        "blueprint": params.blueprint,
        "graph": params.name,
        "generation": generation,
    }))
}

/// Recompile, refresh every node against the new class, and drop cached
/// descriptors that no longer resolve.
pub fn compile_blueprint(
    host: &mut HostState,
    params: BlueprintParams,
) -> Result<Value, CommandError> {
    let generation = host.compile_blueprint(&params.blueprint)?;
    let report = host.refresh_nodes(&params.blueprint)?;
    let purged = host.cache.purge_stale(&host.registry);
    let compile_count = host.blueprint(&params.blueprint)?.compile_count();

    Ok(json!({
        "blueprint": params.blueprint,
        "generation": generation,
        "compile-count": compile_count,
        "refreshed-nodes": report.refreshed,
        "orphaned-nodes": report.orphaned,
        "purged-descriptors": purged,
    }))
}

//! Graph inspection and pin wiring

use benchproto::params::{GraphParams, PinLinkParams};
use benchproto::CommandError;
use serde_json::{json, Value};

use crate::editor::HostState;

use super::parse_node_id;

pub fn get_graph(host: &mut HostState, params: GraphParams) -> Result<Value, CommandError> {
    let snapshot = host.graph(&params.blueprint, &params.graph)?.snapshot();
    serde_json::to_value(snapshot).map_err(|e| CommandError::internal(e.to_string()))
}

pub fn connect_pins(host: &mut HostState, params: PinLinkParams) -> Result<Value, CommandError> {
    let source = parse_node_id(&params.source.node_id)?;
    let target = parse_node_id(&params.target.node_id)?;
    let (registry, graph) = host.graph_mut(&params.blueprint, &params.graph)?;

    graph.connect(
        (source, &params.source.pin),
        (target, &params.target.pin),
        registry,
    )?;
    Ok(json!({
        "connected": true,
        "link-count": graph.link_count(),
    }))
}

pub fn disconnect_pins(host: &mut HostState, params: PinLinkParams) -> Result<Value, CommandError> {
    let source = parse_node_id(&params.source.node_id)?;
    let target = parse_node_id(&params.target.node_id)?;
    let (_, graph) = host.graph_mut(&params.blueprint, &params.graph)?;

    // surface unknown pins rather than reporting "nothing to remove"
    graph.pin(source, &params.source.pin)?;
    graph.pin(target, &params.target.pin)?;

    let removed = graph.disconnect((source, &params.source.pin), (target, &params.target.pin));
    Ok(json!({
        "disconnected": removed,
        "link-count": graph.link_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::create_node_by_key;
    use crate::reflection::paths;
    use benchproto::params::{CreateNodeByKeyParams, PinAddress};
    use benchproto::ErrorCode;
    use std::collections::BTreeMap;

    fn add(host: &mut HostState, key: String) -> String {
        let payload = create_node_by_key(
            host,
            CreateNodeByKeyParams {
                key,
                blueprint: Some("BP_Door".into()),
                graph: "EventGraph".into(),
                position: None,
                pin_defaults: BTreeMap::new(),
            },
        )
        .unwrap();
        payload["node-id"].as_str().unwrap().to_string()
    }

    fn link(a: &str, a_pin: &str, b: &str, b_pin: &str) -> PinLinkParams {
        PinLinkParams {
            blueprint: "BP_Door".into(),
            graph: "EventGraph".into(),
            source: PinAddress { node_id: a.into(), pin: a_pin.into() },
            target: PinAddress { node_id: b.into(), pin: b_pin.into() },
        }
    }

    #[test]
    fn test_connect_snapshot_disconnect() {
        let mut host = HostState::with_builtins();
        host.create_blueprint("BP_Door", None).unwrap();
        let event = add(&mut host, format!("event:{}:ReceiveBeginPlay", paths::ACTOR));
        let print = add(&mut host, format!("fn:{}:PrintString", paths::SYSTEM_LIBRARY));

        // argument order does not matter
        let payload = connect_pins(&mut host, link(&print, "execute", &event, "then")).unwrap();
        assert_eq!(payload["link-count"], json!(1));

        let snapshot = get_graph(
            &mut host,
            GraphParams {
                blueprint: "BP_Door".into(),
                graph: "EventGraph".into(),
            },
        )
        .unwrap();
        assert_eq!(snapshot["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(snapshot["links"][0]["source-node"], json!(event));

        let payload = disconnect_pins(&mut host, link(&event, "then", &print, "execute")).unwrap();
        assert_eq!(payload["disconnected"], json!(true));
        let payload = disconnect_pins(&mut host, link(&event, "then", &print, "execute")).unwrap();
        assert_eq!(payload["disconnected"], json!(false));
    }

    #[test]
    fn test_connect_rejects_mismatched_types() {
        let mut host = HostState::with_builtins();
        host.create_blueprint("BP_Door", None).unwrap();
        let event = add(&mut host, format!("event:{}:ReceiveBeginPlay", paths::ACTOR));
        let print = add(&mut host, format!("fn:{}:PrintString", paths::SYSTEM_LIBRARY));

        let err = connect_pins(&mut host, link(&event, "then", &print, "InString")).unwrap_err();
        assert_eq!(err.code, ErrorCode::IncompatiblePins);

        let err = connect_pins(&mut host, link(&event, "nope", &print, "execute")).unwrap_err();
        assert_eq!(err.code, ErrorCode::PinNotFound);

        let err = connect_pins(&mut host, link("not-a-uuid", "then", &print, "execute")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }
}

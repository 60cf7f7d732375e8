//! `discover_operations` and `get_cache_stats`
//!
//! Only the descriptors a discovery returns (after `max-results`) are
//! cached; anything ranked below the cut is not.

use async_trait::async_trait;
use benchproto::params::DiscoverOperationsParams;
use benchproto::CommandError;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::catalog::{CatalogContext, CatalogFilters, PinContext};
use crate::dispatch::CommandHandler;
use crate::editor::{HostState, EVENT_GRAPH, SCRATCH_BLUEPRINT};
use crate::marshal::MainThread;
use crate::ranker::{rank, RankOptions};

use super::parse_node_id;

fn build_context(
    host: &HostState,
    params: &DiscoverOperationsParams,
) -> Result<CatalogContext, CommandError> {
    // a context pin only makes sense inside some graph
    let blueprint = match (&params.blueprint, &params.context_pin) {
        (Some(name), _) => Some(name.as_str()),
        (None, Some(_)) => Some(SCRATCH_BLUEPRINT),
        (None, None) => None,
    };
    let Some(blueprint) = blueprint else {
        return Ok(CatalogContext::default());
    };

    let graph_name = params.graph.as_deref().unwrap_or(EVENT_GRAPH);
    let graph = host.graph(blueprint, graph_name)?;

    let pin = match &params.context_pin {
        Some(address) => {
            let id = parse_node_id(&address.node_id)?;
            let pin = graph.pin(id, &address.pin)?;
            Some(PinContext {
                ty: pin.pin_type(),
                direction: pin.direction,
            })
        }
        None => None,
    };

    Ok(CatalogContext {
        owner_class: Some(graph.owner_class().to_string()),
        graph_kind: Some(graph.kind()),
        pin,
    })
}

pub fn discover_operations(
    host: &mut HostState,
    params: DiscoverOperationsParams,
) -> Result<Value, CommandError> {
    let context = build_context(host, &params)?;
    let filters = CatalogFilters {
        mode: params.mode,
        include_deprecated: params
            .include_deprecated
            .unwrap_or(host.discovery.include_deprecated),
    };
    let max_results = params
        .max_results
        .unwrap_or(host.discovery.default_max_results)
        .min(host.discovery.max_results_limit);

    let mode = context.effective_mode(filters.mode);
    let candidates = host.walker.enumerate(&host.registry, &context, &filters);
    let candidate_count = candidates.len();
    let operations = rank(
        candidates,
        &params.query,
        &RankOptions {
            category: params.category.as_deref(),
            max_results: Some(max_results),
        },
    );
    host.cache.insert_all(&operations);

    debug!(
        query = %params.query,
        candidates = candidate_count,
        returned = operations.len(),
        "discovered operations"
    );

    Ok(json!({
        "operations": operations,
        "count": operations.len(),
        "candidates": candidate_count,
        "mode": mode,
    }))
}

/// Reports descriptor cache, catalog walk, and marshalling counters.
pub struct CacheStatsCommand {
    main: MainThread,
}

impl CacheStatsCommand {
    pub fn new(main: MainThread) -> Self {
        Self { main }
    }
}

#[async_trait]
impl CommandHandler for CacheStatsCommand {
    fn description(&self) -> &str {
        "Descriptor cache, catalog walk, and main-thread counters"
    }

    async fn handle(&self, _parameters: Map<String, Value>) -> Result<Value, CommandError> {
        let (cache, walks) = self
            .main
            .run(|host| (host.cache.stats(), host.walker.walks()))
            .await?;
        Ok(json!({
            "cache": cache,
            "catalog-walks": walks,
            "marshal": self.main.stats().snapshot(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::OperationDescriptor;
    use benchproto::params::{DiscoveryMode, PinAddress};
    use benchproto::ErrorCode;

    fn discover(host: &mut HostState, params: DiscoverOperationsParams) -> Vec<OperationDescriptor> {
        let payload = discover_operations(host, params).unwrap();
        serde_json::from_value(payload["operations"].clone()).unwrap()
    }

    fn query(q: &str) -> DiscoverOperationsParams {
        DiscoverOperationsParams {
            query: q.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_clamp_ranks_first_and_is_cached() {
        let mut host = HostState::with_builtins();
        let ops = discover(
            &mut host,
            DiscoverOperationsParams {
                max_results: Some(5),
                ..query("clamp")
            },
        );
        assert!(!ops.is_empty() && ops.len() <= 5);
        assert!(ops[0].display_name.contains("Clamp"));
        assert!(ops.iter().all(|op| host.cache.contains(&op.key)));
        assert_eq!(host.walker.walks(), 1);
    }

    #[test]
    fn test_same_request_same_order() {
        let mut host = HostState::with_builtins();
        let first = discover(&mut host, query("get"));
        let second = discover(&mut host, query("get"));
        let keys = |ops: &[OperationDescriptor]| ops.iter().map(|o| o.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&first), keys(&second));
    }

    #[test]
    fn test_max_results_is_clamped_to_limit() {
        let mut host = HostState::with_builtins();
        host.discovery.max_results_limit = 3;
        let ops = discover(
            &mut host,
            DiscoverOperationsParams {
                max_results: Some(500),
                mode: DiscoveryMode::Unfiltered,
                ..query("")
            },
        );
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn test_blueprint_context_includes_member_events() {
        let mut host = HostState::with_builtins();
        host.create_blueprint("BP_Door", None).unwrap();
        let ops = discover(
            &mut host,
            DiscoverOperationsParams {
                blueprint: Some("BP_Door".into()),
                ..query("BeginPlay")
            },
        );
        assert!(ops.iter().any(|op| op.key.ends_with(":ReceiveBeginPlay")));
    }

    #[test]
    fn test_no_context_finds_class_members() {
        let mut host = HostState::with_builtins();
        let payload = discover_operations(&mut host, query("jump")).unwrap();
        assert_eq!(payload["mode"], "unfiltered");
        let ops: Vec<OperationDescriptor> = serde_json::from_value(payload["operations"].clone()).unwrap();
        assert!(ops.iter().any(|op| op.key.ends_with(":Jump")));

        host.create_blueprint("BP_Door", None).unwrap();
        let payload = discover_operations(
            &mut host,
            DiscoverOperationsParams {
                blueprint: Some("BP_Door".into()),
                ..query("jump")
            },
        )
        .unwrap();
        assert_eq!(payload["mode"], "context");
    }

    #[test]
    fn test_unknown_context_pin_node() {
        let mut host = HostState::with_builtins();
        host.create_blueprint("BP_Door", None).unwrap();
        let err = discover_operations(
            &mut host,
            DiscoverOperationsParams {
                blueprint: Some("BP_Door".into()),
                context_pin: Some(PinAddress {
                    node_id: uuid::Uuid::new_v4().to_string(),
                    pin: "then".into(),
                }),
                ..query("")
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NodeNotFound);
    }

    #[test]
    fn test_missing_blueprint() {
        let mut host = HostState::with_builtins();
        let err = discover_operations(
            &mut host,
            DiscoverOperationsParams {
                blueprint: Some("BP_Nope".into()),
                ..query("")
            },
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::BlueprintNotFound);
    }
}

//! tinkerbench - remote control for a node-graph editor
//!
//! An external client connects over TCP, discovers which operations can be
//! placed at a graph location, and creates nodes from the exact descriptor
//! keys it was given. All editor work happens on a single main thread.
//!
//! ## Layers
//!
//! - **Host model**: `reflection` (live type registry), `editor` (blueprints
//!   and their graphs), `graph` (petgraph-backed node graphs)
//! - **Discovery**: `catalog` walks the registry into `descriptor`s,
//!   `ranker` orders them for a query, `cache` keeps them by key
//! - **Construction**: `materializer` turns one descriptor into a node,
//!   `router` threads links through reroute nodes
//! - **Plumbing**: `marshal` (main-thread queue), `dispatch` (command
//!   registry), `handlers`, `server` (listener and sessions), `daemon`
//!
//! ## Quick Start
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! let config = benchconf::BenchConfig::load()?;
//! let daemon = tinkerbench::Daemon::start(&config).await?;
//! tokio::signal::ctrl_c().await?;
//! daemon.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod daemon;
pub mod descriptor;
pub mod dispatch;
pub mod editor;
mod errors;
pub mod graph;
pub mod handlers;
pub mod marshal;
pub mod materializer;
pub mod primitives;
pub mod ranker;
pub mod reflection;
pub mod router;
pub mod server;
pub mod telemetry;

pub use cache::{CacheStats, DescriptorCache};
pub use catalog::{CatalogContext, CatalogError, CatalogFilters, CatalogWalker, PinContext};
pub use daemon::{build_registry, Daemon};
pub use descriptor::{OperationDescriptor, OperationKind};
pub use dispatch::{CommandHandler, CommandInfo, CommandRegistry};
pub use editor::{Blueprint, EditorError, HostState};
pub use graph::{Graph, GraphError, GraphKind, GraphNode};
pub use marshal::{MainLoop, MainThread, MarshalError, MarshalStats};
pub use materializer::{materialize, MaterializeError};
pub use primitives::{PinCategory, PinDescriptor, PinDirection, PinType, Position, TemplateRef};
pub use ranker::{rank, RankOptions};
pub use reflection::{TypeRegistry, TypeKind};
pub use router::{insert_passthrough, RouteError};
pub use server::Server;

//! Daemon wiring
//!
//! Builds the type registry from the configured catalogs, starts the main
//! loop on its own thread, registers every command, and runs the listener.

use std::net::SocketAddr;
use std::thread;

use anyhow::{anyhow, Context, Result};
use benchconf::{BenchConfig, CatalogConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::CommandRegistry;
use crate::editor::HostState;
use crate::handlers;
use crate::marshal::{self, MainThread};
use crate::reflection::{load_catalog_file, TypeRegistry};
use crate::server::Server;

/// Seed a registry from the builtin library and any catalog files, in order.
/// Later definitions of the same type path replace earlier ones.
pub fn build_registry(catalog: &CatalogConfig) -> Result<TypeRegistry> {
    let mut registry = if catalog.builtin_library {
        TypeRegistry::with_builtins()
    } else {
        TypeRegistry::new()
    };

    for file in &catalog.files {
        let path = benchconf::loader::expand_path(&file.to_string_lossy());
        let types = load_catalog_file(&path)
            .with_context(|| format!("loading catalog {}", path.display()))?;
        let count = types.len();
        for ty in types {
            if registry.contains(&ty.path) {
                warn!(path = %ty.path, catalog = %path.display(), "catalog replaces existing type");
            }
            registry.register(ty);
        }
        info!(catalog = %path.display(), types = count, "loaded catalog");
    }

    Ok(registry)
}

/// A running daemon: listener task plus main-thread loop.
pub struct Daemon {
    addr: SocketAddr,
    main: MainThread,
    shutdown: CancellationToken,
    server: JoinHandle<Result<()>>,
    main_loop: thread::JoinHandle<HostState>,
}

impl Daemon {
    /// Start everything described by `config`. Port 0 binds an ephemeral port.
    pub async fn start(config: &BenchConfig) -> Result<Self> {
        let registry = build_registry(&config.bootstrap.catalog)?;
        info!(types = registry.len(), "type registry ready");

        let host = HostState::new(registry, config.bootstrap.discovery.clone());
        let (main, main_loop) = marshal::channel(host, config.task_timeout());
        let main_loop = main_loop.spawn().context("failed to start main thread")?;

        let mut commands = CommandRegistry::new();
        handlers::register_all(&mut commands, &main);
        Self::serve(config, commands, main, main_loop).await
    }

    /// Start with a caller-supplied command registry and main-thread pair.
    /// Lets embedders add their own commands next to the editor ones.
    pub async fn serve(
        config: &BenchConfig,
        commands: CommandRegistry,
        main: MainThread,
        main_loop: thread::JoinHandle<HostState>,
    ) -> Result<Self> {
        let server = Server::bind(
            &config.infra.bind.address(),
            commands,
            config.infra.session.clone(),
        )
        .await?;
        let addr = server.local_addr()?;
        let shutdown = server.shutdown_token();
        let server = tokio::spawn(server.run());

        Ok(Self {
            addr,
            main,
            shutdown,
            server,
            main_loop,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn main_thread(&self) -> &MainThread {
        &self.main
    }

    /// Stop the listener, wait for the active session to finish its command,
    /// then stop the main loop and hand back the final host state.
    pub async fn shutdown(self) -> Result<HostState> {
        let Daemon {
            main,
            shutdown,
            server,
            main_loop,
            ..
        } = self;

        shutdown.cancel();
        server.await.context("listener task failed")??;
        drop(main);

        let host = tokio::task::spawn_blocking(move || main_loop.join())
            .await
            .context("main thread join task failed")?
            .map_err(|_| anyhow!("main thread panicked"))?;
        info!("daemon stopped");
        Ok(host)
    }
}

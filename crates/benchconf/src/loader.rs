//! Where tinkerbench config comes from: TOML files in the usual places, then `TINKERBENCH_*` env vars.

use crate::{
    BenchConfig, BindConfig, BootstrapConfig, CatalogConfig, ConfigError, DiscoveryConfig,
    InfraConfig, MarshalConfig, SessionConfig, TelemetryConfig,
};
use std::env;
use std::path::{Path, PathBuf};

/// Provenance of the effective config, printed at startup.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Files merged, lowest precedence first
    pub files: Vec<PathBuf>,
    /// Env vars that replaced a file or default value
    pub env_overrides: Vec<String>,
}

/// Same as [`discover_config_files_with_override`] without a CLI path.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// System, user, then local config files that exist, lowest precedence first.
///
/// An explicit `--config` path takes the place of `./tinkerbench.toml`.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/tinkerbench/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("tinkerbench/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("tinkerbench.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read and parse a single config file.
pub fn load_from_file(path: &Path) -> Result<BenchConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Deserialize one TOML document; `path` is only used in errors.
pub(crate) fn parse_toml(contents: &str, path: &Path) -> Result<BenchConfig, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let mut infra = InfraConfig::default();

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("host").and_then(|v| v.as_str()) {
            infra.bind.host = v.to_string();
        }
        if let Some(v) = bind.get("port").and_then(|v| v.as_integer()) {
            infra.bind.port =
                u16::try_from(v).map_err(|_| parse_err(format!("bind.port out of range: {v}")))?;
        }
    }

    if let Some(session) = table.get("session").and_then(|v| v.as_table()) {
        if let Some(v) = session.get("policy").and_then(|v| v.as_str()) {
            infra.session.policy = v.parse().map_err(parse_err)?;
        }
        if let Some(v) = session.get("max_frame_bytes").and_then(|v| v.as_integer()) {
            infra.session.max_frame_bytes = usize::try_from(v)
                .map_err(|_| parse_err(format!("session.max_frame_bytes out of range: {v}")))?;
        }
    }

    if let Some(marshal) = table.get("marshal").and_then(|v| v.as_table()) {
        if let Some(v) = marshal.get("task_timeout_ms").and_then(|v| v.as_integer()) {
            infra.marshal.task_timeout_ms = u64::try_from(v)
                .map_err(|_| parse_err(format!("marshal.task_timeout_ms out of range: {v}")))?;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            infra.telemetry.log_level = v.to_string();
        }
    }

    let mut bootstrap = BootstrapConfig::default();

    if let Some(section) = table.get("bootstrap").and_then(|v| v.as_table()) {
        if let Some(discovery) = section.get("discovery").and_then(|v| v.as_table()) {
            if let Some(v) = discovery.get("default_max_results").and_then(|v| v.as_integer()) {
                bootstrap.discovery.default_max_results = v.max(1) as usize;
            }
            if let Some(v) = discovery.get("max_results_limit").and_then(|v| v.as_integer()) {
                bootstrap.discovery.max_results_limit = v.max(1) as usize;
            }
            if let Some(v) = discovery.get("include_deprecated").and_then(|v| v.as_bool()) {
                bootstrap.discovery.include_deprecated = v;
            }
        }

        if let Some(catalog) = section.get("catalog").and_then(|v| v.as_table()) {
            if let Some(v) = catalog.get("builtin_library").and_then(|v| v.as_bool()) {
                bootstrap.catalog.builtin_library = v;
            }
            if let Some(files) = catalog.get("files").and_then(|v| v.as_array()) {
                bootstrap.catalog.files = files
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(expand_path)
                    .collect();
            }
        }
    }

    Ok(BenchConfig { infra, bootstrap })
}

fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge two configs, with non-default values in `overlay` taking precedence.
pub fn merge_configs(base: BenchConfig, overlay: BenchConfig) -> BenchConfig {
    let bind = BindConfig::default();
    let session = SessionConfig::default();
    let marshal = MarshalConfig::default();
    let telemetry = TelemetryConfig::default();
    let discovery = DiscoveryConfig::default();
    let catalog = CatalogConfig::default();

    BenchConfig {
        infra: InfraConfig {
            bind: BindConfig {
                host: pick(base.infra.bind.host, overlay.infra.bind.host, bind.host),
                port: pick(base.infra.bind.port, overlay.infra.bind.port, bind.port),
            },
            session: SessionConfig {
                policy: pick(
                    base.infra.session.policy,
                    overlay.infra.session.policy,
                    session.policy,
                ),
                max_frame_bytes: pick(
                    base.infra.session.max_frame_bytes,
                    overlay.infra.session.max_frame_bytes,
                    session.max_frame_bytes,
                ),
            },
            marshal: MarshalConfig {
                task_timeout_ms: pick(
                    base.infra.marshal.task_timeout_ms,
                    overlay.infra.marshal.task_timeout_ms,
                    marshal.task_timeout_ms,
                ),
            },
            telemetry: TelemetryConfig {
                log_level: pick(
                    base.infra.telemetry.log_level,
                    overlay.infra.telemetry.log_level,
                    telemetry.log_level,
                ),
            },
        },
        bootstrap: BootstrapConfig {
            discovery: DiscoveryConfig {
                default_max_results: pick(
                    base.bootstrap.discovery.default_max_results,
                    overlay.bootstrap.discovery.default_max_results,
                    discovery.default_max_results,
                ),
                max_results_limit: pick(
                    base.bootstrap.discovery.max_results_limit,
                    overlay.bootstrap.discovery.max_results_limit,
                    discovery.max_results_limit,
                ),
                include_deprecated: pick(
                    base.bootstrap.discovery.include_deprecated,
                    overlay.bootstrap.discovery.include_deprecated,
                    discovery.include_deprecated,
                ),
            },
            catalog: CatalogConfig {
                builtin_library: pick(
                    base.bootstrap.catalog.builtin_library,
                    overlay.bootstrap.catalog.builtin_library,
                    catalog.builtin_library,
                ),
                // Catalog lists accumulate across files
                files: base
                    .bootstrap
                    .catalog
                    .files
                    .into_iter()
                    .chain(overlay.bootstrap.catalog.files)
                    .collect(),
            },
        },
    }
}

/// Overlay `TINKERBENCH_*` and `RUST_LOG` on top of the file config.
pub fn apply_env_overrides(config: &mut BenchConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from an arbitrary variable lookup.
pub fn apply_overrides_from(
    config: &mut BenchConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("TINKERBENCH_HOST") {
        config.infra.bind.host = v;
        sources.env_overrides.push("TINKERBENCH_HOST".to_string());
    }
    if let Some(v) = lookup("TINKERBENCH_PORT") {
        if let Ok(port) = v.parse() {
            config.infra.bind.port = port;
            sources.env_overrides.push("TINKERBENCH_PORT".to_string());
        }
    }
    if let Some(v) = lookup("TINKERBENCH_SESSION_POLICY") {
        if let Ok(policy) = v.parse() {
            config.infra.session.policy = policy;
            sources.env_overrides.push("TINKERBENCH_SESSION_POLICY".to_string());
        }
    }
    if let Some(v) = lookup("TINKERBENCH_TASK_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.infra.marshal.task_timeout_ms = ms;
            sources.env_overrides.push("TINKERBENCH_TASK_TIMEOUT_MS".to_string());
        }
    }
    if let Some(v) = lookup("TINKERBENCH_LOG_LEVEL") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("TINKERBENCH_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over everything, matching tracing-subscriber conventions
    if let Some(v) = lookup("RUST_LOG") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// `~/x` and `$VAR/x` style expansion for catalog and config paths.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

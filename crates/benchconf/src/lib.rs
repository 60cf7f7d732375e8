//! Configuration loading for tinkerbench.
//!
//! Kept dependency-light so every tinkerbench crate can import it.
//!
//! # Configuration Philosophy
//!
//! - **Infrastructure** (`InfraConfig`): fixed for the life of the process -
//!   bind address, session policy, marshalling timeout, log filter.
//!
//! - **Bootstrap** (`BootstrapConfig`): seeds runtime state - discovery
//!   defaults and which reflection catalogs populate the type registry.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/tinkerbench/config.toml` (system)
//! 2. `~/.config/tinkerbench/config.toml` (user)
//! 3. `./tinkerbench.toml` (local override, or an explicit `--config` path)
//! 4. Environment variables (`TINKERBENCH_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [bind]
//! host = "127.0.0.1"
//! port = 55557
//!
//! [session]
//! policy = "reject"
//! max_frame_bytes = 16777216
//!
//! [marshal]
//! task_timeout_ms = 10000
//!
//! [telemetry]
//! log_level = "info"
//!
//! [bootstrap.discovery]
//! default_max_results = 20
//! max_results_limit = 200
//!
//! [bootstrap.catalog]
//! builtin_library = true
//! files = ["~/catalogs/gameplay.toml"]
//! ```

pub mod bootstrap;
pub mod infra;
pub mod loader;

pub use bootstrap::{BootstrapConfig, CatalogConfig, DiscoveryConfig};
pub use infra::{
    BindConfig, InfraConfig, MarshalConfig, SessionConfig, SessionPolicy, TelemetryConfig,
};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete tinkerbench configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Infrastructure - cannot change at runtime.
    #[serde(flatten)]
    pub infra: InfraConfig,

    /// Bootstrap - seeds runtime state.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl BenchConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` stand in for `./tinkerbench.toml`.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and report where values came from.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = BenchConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Main-thread task timeout as a `Duration`.
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.infra.marshal.task_timeout_ms)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Built by hand so sections come out in a stable, readable order
        let mut output = String::new();

        output.push_str("# tinkerbench configuration\n\n");

        output.push_str("[bind]\n");
        output.push_str(&format!("host = \"{}\"\n", self.infra.bind.host));
        output.push_str(&format!("port = {}\n", self.infra.bind.port));

        output.push_str("\n[session]\n");
        output.push_str(&format!("policy = \"{}\"\n", self.infra.session.policy));
        output.push_str(&format!(
            "max_frame_bytes = {}\n",
            self.infra.session.max_frame_bytes
        ));

        output.push_str("\n[marshal]\n");
        output.push_str(&format!(
            "task_timeout_ms = {}\n",
            self.infra.marshal.task_timeout_ms
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.infra.telemetry.log_level
        ));

        output.push_str("\n[bootstrap.discovery]\n");
        output.push_str(&format!(
            "default_max_results = {}\n",
            self.bootstrap.discovery.default_max_results
        ));
        output.push_str(&format!(
            "max_results_limit = {}\n",
            self.bootstrap.discovery.max_results_limit
        ));
        output.push_str(&format!(
            "include_deprecated = {}\n",
            self.bootstrap.discovery.include_deprecated
        ));

        output.push_str("\n[bootstrap.catalog]\n");
        output.push_str(&format!(
            "builtin_library = {}\n",
            self.bootstrap.catalog.builtin_library
        ));
        output.push_str("files = [\n");
        for file in &self.bootstrap.catalog.files {
            output.push_str(&format!("    \"{}\",\n", file.display()));
        }
        output.push_str("]\n");

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BenchConfig::default();
        assert_eq!(config.infra.bind.port, 55557);
        assert_eq!(config.infra.session.policy, SessionPolicy::Reject);
        assert_eq!(config.task_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_to_toml_roundtrips_through_parser() {
        let mut config = BenchConfig::default();
        config.infra.bind.port = 6000;
        config.bootstrap.catalog.files.push(PathBuf::from("/srv/catalog.toml"));

        let rendered = config.to_toml();
        assert!(rendered.contains("[bind]"));
        assert!(rendered.contains("[bootstrap.catalog]"));

        let parsed = loader::parse_toml(&rendered, std::path::Path::new("rendered.toml")).unwrap();
        assert_eq!(parsed, config);
    }
}

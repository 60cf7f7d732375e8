//! Bootstrap configuration - seeds runtime state, then runtime owns it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Defaults for `discover_operations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Results returned when a request does not set `max-results`.
    #[serde(default = "DiscoveryConfig::default_max_results")]
    pub default_max_results: usize,

    /// Hard cap applied to any requested `max-results`.
    #[serde(default = "DiscoveryConfig::default_max_results_limit")]
    pub max_results_limit: usize,

    /// Whether deprecated functions are enumerated at all.
    #[serde(default)]
    pub include_deprecated: bool,
}

impl DiscoveryConfig {
    fn default_max_results() -> usize {
        20
    }

    fn default_max_results_limit() -> usize {
        200
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_max_results: Self::default_max_results(),
            max_results_limit: Self::default_max_results_limit(),
            include_deprecated: false,
        }
    }
}

/// Where the reflected type registry is seeded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Seed the registry with the builtin library (math, string, system, actor classes).
    #[serde(default = "CatalogConfig::default_builtin_library")]
    pub builtin_library: bool,

    /// Extra TOML catalogs loaded after the builtin library, in order.
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl CatalogConfig {
    fn default_builtin_library() -> bool {
        true
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            builtin_library: Self::default_builtin_library(),
            files: Vec::new(),
        }
    }
}

/// Bootstrap configuration - seeds runtime, then runtime owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

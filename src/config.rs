use crate::backends::{
    BackendDescriptor, BackendKind, BackendRegistry, LocalDirectoryClient, ObjectStoreConnector,
};
use crate::cache::CacheConfig;
use crate::error::{EngineError, Result};
use crate::scoring::ScoringConfig;
use crate::search::SearchConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use validator::Validate;

/// Environment variable naming an override file
pub const CONFIG_PATH_ENV: &str = "GENOMICS_SEARCH_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Orchestrator limits and matching thresholds
    pub search: SearchConfig,

    /// Cache tiers
    pub cache: CacheConfig,

    /// Relevance weights
    pub scoring: ScoringConfig,

    /// Logging and metrics
    pub observability: ObservabilityConfig,

    /// Local directory trees searched as object stores
    pub backends: Vec<BackendSettings>,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and
    /// the environment, in increasing priority.
    ///
    /// The file is `path` when given, otherwise `$GENOMICS_SEARCH_CONFIG`,
    /// otherwise `config/genomics-search.toml`. Environment variables use
    /// the `GENOMICS_SEARCH` prefix and `__` as the nesting separator, e.g.
    /// `GENOMICS_SEARCH__SEARCH__SEARCH_TIMEOUT_MS=5000`.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path
            .map(|p| p.display().to_string())
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| "config/genomics-search".to_string());

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables
            .add_source(
                config::Environment::with_prefix("GENOMICS_SEARCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Range checks on every section plus unique backend ids
    pub fn validate(&self) -> Result<()> {
        self.search.check()?;
        Validate::validate(&self.cache)?;
        self.scoring.check()?;

        let mut seen = HashSet::new();
        for backend in &self.backends {
            if backend.id.trim().is_empty() {
                return Err(EngineError::Configuration(
                    "backend id must not be empty".to_string(),
                ));
            }
            if !seen.insert(backend.id.as_str()) {
                return Err(EngineError::Configuration(format!(
                    "duplicate backend id '{}'",
                    backend.id
                )));
            }
        }

        Ok(())
    }

    /// Registry with one local-directory connector per configured backend
    pub fn build_registry(&self) -> Result<BackendRegistry> {
        let registry = BackendRegistry::new();
        let client = Arc::new(LocalDirectoryClient::new());

        for backend in &self.backends {
            let mut descriptor = BackendDescriptor::new(
                backend.id.clone(),
                BackendKind::ObjectStore,
                backend.root.display().to_string(),
            );
            if !backend.enabled {
                descriptor = descriptor.disabled();
            }

            let mut connector = ObjectStoreConnector::new(descriptor, client.clone());
            if let Some(prefix) = &backend.prefix {
                connector = connector.with_prefix(prefix.clone());
            }
            registry.register(Arc::new(connector))?;
        }

        Ok(registry)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,

    /// Enable JSON logging
    pub json_logs: bool,

    /// Register Prometheus collectors at startup
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

/// One configured backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub id: String,

    /// Directory treated as the bucket
    pub root: PathBuf,

    /// Only list keys under this prefix
    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

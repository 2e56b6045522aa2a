//! Engine-wide configuration, loaded once at startup from file + environment
//! and exposed via a global singleton.

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path:?}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config")]
    ParseError(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Engine-wide tunables. None of these change operation semantics — they
/// bound resource usage for the ambient collaborator layer (eviction
/// scheduling, dump size limits).
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of keys an `evictExpired` sweep inspects per call
    /// before yielding, so a background scheduler can pace full sweeps.
    #[serde(default = "default_eviction_scan_batch")]
    pub eviction_scan_batch: usize,

    /// Upper bound on a single DUMP/RESTORE payload, in bytes. Zero disables
    /// the check.
    #[serde(default)]
    pub max_dump_payload_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            eviction_scan_batch: default_eviction_scan_batch(),
            max_dump_payload_bytes: 0,
        }
    }
}

fn default_eviction_scan_batch() -> usize {
    20_000
}

impl EngineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.eviction_scan_batch == 0 {
            return Err(ConfigError::Invalid(
                "eviction_scan_batch must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

static CONFIG: OnceLock<EngineConfig> = OnceLock::new();

const ENV_PREFIX: &str = "CACHECORE";
const ENV_SEPARATOR: &str = "__";
const ENV_VAR_CONFIG_FILE: &str = "CACHECORE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "./cachecore.toml";

/// Global accessor for the engine configuration. Falls back to defaults if
/// `init()` was never called, matching an embedded-library usage pattern
/// rather than requiring every caller to bootstrap a standalone server.
pub fn global() -> &'static EngineConfig {
    CONFIG.get_or_init(EngineConfig::default)
}

/// Load configuration from file + environment and install it as the global
/// singleton. A no-op if already initialized.
pub fn init() -> Result<(), ConfigError> {
    if CONFIG.get().is_some() {
        return Ok(());
    }

    info!("initializing cachecore configuration");
    let loaded = load()?;
    let _ = CONFIG.set(loaded);
    Ok(())
}

fn load() -> Result<EngineConfig, ConfigError> {
    let mut builder = config::Config::builder()
        .set_default("eviction_scan_batch", default_eviction_scan_batch() as i64)
        .map_err(ConfigError::ParseError)?
        .set_default("max_dump_payload_bytes", 0i64)
        .map_err(ConfigError::ParseError)?;

    if let Some(path) = find_config_file()? {
        info!(?path, "loading configuration file");
        builder = builder.add_source(config::File::from(path).required(true));
    } else {
        debug!("no config file found, using defaults and environment variables");
    }

    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR));

    let loaded: EngineConfig = builder
        .build()
        .map_err(ConfigError::ParseError)?
        .try_deserialize()
        .map_err(ConfigError::ParseError)?;

    loaded.validate()?;
    Ok(loaded)
}

fn find_config_file() -> Result<Option<PathBuf>, ConfigError> {
    if let Ok(path) = env::var(ENV_VAR_CONFIG_FILE) {
        let path = PathBuf::from(path);
        return if path.exists() {
            Ok(Some(path))
        } else {
            Err(ConfigError::FileNotFound { path })
        };
    }

    let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        return Ok(Some(default_path));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.eviction_scan_batch, 20_000);
    }

    #[test]
    fn zero_eviction_batch_is_rejected() {
        let cfg = EngineConfig {
            eviction_scan_batch: 0,
            max_dump_payload_bytes: 0,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }
}

//! Engine configuration.
//!
//! Plain structs with defaults. `from_env` layers `BOUNDARY_*` environment
//! variables on top; a value that does not parse is a `Config` error rather
//! than a silent fallback.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::boundary_store::StorageConfig;
use crate::encoding::{Embedder, EncoderConfig, HashingEmbedder, HttpEmbedder};
use crate::error::{EnforcementError, Result};
use crate::types::Decision;

pub const ENV_EMBEDDER_URL: &str = "BOUNDARY_EMBEDDER_URL";
pub const ENV_EMBEDDER_DIMENSION: &str = "BOUNDARY_EMBEDDER_DIMENSION";
pub const ENV_COLD_TIMEOUT_MS: &str = "BOUNDARY_EMBEDDER_COLD_TIMEOUT_MS";
pub const ENV_WARM_TIMEOUT_MS: &str = "BOUNDARY_EMBEDDER_WARM_TIMEOUT_MS";
pub const ENV_STORE_TIMEOUT_MS: &str = "BOUNDARY_STORE_TIMEOUT_MS";
pub const ENV_DEFAULT_DECISION: &str = "BOUNDARY_DEFAULT_DECISION";
pub const ENV_FAIL_MODE: &str = "BOUNDARY_FAIL_MODE";
pub const ENV_PROJECTION_SEED: &str = "BOUNDARY_PROJECTION_SEED";
pub const ENV_STORE_PATH: &str = "BOUNDARY_STORE_PATH";

const DEFAULT_EMBEDDER_DIMENSION: usize = 384;

/// Decision reported when the embedder or store is unavailable and the caller
/// asked for a fallback instead of an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailMode {
    Open,
    #[default]
    Closed,
}

impl FailMode {
    pub fn decision(self) -> Decision {
        match self {
            FailMode::Open => Decision::Allow,
            FailMode::Closed => Decision::Block,
        }
    }
}

impl FromStr for FailMode {
    type Err = EnforcementError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailMode::Open),
            "closed" => Ok(FailMode::Closed),
            other => Err(EnforcementError::Config(format!(
                "fail mode must be 'open' or 'closed', got '{}'",
                other
            ))),
        }
    }
}

fn parse_decision(s: &str) -> Result<Decision> {
    match s.trim().to_ascii_lowercase().as_str() {
        "allow" => Ok(Decision::Allow),
        "block" => Ok(Decision::Block),
        other => Err(EnforcementError::Config(format!(
            "default decision must be 'allow' or 'block', got '{}'",
            other
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedderBackend {
    Http { endpoint: String },
    Hashing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderSettings {
    pub backend: EmbedderBackend,
    pub dimension: usize,
}

impl Default for EmbedderSettings {
    fn default() -> Self {
        Self {
            backend: EmbedderBackend::Hashing,
            dimension: DEFAULT_EMBEDDER_DIMENSION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub encoder: EncoderConfig,
    pub embedder: EmbedderSettings,
    /// Decision when no allow boundary applies to an intent.
    pub default_decision: Decision,
    /// Mapping used by the `*_with_fallback` evaluation entry points.
    pub on_upstream_failure: FailMode,
    pub store_timeout: Duration,
    pub storage: StorageConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig::default(),
            embedder: EmbedderSettings::default(),
            default_decision: Decision::Block,
            on_upstream_failure: FailMode::Closed,
            store_timeout: Duration::from_millis(500),
            storage: StorageConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup (environment,
    /// test map, ...). Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_EMBEDDER_URL) {
            config.embedder.backend = EmbedderBackend::Http {
                endpoint: url.trim().to_string(),
            };
        }
        if let Some(dim) = get(ENV_EMBEDDER_DIMENSION) {
            let dimension: usize = parse_number(ENV_EMBEDDER_DIMENSION, &dim)?;
            if dimension == 0 {
                return Err(EnforcementError::Config(format!(
                    "{} must be positive",
                    ENV_EMBEDDER_DIMENSION
                )));
            }
            config.embedder.dimension = dimension;
        }
        if let Some(ms) = get(ENV_COLD_TIMEOUT_MS) {
            config.encoder.cold_timeout = Duration::from_millis(parse_number(ENV_COLD_TIMEOUT_MS, &ms)?);
        }
        if let Some(ms) = get(ENV_WARM_TIMEOUT_MS) {
            config.encoder.warm_timeout = Duration::from_millis(parse_number(ENV_WARM_TIMEOUT_MS, &ms)?);
        }
        if let Some(ms) = get(ENV_STORE_TIMEOUT_MS) {
            config.store_timeout = Duration::from_millis(parse_number(ENV_STORE_TIMEOUT_MS, &ms)?);
        }
        if let Some(seed) = get(ENV_PROJECTION_SEED) {
            config.encoder.projection_seed = parse_number(ENV_PROJECTION_SEED, &seed)?;
        }
        if let Some(decision) = get(ENV_DEFAULT_DECISION) {
            config.default_decision = parse_decision(&decision)?;
        }
        if let Some(mode) = get(ENV_FAIL_MODE) {
            config.on_upstream_failure = mode.parse()?;
        }
        if let Some(path) = get(ENV_STORE_PATH) {
            config.storage.db_path = PathBuf::from(path.trim());
        }

        Ok(config)
    }

    /// Instantiate the configured embedder.
    pub fn build_embedder(&self) -> Result<Arc<dyn Embedder>> {
        match &self.embedder.backend {
            EmbedderBackend::Http { endpoint } => {
                let embedder = HttpEmbedder::with_timeouts(
                    endpoint,
                    self.embedder.dimension,
                    Duration::from_millis(500),
                    self.encoder.cold_timeout.max(self.encoder.warm_timeout),
                )
                .map_err(|e| EnforcementError::Config(e.to_string()))?;
                Ok(Arc::new(embedder))
            }
            EmbedderBackend::Hashing => {
                warn!(
                    "{} is not set: using the local feature-hashing embedder ({} dims), \
                     which is not a semantic model",
                    ENV_EMBEDDER_URL, self.embedder.dimension
                );
                Ok(Arc::new(HashingEmbedder::new(self.embedder.dimension)))
            }
        }
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| EnforcementError::Config(format!("{} is not a valid number: '{}'", key, value)))
}

//! Configuration management for slidegate.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{Result, SlidegateError};
use crate::ratelimit::{window_from_secs, Clock, SlidingWindowLimiter};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlidegateConfig {
    /// Limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,
}

/// Sliding window parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Length of the trailing window in seconds
    #[serde(default = "default_window_size_secs")]
    pub window_size_secs: f64,

    /// Events admitted per key per window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            window_size_secs: default_window_size_secs(),
            max_requests: default_max_requests(),
        }
    }
}

fn default_window_size_secs() -> f64 {
    10.0
}

fn default_max_requests() -> usize {
    1
}

impl LimiterConfig {
    /// Check that the parameters describe a usable limiter.
    pub fn validate(&self) -> Result<()> {
        window_from_secs(self.window_size_secs)?;
        if self.max_requests == 0 {
            return Err(SlidegateError::InvalidMaxRequests);
        }
        Ok(())
    }

    /// Build a limiter reading the system clock.
    pub fn build<K>(&self) -> Result<SlidingWindowLimiter<K>>
    where
        K: Eq + std::hash::Hash,
    {
        let limiter =
            SlidingWindowLimiter::from_secs_f64(self.window_size_secs, self.max_requests)?;
        info!(
            window_secs = self.window_size_secs,
            max_requests = self.max_requests,
            "Sliding window limiter initialized"
        );
        Ok(limiter)
    }

    /// Build a limiter reading time from `clock`.
    pub fn build_with_clock<K, C>(&self, clock: C) -> Result<SlidingWindowLimiter<K, C>>
    where
        K: Eq + std::hash::Hash,
        C: Clock,
    {
        let window = window_from_secs(self.window_size_secs)?;
        SlidingWindowLimiter::with_clock(window, self.max_requests, clock)
    }
}

impl SlidegateConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: SlidegateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| SlidegateError::Config(format!("Failed to parse config: {}", e)))?;
        config.limiter.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration layered from an optional file and the environment.
    ///
    /// Environment variables take precedence over the file and use `__` as
    /// the nesting separator, e.g. `SLIDEGATE__LIMITER__MAX_REQUESTS=5` for
    /// prefix `SLIDEGATE`. A missing file falls back to defaults.
    pub fn load<P: AsRef<Path>>(path: Option<P>, env_prefix: &str) -> Result<Self> {
        Self::load_layered(path, env_prefix, env_source(env_prefix))
    }

    fn load_layered<P: AsRef<Path>>(
        path: Option<P>,
        env_prefix: &str,
        environment: Environment,
    ) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            let path = path.as_ref();
            info!(
                path = %path.display(),
                env_prefix = env_prefix,
                "Loading layered configuration"
            );
            builder = builder.add_source(File::from(path).required(false));
        }

        let config: SlidegateConfig = builder
            .add_source(environment)
            .build()
            .map_err(|e| SlidegateError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SlidegateError::Config(e.to_string()))?;

        config.limiter.validate()?;
        Ok(config)
    }
}

fn env_source(env_prefix: &str) -> Environment {
    Environment::with_prefix(env_prefix)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

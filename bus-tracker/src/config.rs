//! Application configuration.
//!
//! Loaded from a JSON file. Every field has a default, so an empty object is
//! a valid configuration that talks to the live portal.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, RouteNo};
use crate::graph::{BuildConfig, DEFAULT_DELAY};
use crate::live::{CacheConfig, CandidateStrategy, DEFAULT_ROUTE_TYPES, route_type_strategies};
use crate::predict::PredictConfig;
use crate::upstream::UpstreamConfig;
use crate::watch::{DEFAULT_POLL_INTERVAL, MAX_POLL_INTERVAL, MIN_POLL_INTERVAL};

/// Routes scraped when the config names none.
pub const DEFAULT_ROUTES: &[&str] = &[
    "1", "1A", "2", "2A", "2AS", "3", "3A", "3AX", "3X", "4", "5", "5X", "6A", "6B", "7", "8",
    "8A", "9", "9A", "10", "10B", "11", "12", "15", "15S", "15S1", "16", "16S", "17", "17S", "18",
    "18A", "18B", "19", "21A", "22", "23", "25", "25AX", "25B", "25BS", "26", "26A", "27", "28A",
    "28B", "28C", "29", "30", "30X", "32", "33", "34", "35", "36", "37", "39", "50", "50B", "51",
    "51A", "51X", "52", "55", "56", "59", "60", "61", "65", "71", "71S", "72", "73", "101X",
    "102X", "103", "701X", "701XS", "AP1", "AP1X", "H1", "H2", "H3", "MT1", "MT2", "MT3", "MT4",
    "MT5", "N1A", "N1B", "N2", "N3", "N5", "N6",
];

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid route in catalog: {0}")]
    Route(#[from] DomainError),

    #[error("{0}")]
    Invalid(String),
}

/// Static graph build and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Where the graph artifact is written and read.
    pub path: PathBuf,
    /// Pause after every upstream call during a build or backfill.
    pub delay_ms: u64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/network_graph.json"),
            delay_ms: DEFAULT_DELAY.as_millis() as u64,
        }
    }
}

impl GraphSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Live polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    /// Seconds between board refreshes for an observed stop (5 to 8).
    pub poll_interval_secs: u64,
    /// Seconds a live response is reused.
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
    /// `routeType` values tried for every live request, in priority order.
    pub route_types: Vec<String>,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            cache_ttl_secs: 4,
            cache_capacity: 1000,
            route_types: DEFAULT_ROUTE_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LiveSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            max_capacity: self.cache_capacity,
        }
    }

    pub fn strategies(&self) -> Vec<Arc<dyn CandidateStrategy>> {
        route_type_strategies(self.route_types.iter().cloned())
    }
}

/// HTTP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Route catalog for graph builds and coordinate backfill.
    pub routes: Vec<String>,
    pub upstream: UpstreamConfig,
    pub graph: GraphSettings,
    pub live: LiveSettings,
    pub predict: PredictConfig,
    pub server: ServerSettings,
    /// Serve recorded responses from this directory instead of the portal.
    pub mock_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            routes: DEFAULT_ROUTES.iter().map(|s| s.to_string()).collect(),
            upstream: UpstreamConfig::default(),
            graph: GraphSettings::default(),
            live: LiveSettings::default(),
            predict: PredictConfig::default(),
            server: ServerSettings::default(),
            mock_dir: None,
        }
    }
}

impl AppConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the tracker misbehave silently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.catalog()?;

        if self.live.route_types.is_empty() {
            return Err(ConfigError::Invalid(
                "live.route_types must name at least one variant".into(),
            ));
        }
        if !(MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL).contains(&self.live.poll_interval()) {
            return Err(ConfigError::Invalid(format!(
                "live.poll_interval_secs must be between {} and {}",
                MIN_POLL_INTERVAL.as_secs(),
                MAX_POLL_INTERVAL.as_secs()
            )));
        }
        if self.live.cache_ttl_secs >= self.live.poll_interval_secs {
            return Err(ConfigError::Invalid(format!(
                "live.cache_ttl_secs ({}) must be shorter than live.poll_interval_secs ({})",
                self.live.cache_ttl_secs, self.live.poll_interval_secs
            )));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Invalid("upstream.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// The route catalog, parsed.
    pub fn catalog(&self) -> Result<Vec<RouteNo>, ConfigError> {
        Ok(self
            .routes
            .iter()
            .map(|r| RouteNo::parse(r))
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Build settings for the whole catalog.
    pub fn build_config(&self) -> Result<BuildConfig, ConfigError> {
        Ok(BuildConfig::new(self.catalog()?, self.upstream.base_url.clone())
            .with_delay(self.graph.delay()))
    }
}

//! Recorded upstream responses for testing without the portal.
//!
//! Loads route data envelopes from JSON files and serves them as if they
//! were live responses. File names carry the route-direction key:
//!
//! - `33_0.json`: route data for route 33, direction 0 (stops, optionally
//!   with `busInfo` and coordinates)
//! - `33_0.route-type-0.json`: live response for one candidate variant,
//!   overriding `33_0.json` for that variant only
//! - `33_0.traffic.json`: traffic list envelope

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::domain::{RouteKey, TrafficSegment};
use crate::live::{CandidateStrategy, LiveSnapshot, SnapshotStop};

use super::convert::{
    LocatedStation, convert_live, convert_route_stops, convert_traffic,
};
use super::error::UpstreamError;
use super::source::{LiveSource, LocationSource, RouteSource};
use super::types::{Envelope, RouteData, TrafficItem};

const TRAFFIC_SUFFIX: &str = "traffic";

#[derive(Debug, Default)]
struct Recorded {
    routes: HashMap<RouteKey, RouteData>,
    variants: HashMap<(RouteKey, String), RouteData>,
    traffic: HashMap<RouteKey, Vec<TrafficItem>>,
}

/// Upstream stand-in that serves data from JSON files.
#[derive(Debug, Clone, Default)]
pub struct MockUpstream {
    data: Arc<Recorded>,
}

fn read_envelope<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, UpstreamError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| UpstreamError::Mock(format!("failed to read {}: {e}", path.display())))?;
    let envelope: Envelope<T> = serde_json::from_str(&json)
        .map_err(|e| UpstreamError::Mock(format!("failed to parse {}: {e}", path.display())))?;
    Ok(envelope.data)
}

impl MockUpstream {
    /// Load every `*.json` file in `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, UpstreamError> {
        let data_dir = data_dir.as_ref();
        let mut recorded = Recorded::default();

        let entries = std::fs::read_dir(data_dir).map_err(|e| {
            UpstreamError::Mock(format!(
                "failed to read mock data directory {}: {e}",
                data_dir.display()
            ))
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| UpstreamError::Mock(format!("failed to read directory entry: {e}")))?
                .path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| UpstreamError::Mock(format!("invalid filename: {}", path.display())))?;

            let (key_part, suffix) = match stem.split_once('.') {
                Some((key, suffix)) => (key, Some(suffix)),
                None => (stem, None),
            };

            let key: RouteKey = key_part.parse().map_err(|_| {
                UpstreamError::Mock(format!("invalid route key in filename: {stem}"))
            })?;

            match suffix {
                None => {
                    let data = read_envelope::<RouteData>(&path)?.unwrap_or_default();
                    recorded.routes.insert(key, data);
                }
                Some(TRAFFIC_SUFFIX) => {
                    let items = read_envelope::<Vec<TrafficItem>>(&path)?.unwrap_or_default();
                    recorded.traffic.insert(key, items);
                }
                Some(variant) => {
                    let data = read_envelope::<RouteData>(&path)?.unwrap_or_default();
                    recorded.variants.insert((key, variant.to_string()), data);
                }
            }
        }

        if recorded.routes.is_empty() && recorded.variants.is_empty() {
            return Err(UpstreamError::Mock(format!(
                "no route files found in {}",
                data_dir.display()
            )));
        }

        Ok(Self {
            data: Arc::new(recorded),
        })
    }

    /// Route-directions with recorded data, sorted.
    pub fn route_keys(&self) -> Vec<RouteKey> {
        let mut keys: Vec<RouteKey> = self.data.routes.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn live_data(&self, key: &RouteKey, variant: &str) -> Option<&RouteData> {
        self.data
            .variants
            .get(&(key.clone(), variant.to_string()))
            .or_else(|| self.data.routes.get(key))
    }
}

impl RouteSource for MockUpstream {
    async fn fetch_route(&self, key: &RouteKey) -> Result<Vec<SnapshotStop>, UpstreamError> {
        Ok(self
            .data
            .routes
            .get(key)
            .map(convert_route_stops)
            .unwrap_or_default())
    }
}

impl LocationSource for MockUpstream {
    /// Derived from the coordinates carried by the recorded route data.
    async fn fetch_locations(&self, key: &RouteKey) -> Result<Vec<LocatedStation>, UpstreamError> {
        let stops = self.fetch_route(key).await?;
        Ok(stops
            .into_iter()
            .filter_map(|stop| {
                stop.coordinate.map(|coordinate| LocatedStation {
                    code: stop.code,
                    coordinate,
                })
            })
            .collect())
    }
}

impl LiveSource for MockUpstream {
    async fn fetch_live(
        &self,
        key: &RouteKey,
        strategy: &dyn CandidateStrategy,
    ) -> Result<Option<Arc<LiveSnapshot>>, UpstreamError> {
        let variant = strategy.name();
        let snapshot = self
            .live_data(key, variant)
            .map(|data| Arc::new(convert_live(key, variant, data)));
        debug!(route = %key, variant, found = snapshot.is_some(), "mock live fetch");
        Ok(snapshot)
    }

    async fn fetch_traffic(&self, key: &RouteKey) -> Result<Vec<TrafficSegment>, UpstreamError> {
        Ok(self
            .data
            .traffic
            .get(key)
            .map(|items| convert_traffic(items))
            .unwrap_or_default())
    }
}

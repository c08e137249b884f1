//! Static network graph: stops, route-directions, and the links between them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Coordinate, Direction, RouteKey, RouteNo};
use crate::live::SnapshotStop;
use crate::resolve::StopResolver;

use super::error::GraphError;

/// Most stops a name search returns.
pub const STOP_SEARCH_LIMIT: usize = 20;

/// A physical stop, keyed by its canonical station code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    #[serde(rename = "id")]
    pub code: String,

    /// First name seen for this code.
    pub name: String,

    /// Route-directions serving this stop, in first-seen order, no duplicates.
    pub routes: Vec<RouteKey>,

    /// Missing for stops the location endpoint never reported.
    #[serde(flatten)]
    pub coordinate: Option<Coordinate>,

    /// Secondary code other sources use for this stop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Stop {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            routes: Vec::new(),
            coordinate: None,
            alias: None,
        }
    }

    pub fn is_served_by(&self, key: &RouteKey) -> bool {
        self.routes.contains(key)
    }
}

/// One traversal direction of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDirection {
    pub id: RouteKey,
    pub base_route: RouteNo,
    pub direction: Direction,

    /// Stop codes in traversal order. Loop routes may repeat a code.
    pub stops: Vec<String>,
}

impl RouteDirection {
    pub fn new(id: RouteKey) -> Self {
        Self {
            base_route: id.route.clone(),
            direction: id.direction,
            id,
            stops: Vec::new(),
        }
    }
}

/// Artifact metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMeta {
    pub generated_at: DateTime<Utc>,
    /// Base URL the graph was scraped from.
    pub source: String,
    pub stop_count: usize,
    /// Number of route-directions.
    pub route_count: usize,
}

/// The stop/route graph produced by the builder.
///
/// Read-only once loaded; live components share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkGraph {
    #[serde(rename = "_meta")]
    pub meta: GraphMeta,
    pub stops: BTreeMap<String, Stop>,
    pub routes: BTreeMap<RouteKey, RouteDirection>,
}

impl NetworkGraph {
    /// An empty graph stamped with the current time.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            meta: GraphMeta {
                generated_at: Utc::now(),
                source: source.into(),
                stop_count: 0,
                route_count: 0,
            },
            stops: BTreeMap::new(),
            routes: BTreeMap::new(),
        }
    }

    /// Fold one route-direction scrape into the graph.
    ///
    /// Stops with an empty code are skipped. Returns the number of stops
    /// appended to the route's sequence; an empty scrape creates nothing.
    pub fn record_route(&mut self, key: &RouteKey, stops: &[SnapshotStop]) -> usize {
        let stops: Vec<&SnapshotStop> = stops.iter().filter(|s| !s.code.trim().is_empty()).collect();
        if stops.is_empty() {
            return 0;
        }

        let route = self
            .routes
            .entry(key.clone())
            .or_insert_with(|| RouteDirection::new(key.clone()));

        for scraped in &stops {
            let code = scraped.code.trim();
            let stop = self
                .stops
                .entry(code.to_string())
                .or_insert_with(|| Stop::new(code, scraped.name.trim()));

            if !stop.is_served_by(key) {
                stop.routes.push(key.clone());
            }
            if stop.coordinate.is_none() {
                stop.coordinate = scraped.coordinate;
            }

            route.stops.push(code.to_string());
        }

        stops.len()
    }

    /// Recompute counts and stamp the generation time.
    pub fn refresh_meta(&mut self, generated_at: DateTime<Utc>) {
        self.meta.generated_at = generated_at;
        self.meta.stop_count = self.stops.len();
        self.meta.route_count = self.routes.len();
    }

    pub fn stop(&self, code: &str) -> Option<&Stop> {
        self.stops.get(code)
    }

    pub fn route(&self, key: &RouteKey) -> Option<&RouteDirection> {
        self.routes.get(key)
    }

    /// Index stops for code resolution, in code order.
    pub fn resolver(&self) -> StopResolver<String> {
        let mut resolver = StopResolver::new();
        for stop in self.stops.values() {
            resolver.insert(&stop.code, stop.alias.as_deref(), stop.code.clone());
        }
        resolver
    }

    /// Number of stops with a known coordinate.
    pub fn located_stop_count(&self) -> usize {
        self.stops.values().filter(|s| s.coordinate.is_some()).count()
    }

    /// Route-directions whose route number contains `query`, ignoring case.
    ///
    /// A blank query matches every route-direction.
    pub fn search_routes(&self, query: &str) -> Vec<&RouteDirection> {
        let needle = query.trim().to_lowercase();
        self.routes
            .values()
            .filter(|r| r.base_route.as_str().to_lowercase().contains(&needle))
            .collect()
    }

    /// Stops whose name contains `query`, ignoring case, in code order.
    ///
    /// A blank query matches nothing.
    pub fn search_stops(&self, query: &str, limit: usize) -> Vec<&Stop> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.stops
            .values()
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .take(limit)
            .collect()
    }

    /// Check that every stop lists exactly the routes whose sequence contains it.
    pub fn check_consistency(&self) -> Result<(), GraphError> {
        for stop in self.stops.values() {
            for key in &stop.routes {
                let listed = self
                    .routes
                    .get(key)
                    .is_some_and(|r| r.stops.iter().any(|c| c == &stop.code));
                if !listed {
                    return Err(GraphError::Inconsistent(format!(
                        "stop {} lists {key} but the route does not visit it",
                        stop.code
                    )));
                }
            }
        }

        for route in self.routes.values() {
            for code in &route.stops {
                let serving = self
                    .stops
                    .get(code)
                    .is_some_and(|s| s.is_served_by(&route.id));
                if !serving {
                    return Err(GraphError::Inconsistent(format!(
                        "route {} visits {code} but the stop does not list it",
                        route.id
                    )));
                }
            }
        }

        if self.meta.stop_count != self.stops.len() || self.meta.route_count != self.routes.len() {
            return Err(GraphError::Inconsistent("metadata counts are stale".to_string()));
        }

        Ok(())
    }
}

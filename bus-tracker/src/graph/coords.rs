//! Coordinate backfill.
//!
//! The route data endpoint rarely carries coordinates, so after a build the
//! location endpoint is scraped for every catalog route and its positions are
//! written onto matching graph stops. The location list often omits the pole
//! suffix (`T304` for both `T304/1` and `T304/2`), in which case every stop
//! sharing that base is updated.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::{Direction, RouteKey, RouteNo};
use crate::upstream::LocationSource;

use super::builder::DEFAULT_DELAY;
use super::model::NetworkGraph;

/// Coordinates closer than this, in degrees, are considered unchanged.
pub const COORDINATE_TOLERANCE: f64 = 1e-6;

/// Counts from one backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub routes: usize,
    /// Location rows received across all directions.
    pub locations: usize,
    /// Rows that matched no graph stop.
    pub unmatched: usize,
    /// Distinct stops whose coordinate was set or changed.
    pub updated: BTreeSet<String>,
    pub failures: usize,
}

impl BackfillReport {
    pub fn updated_count(&self) -> usize {
        self.updated.len()
    }
}

/// Writes upstream station coordinates onto graph stops.
#[derive(Debug, Clone)]
pub struct CoordinateBackfill {
    routes: Vec<RouteNo>,
    delay: Duration,
}

impl CoordinateBackfill {
    pub fn new(routes: Vec<RouteNo>) -> Self {
        Self {
            routes,
            delay: DEFAULT_DELAY,
        }
    }

    /// Set the inter-request delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fetch locations for every route-direction and update `graph` in place.
    pub async fn run<S: LocationSource>(&self, graph: &mut NetworkGraph, source: &S) -> BackfillReport {
        let resolver = graph.resolver();
        let mut report = BackfillReport::default();

        for route in &self.routes {
            report.routes += 1;

            for direction in Direction::BOTH {
                let key = RouteKey::new(route.clone(), direction);
                let result = source.fetch_locations(&key).await;
                tokio::time::sleep(self.delay).await;

                let located = match result {
                    Ok(located) => located,
                    Err(e) => {
                        warn!(route = %key, error = %e, "location fetch failed, skipping");
                        report.failures += 1;
                        continue;
                    }
                };
                report.locations += located.len();

                for station in located {
                    let Some((kind, codes)) = resolver.resolve_all(&station.code) else {
                        debug!(route = %key, code = %station.code, "location matches no stop");
                        report.unmatched += 1;
                        continue;
                    };

                    for code in codes {
                        let Some(stop) = graph.stops.get_mut(code) else {
                            continue;
                        };
                        let unchanged = stop
                            .coordinate
                            .is_some_and(|c| c.approx_eq(&station.coordinate, COORDINATE_TOLERANCE));
                        if !unchanged {
                            debug!(stop = %code, from = %station.code, ?kind, "coordinate updated");
                            stop.coordinate = Some(station.coordinate);
                            report.updated.insert(code.clone());
                        }
                    }
                }
            }
        }

        info!(
            routes = report.routes,
            updated = report.updated_count(),
            unmatched = report.unmatched,
            "coordinate backfill finished"
        );
        report
    }
}

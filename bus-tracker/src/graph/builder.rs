//! Offline graph construction.
//!
//! Scrapes both directions of every catalog route, one request at a time,
//! with a fixed pause after each call. Many routes only run one way, so an
//! empty or failed direction is skipped rather than aborting the build.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::{Direction, RouteKey, RouteNo};
use crate::upstream::RouteSource;

use super::model::NetworkGraph;

/// Default pause after every upstream call.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

/// Configuration for a graph build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Routes to scrape, in order.
    pub routes: Vec<RouteNo>,
    /// Pause after every upstream call.
    pub delay: Duration,
    /// Recorded in the artifact metadata.
    pub source_url: String,
}

impl BuildConfig {
    pub fn new(routes: Vec<RouteNo>, source_url: impl Into<String>) -> Self {
        Self {
            routes,
            delay: DEFAULT_DELAY,
            source_url: source_url.into(),
        }
    }

    /// Set the inter-request delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Counts from one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub routes: usize,
    /// Directions that returned at least one stop.
    pub directions_fetched: usize,
    /// Directions that returned nothing.
    pub directions_empty: usize,
    /// Directions whose fetch failed.
    pub failures: usize,
}

/// Builds a [`NetworkGraph`] from a [`RouteSource`].
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    config: BuildConfig,
}

impl GraphBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Scrape every configured route and fold the results into a graph.
    pub async fn build<S: RouteSource>(&self, source: &S) -> (NetworkGraph, BuildReport) {
        let mut graph = NetworkGraph::new(self.config.source_url.clone());
        let mut report = BuildReport::default();

        info!(routes = self.config.routes.len(), "building network graph");

        for route in &self.config.routes {
            report.routes += 1;

            for direction in Direction::BOTH {
                let key = RouteKey::new(route.clone(), direction);
                let result = source.fetch_route(&key).await;
                tokio::time::sleep(self.config.delay).await;

                match result {
                    Ok(stops) if stops.is_empty() => {
                        debug!(route = %key, "direction has no stops");
                        report.directions_empty += 1;
                    }
                    Ok(stops) => {
                        let added = graph.record_route(&key, &stops);
                        debug!(route = %key, stops = added, "direction recorded");
                        if added == 0 {
                            report.directions_empty += 1;
                        } else {
                            report.directions_fetched += 1;
                        }
                    }
                    Err(e) => {
                        warn!(route = %key, error = %e, "route fetch failed, skipping");
                        report.failures += 1;
                    }
                }
            }
        }

        graph.refresh_meta(Utc::now());
        info!(
            stops = graph.meta.stop_count,
            route_directions = graph.meta.route_count,
            failures = report.failures,
            "graph built"
        );

        (graph, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::SnapshotStop;
    use crate::upstream::UpstreamError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory route source.
    #[derive(Default)]
    struct FakeRoutes {
        routes: HashMap<String, Vec<SnapshotStop>>,
        failing: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRoutes {
        fn with(mut self, key: &str, codes: &[&str]) -> Self {
            self.routes.insert(
                key.to_string(),
                codes.iter().map(|c| SnapshotStop::new(*c, format!("Stop {c}"))).collect(),
            );
            self
        }

        fn failing(mut self, key: &str) -> Self {
            self.failing.push(key.to_string());
            self
        }
    }

    impl RouteSource for FakeRoutes {
        async fn fetch_route(&self, key: &RouteKey) -> Result<Vec<SnapshotStop>, UpstreamError> {
            let id = key.to_string();
            self.calls.lock().unwrap().push(id.clone());
            if self.failing.contains(&id) {
                return Err(UpstreamError::Api {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(self.routes.get(&id).cloned().unwrap_or_default())
        }
    }

    fn routes(names: &[&str]) -> Vec<RouteNo> {
        names.iter().map(|r| RouteNo::parse(r).unwrap()).collect()
    }

    fn builder(names: &[&str]) -> GraphBuilder {
        GraphBuilder::new(BuildConfig::new(routes(names), "test").with_delay(Duration::ZERO))
    }

    #[tokio::test]
    async fn builds_both_directions() {
        let source = FakeRoutes::default()
            .with("33_0", &["M1", "M2", "M3"])
            .with("33_1", &["M3", "M2", "M1"])
            .with("22_0", &["M2", "C1"]);

        let (graph, report) = builder(&["33", "22"]).build(&source).await;

        assert_eq!(
            report,
            BuildReport {
                routes: 2,
                directions_fetched: 3,
                directions_empty: 1,
                failures: 0
            }
        );
        assert_eq!(graph.meta.route_count, 3);
        assert_eq!(graph.meta.stop_count, 4);
        assert_eq!(graph.stop("M2").unwrap().routes.len(), 3);
        assert!(graph.check_consistency().is_ok());
        assert_eq!(
            *source.calls.lock().unwrap(),
            ["33_0", "33_1", "22_0", "22_1"]
        );
    }

    #[tokio::test]
    async fn failed_direction_is_skipped() {
        let source = FakeRoutes::default()
            .with("33_0", &["M1", "M2"])
            .failing("33_1")
            .with("3_0", &["M9"]);

        let (graph, report) = builder(&["33", "3"]).build(&source).await;

        assert_eq!(report.failures, 1);
        assert_eq!(report.directions_fetched, 2);
        assert!(graph.route(&"33_1".parse().unwrap()).is_none());
        assert!(graph.route(&"3_0".parse().unwrap()).is_some());
    }

    #[tokio::test]
    async fn empty_catalog() {
        let (graph, report) = builder(&[]).build(&FakeRoutes::default()).await;
        assert_eq!(report, BuildReport::default());
        assert!(graph.stops.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_follows_every_call() {
        let source = FakeRoutes::default().with("33_0", &["M1"]);
        let builder = GraphBuilder::new(
            BuildConfig::new(routes(&["33", "22"]), "test").with_delay(Duration::from_millis(200)),
        );

        let start = tokio::time::Instant::now();
        builder.build(&source).await;
        assert!(start.elapsed() >= Duration::from_millis(800));
    }
}

//! Live candidate selection.
//!
//! The live bus endpoint takes a `routeType` parameter whose correct value
//! for a given route is not documented. A wrong value returns either stale
//! positions or an empty route, not an error. So each poll asks for every
//! configured variant concurrently and keeps the response that looks most
//! alive: the target stop must resolve in it, and among those the one with
//! the most vehicles wins.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::domain::RouteKey;
use crate::resolve::{MatchKind, Resolution};
use crate::upstream::{LiveSource, UpstreamError};

use super::snapshot::LiveSnapshot;

/// Default `routeType` values tried, in priority order.
pub const DEFAULT_ROUTE_TYPES: [&str; 2] = ["2", "0"];

/// One way of asking the live endpoint for a route.
///
/// Strategies contribute extra request parameters; the client places them
/// after `lang` and before `device`.
pub trait CandidateStrategy: Send + Sync {
    /// Stable name, recorded on snapshots and in logs.
    fn name(&self) -> &str;

    fn extra_params(&self) -> Vec<(String, String)>;
}

/// Ask with a specific `routeType` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTypeStrategy {
    name: String,
    value: String,
}

impl RouteTypeStrategy {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: format!("route-type-{value}"),
            value,
        }
    }
}

impl CandidateStrategy for RouteTypeStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn extra_params(&self) -> Vec<(String, String)> {
        vec![("routeType".to_string(), self.value.clone())]
    }
}

/// Strategies for a list of `routeType` values.
pub fn route_type_strategies<I, V>(values: I) -> Vec<Arc<dyn CandidateStrategy>>
where
    I: IntoIterator<Item = V>,
    V: Into<String>,
{
    values
        .into_iter()
        .map(|v| Arc::new(RouteTypeStrategy::new(v)) as Arc<dyn CandidateStrategy>)
        .collect()
}

/// A snapshot in which the target stop was found.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub snapshot: Arc<LiveSnapshot>,
    /// Position of the target stop in `snapshot.stops`.
    pub target_index: usize,
    /// How the target code matched the snapshot's own code.
    pub match_kind: MatchKind,
}

impl Candidate {
    /// The route-direction the snapshot belongs to. May be the opposite of
    /// the one requested.
    pub fn route(&self) -> &RouteKey {
        &self.snapshot.route
    }
}

/// Why no candidate was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoServiceReason {
    /// No variant returned any stops in either direction.
    NoData,
    /// Stops came back, but none of them is the target.
    StopNotOnRoute,
    /// Every request failed, so nothing is known.
    FetchFailed,
}

/// Outcome of a selection. Absence of service is not an error.
#[derive(Debug, Clone)]
pub enum Selection {
    Found(Candidate),
    NoService(NoServiceReason),
}

impl Selection {
    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            Selection::Found(c) => Some(c),
            Selection::NoService(_) => None,
        }
    }
}

/// Result of searching one direction.
enum DirectionOutcome {
    Found(Candidate),
    NotOnRoute,
    NoData,
    Failed,
}

/// Arbitrates between request variants.
#[derive(Clone)]
pub struct CandidateSelector {
    strategies: Vec<Arc<dyn CandidateStrategy>>,
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::new(route_type_strategies(DEFAULT_ROUTE_TYPES))
    }
}

impl std::fmt::Debug for CandidateSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("CandidateSelector")
            .field("strategies", &names)
            .finish()
    }
}

impl CandidateSelector {
    pub fn new(strategies: Vec<Arc<dyn CandidateStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[Arc<dyn CandidateStrategy>] {
        &self.strategies
    }

    /// Find the best live snapshot containing `target` on `key`, falling
    /// back to the opposite direction.
    pub async fn select<S: LiveSource>(&self, source: &S, key: &RouteKey, target: &str) -> Selection {
        let mut saw_data = false;
        let mut failed = false;

        for attempt in [key.clone(), key.opposite()] {
            match self.search_direction(source, &attempt, target).await {
                DirectionOutcome::Found(candidate) => {
                    if &attempt != key {
                        debug!(requested = %key, used = %attempt, target, "target found in opposite direction");
                    }
                    return Selection::Found(candidate);
                }
                DirectionOutcome::NotOnRoute => saw_data = true,
                DirectionOutcome::Failed => failed = true,
                DirectionOutcome::NoData => {}
            }
        }

        let reason = if saw_data {
            NoServiceReason::StopNotOnRoute
        } else if failed {
            NoServiceReason::FetchFailed
        } else {
            NoServiceReason::NoData
        };
        debug!(route = %key, target, ?reason, "no live candidate");
        Selection::NoService(reason)
    }

    /// Best live snapshot for a whole route-direction, with no target stop.
    ///
    /// The requested direction only; a route timeline in the opposite
    /// direction would list the stops the wrong way round.
    pub async fn select_route<S: LiveSource>(
        &self,
        source: &S,
        key: &RouteKey,
    ) -> Result<Arc<LiveSnapshot>, NoServiceReason> {
        let results = self.fetch_variants(source, key).await;

        let mut best: Option<Arc<LiveSnapshot>> = None;
        let mut failures = 0;

        for (strategy, result) in self.strategies.iter().zip(results) {
            match result {
                Ok(Some(snapshot)) if !snapshot.stops.is_empty() => {
                    let better = best
                        .as_ref()
                        .is_none_or(|b| snapshot.active_vehicle_count() > b.active_vehicle_count());
                    if better {
                        best = Some(snapshot);
                    }
                }
                Ok(_) => debug!(route = %key, variant = strategy.name(), "variant returned no stops"),
                Err(e) => {
                    warn!(route = %key, variant = strategy.name(), error = %e, "live fetch failed");
                    failures += 1;
                }
            }
        }

        match best {
            Some(snapshot) => Ok(snapshot),
            None if failures > 0 && failures == self.strategies.len() => {
                Err(NoServiceReason::FetchFailed)
            }
            None => Err(NoServiceReason::NoData),
        }
    }

    /// Fetch every strategy's variant concurrently, in strategy order.
    async fn fetch_variants<S: LiveSource>(
        &self,
        source: &S,
        key: &RouteKey,
    ) -> Vec<Result<Option<Arc<LiveSnapshot>>, UpstreamError>> {
        join_all(
            self.strategies
                .iter()
                .map(|strategy| source.fetch_live(key, strategy.as_ref())),
        )
        .await
    }

    /// Try every strategy concurrently for one direction.
    async fn search_direction<S: LiveSource>(
        &self,
        source: &S,
        key: &RouteKey,
        target: &str,
    ) -> DirectionOutcome {
        let results = self.fetch_variants(source, key).await;

        let mut best: Option<Candidate> = None;
        let mut saw_data = false;
        let mut failures = 0;

        for (strategy, result) in self.strategies.iter().zip(results) {
            let snapshot = match result {
                Ok(Some(snapshot)) if !snapshot.stops.is_empty() => snapshot,
                Ok(_) => {
                    debug!(route = %key, variant = strategy.name(), "variant returned no stops");
                    continue;
                }
                Err(e) => {
                    warn!(route = %key, variant = strategy.name(), error = %e, "live fetch failed");
                    failures += 1;
                    continue;
                }
            };
            saw_data = true;

            let Resolution::Resolved { key: index, kind } = snapshot.locate(target) else {
                debug!(route = %key, variant = strategy.name(), target, "target not in variant");
                continue;
            };

            let vehicles = snapshot.active_vehicle_count();
            debug!(route = %key, variant = strategy.name(), vehicles, index, "candidate");

            // Strictly greater, so ties keep the earlier strategy.
            let better = best
                .as_ref()
                .is_none_or(|b| vehicles > b.snapshot.active_vehicle_count());
            if better {
                best = Some(Candidate {
                    snapshot,
                    target_index: index,
                    match_kind: kind,
                });
            }
        }

        match best {
            Some(candidate) => DirectionOutcome::Found(candidate),
            None if saw_data => DirectionOutcome::NotOnRoute,
            None if failures > 0 && failures == self.strategies.len() => DirectionOutcome::Failed,
            None => DirectionOutcome::NoData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrafficSegment;
    use crate::live::{LiveVehicle, SnapshotStop, VehicleStatus};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn vehicle(idx: usize) -> LiveVehicle {
        LiveVehicle {
            plate: format!("MX-{idx}"),
            status: VehicleStatus::InTransit,
            speed_kmh: None,
            passenger_flow: None,
            accessible: false,
            bus_type: None,
            stop_index: idx,
        }
    }

    fn snapshot(key: &str, codes: &[&str], vehicles: &[usize]) -> LiveSnapshot {
        LiveSnapshot::new(
            key.parse().unwrap(),
            "fake",
            codes.iter().map(|c| SnapshotStop::new(*c, *c)).collect(),
            vehicles.iter().map(|i| vehicle(*i)).collect(),
        )
    }

    enum Reply {
        Snapshot(LiveSnapshot),
        Fail,
    }

    /// Fake keyed by (route key, strategy name).
    #[derive(Default)]
    struct FakeLive {
        replies: HashMap<(String, String), Reply>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl FakeLive {
        fn with(mut self, key: &str, variant: &str, reply: Reply) -> Self {
            self.replies.insert((key.to_string(), variant.to_string()), reply);
            self
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl LiveSource for FakeLive {
        async fn fetch_live(
            &self,
            key: &RouteKey,
            strategy: &dyn CandidateStrategy,
        ) -> Result<Option<Arc<LiveSnapshot>>, UpstreamError> {
            let id = (key.to_string(), strategy.name().to_string());
            self.calls.lock().unwrap().push(id.clone());
            match self.replies.get(&id) {
                Some(Reply::Snapshot(s)) => Ok(Some(Arc::new(s.clone()))),
                Some(Reply::Fail) => Err(UpstreamError::Api {
                    status: 500,
                    message: "boom".into(),
                }),
                None => Ok(None),
            }
        }

        async fn fetch_traffic(&self, _key: &RouteKey) -> Result<Vec<TrafficSegment>, UpstreamError> {
            Ok(Vec::new())
        }
    }

    const A: &str = "route-type-2";
    const B: &str = "route-type-0";

    fn key(s: &str) -> RouteKey {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn picks_variant_with_most_vehicles() {
        let fake = FakeLive::default()
            .with("33_0", A, Reply::Snapshot(snapshot("33_0", &["M1", "M2", "M3"], &[0])))
            .with("33_0", B, Reply::Snapshot(snapshot("33_0", &["M1", "M2", "M3"], &[0, 1])));

        let selection = CandidateSelector::default()
            .select(&fake, &key("33_0"), "M3")
            .await;
        let candidate = selection.candidate().unwrap();
        assert_eq!(candidate.snapshot.active_vehicle_count(), 2);
        assert_eq!(candidate.target_index, 2);
        assert_eq!(candidate.match_kind, MatchKind::Exact);
    }

    #[tokio::test]
    async fn tie_goes_to_first_strategy() {
        let mut first = snapshot("33_0", &["M1", "M2"], &[0]);
        first.variant = A.to_string();
        let mut second = snapshot("33_0", &["M1", "M2"], &[1]);
        second.variant = B.to_string();

        let fake = FakeLive::default()
            .with("33_0", A, Reply::Snapshot(first))
            .with("33_0", B, Reply::Snapshot(second));

        let selection = CandidateSelector::default()
            .select(&fake, &key("33_0"), "M2")
            .await;
        assert_eq!(selection.candidate().unwrap().snapshot.variant, A);
    }

    #[tokio::test]
    async fn variant_without_target_loses_even_with_more_vehicles() {
        let fake = FakeLive::default()
            .with("33_0", A, Reply::Snapshot(snapshot("33_0", &["X1", "X2"], &[0, 0, 1])))
            .with("33_0", B, Reply::Snapshot(snapshot("33_0", &["M1", "M2/1"], &[])));

        let selection = CandidateSelector::default()
            .select(&fake, &key("33_0"), "m2_1")
            .await;
        let candidate = selection.candidate().unwrap();
        assert_eq!(candidate.target_index, 1);
        assert_eq!(candidate.snapshot.active_vehicle_count(), 0);
    }

    #[tokio::test]
    async fn failed_variant_is_skipped() {
        let fake = FakeLive::default()
            .with("33_0", A, Reply::Fail)
            .with("33_0", B, Reply::Snapshot(snapshot("33_0", &["M1"], &[0])));

        let selection = CandidateSelector::default()
            .select(&fake, &key("33_0"), "M1")
            .await;
        assert!(selection.candidate().is_some());
        // Both asked once, no retry.
        assert_eq!(fake.calls().len(), 2);
    }

    #[tokio::test]
    async fn falls_back_to_opposite_direction() {
        let fake = FakeLive::default()
            .with("33_0", A, Reply::Snapshot(snapshot("33_0", &["M1", "M2"], &[0])))
            .with("33_1", B, Reply::Snapshot(snapshot("33_1", &["M9", "M8"], &[0])));

        let selection = CandidateSelector::default()
            .select(&fake, &key("33_0"), "M8")
            .await;
        let candidate = selection.candidate().unwrap();
        assert_eq!(candidate.route(), &key("33_1"));
        assert_eq!(candidate.target_index, 1);
        assert_eq!(fake.calls().len(), 4);
    }

    #[tokio::test]
    async fn no_service_reasons() {
        let empty = FakeLive::default();
        let selection = CandidateSelector::default()
            .select(&empty, &key("33_0"), "M1")
            .await;
        assert!(matches!(selection, Selection::NoService(NoServiceReason::NoData)));

        let broken = FakeLive::default()
            .with("33_0", A, Reply::Fail)
            .with("33_0", B, Reply::Fail);
        let selection = CandidateSelector::default()
            .select(&broken, &key("33_0"), "M1")
            .await;
        assert!(matches!(selection, Selection::NoService(NoServiceReason::FetchFailed)));

        let elsewhere = FakeLive::default()
            .with("33_0", A, Reply::Snapshot(snapshot("33_0", &["M1"], &[0])));
        let selection = CandidateSelector::default()
            .select(&elsewhere, &key("33_0"), "Z9")
            .await;
        assert!(matches!(
            selection,
            Selection::NoService(NoServiceReason::StopNotOnRoute)
        ));
    }

    #[tokio::test]
    async fn route_selection_ignores_targets_and_direction() {
        let fake = FakeLive::default()
            .with("33_0", A, Reply::Snapshot(snapshot("33_0", &["M1", "M2"], &[0])))
            .with("33_0", B, Reply::Snapshot(snapshot("33_0", &["M1", "M2"], &[0, 1])))
            .with("33_1", A, Reply::Snapshot(snapshot("33_1", &["M2", "M1"], &[0, 0, 1])));

        let selector = CandidateSelector::default();
        let snapshot = selector.select_route(&fake, &key("33_0")).await.unwrap();
        assert_eq!(snapshot.route, key("33_0"));
        assert_eq!(snapshot.active_vehicle_count(), 2);
        assert_eq!(fake.calls().len(), 2);

        let broken = FakeLive::default()
            .with("22_0", A, Reply::Fail)
            .with("22_0", B, Reply::Fail);
        assert_eq!(
            selector.select_route(&broken, &key("22_0")).await.unwrap_err(),
            NoServiceReason::FetchFailed
        );
        assert_eq!(
            selector.select_route(&FakeLive::default(), &key("22_0")).await.unwrap_err(),
            NoServiceReason::NoData
        );
    }

    #[test]
    fn route_type_params() {
        let s = RouteTypeStrategy::new("2");
        assert_eq!(s.name(), "route-type-2");
        assert_eq!(
            s.extra_params(),
            vec![("routeType".to_string(), "2".to_string())]
        );
    }
}

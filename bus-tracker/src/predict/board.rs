//! Per-stop arrival boards.
//!
//! A board answers "what is coming to this stop": for every route-direction
//! the static graph says serves the stop, select a live snapshot, align
//! traffic, and predict. Each route is summarised with a status so a
//! consumer can tell "wrong station" apart from "no buses running".

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::RouteKey;
use crate::graph::{NetworkGraph, Stop};
use crate::live::{CandidateSelector, LiveSnapshot, NoServiceReason, Selection};
use crate::resolve::{MatchKind, StopResolver};
use crate::upstream::LiveSource;

use super::eta::{ArrivalPrediction, PredictionStatus, Predictor};
use super::timeline::RouteTimeline;
use super::traffic::TrafficProfile;

/// A bus this many stops away (or closer) is reported as arriving.
pub const ARRIVING_STOPS: usize = 1;

/// Summary of one route-direction at a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteStatus {
    /// A bus is at the stop or one stop away.
    Arriving,
    /// A bus is on its way.
    Active,
    /// Buses are running, all past this stop.
    NoApproaching,
    /// Nothing is running.
    NoService,
    /// Live data failed or the stop could not be matched.
    Unknown,
}

impl From<NoServiceReason> for RouteStatus {
    fn from(reason: NoServiceReason) -> Self {
        match reason {
            NoServiceReason::NoData => RouteStatus::NoService,
            NoServiceReason::StopNotOnRoute | NoServiceReason::FetchFailed => RouteStatus::Unknown,
        }
    }
}

/// Errors building a board.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// The code matches no stop in the graph
    #[error("unknown stop: {0}")]
    UnknownStop(String),

    /// The stop exists but the given route does not serve it
    #[error("route {route} does not serve stop {stop}")]
    NotServed { route: RouteKey, stop: String },

    /// The graph has no such route-direction
    #[error("unknown route: {0}")]
    UnknownRoute(RouteKey),
}

/// Live arrivals for one route-direction at a stop.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteArrivals {
    /// The route-direction asked about.
    pub route: RouteKey,
    /// Where the live data came from, when it was the opposite direction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_by: Option<RouteKey>,
    pub status: RouteStatus,
    /// Why there is no prediction, for `no-service` and `unknown`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<NoServiceReason>,
    /// Name of the final stop.
    pub destination: Option<String>,
    /// Position of the stop in the live snapshot.
    pub stop_index: Option<usize>,
    pub total_stops: usize,
    pub match_kind: Option<MatchKind>,
    pub min_eta_minutes: Option<u32>,
    pub min_stops_away: Option<usize>,
    /// Every approaching bus, nearest first.
    pub predictions: Vec<ArrivalPrediction>,
}

impl RouteArrivals {
    fn no_service(route: RouteKey, reason: NoServiceReason) -> Self {
        Self {
            route,
            served_by: None,
            status: RouteStatus::from(reason),
            reason: Some(reason),
            destination: None,
            stop_index: None,
            total_stops: 0,
            match_kind: None,
            min_eta_minutes: None,
            min_stops_away: None,
            predictions: Vec::new(),
        }
    }
}

/// Arrivals for every route serving one stop.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalBoard {
    pub stop: String,
    pub name: String,
    pub generated_at: DateTime<Utc>,
    pub routes: Vec<RouteArrivals>,
}

/// Status from the authoritative (nearest) prediction.
fn route_status(nearest: &ArrivalPrediction) -> RouteStatus {
    match nearest.status {
        PredictionStatus::Arrived => RouteStatus::Arriving,
        PredictionStatus::Approaching => match nearest.stops_away {
            Some(n) if n <= ARRIVING_STOPS => RouteStatus::Arriving,
            _ => RouteStatus::Active,
        },
        PredictionStatus::NoApproachingVehicle => RouteStatus::NoApproaching,
        PredictionStatus::NoActiveService => RouteStatus::NoService,
        PredictionStatus::Unknown => RouteStatus::Unknown,
    }
}

/// Live arrival tracking over a static graph.
pub struct Tracker<S> {
    graph: Arc<NetworkGraph>,
    resolver: StopResolver<String>,
    selector: CandidateSelector,
    predictor: Predictor,
    source: S,
}

impl<S: LiveSource> Tracker<S> {
    pub fn new(
        graph: Arc<NetworkGraph>,
        source: S,
        selector: CandidateSelector,
        predictor: Predictor,
    ) -> Self {
        let resolver = graph.resolver();
        Self {
            graph,
            resolver,
            selector,
            predictor,
            source,
        }
    }

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Find a graph stop by any spelling of its code.
    pub fn find_stop(&self, code: &str) -> Option<&Stop> {
        self.resolver
            .resolve(code)
            .key()
            .and_then(|canonical| self.graph.stop(canonical))
    }

    /// Fill stop coordinates the live response left out from the graph.
    fn with_graph_coordinates(&self, snapshot: &Arc<LiveSnapshot>) -> Arc<LiveSnapshot> {
        if snapshot.stops.iter().all(|s| s.coordinate.is_some()) {
            return Arc::clone(snapshot);
        }

        let mut filled = LiveSnapshot::clone(snapshot);
        for stop in filled.stops.iter_mut().filter(|s| s.coordinate.is_none()) {
            stop.coordinate = self.find_stop(&stop.code).and_then(|s| s.coordinate);
        }
        Arc::new(filled)
    }

    /// Traffic aligned to `snapshot`, or all unknown when the fetch fails.
    async fn traffic_for(&self, key: &RouteKey, snapshot: &LiveSnapshot) -> TrafficProfile {
        match self.source.fetch_traffic(key).await {
            Ok(segments) => TrafficProfile::align(snapshot, &segments),
            Err(e) => {
                warn!(route = %key, error = %e, "traffic fetch failed, assuming unknown");
                TrafficProfile::default()
            }
        }
    }

    /// Live arrivals at `stop_code` for one route-direction.
    pub async fn route_arrivals(&self, key: &RouteKey, stop_code: &str) -> RouteArrivals {
        let candidate = match self.selector.select(&self.source, key, stop_code).await {
            Selection::Found(candidate) => candidate,
            Selection::NoService(reason) => return RouteArrivals::no_service(key.clone(), reason),
        };

        let served_by = candidate.route().clone();
        let snapshot = self.with_graph_coordinates(&candidate.snapshot);

        let traffic = self.traffic_for(&served_by, &snapshot).await;

        let target = candidate.target_index;
        let nearest = self.predictor.predict(&snapshot, target, &traffic);
        let predictions = self.predictor.predict_all(&snapshot, target, &traffic);
        let status = route_status(&nearest);

        debug!(route = %served_by, stop = stop_code, ?status, buses = predictions.len(), "route arrivals");

        RouteArrivals {
            route: key.clone(),
            served_by: (&served_by != key).then_some(served_by),
            status,
            reason: None,
            destination: snapshot.destination().map(str::to_string),
            stop_index: Some(target),
            total_stops: snapshot.stops.len(),
            match_kind: Some(candidate.match_kind),
            min_eta_minutes: predictions.iter().filter_map(|p| p.eta_minutes).min(),
            min_stops_away: predictions.iter().filter_map(|p| p.stops_away).min(),
            predictions,
        }
    }

    /// Arrivals at `code` for one route-direction that the graph says serves it.
    pub async fn arrivals_for(&self, key: &RouteKey, code: &str) -> Result<RouteArrivals, BoardError> {
        let stop = self
            .find_stop(code)
            .ok_or_else(|| BoardError::UnknownStop(code.to_string()))?;
        if !stop.is_served_by(key) && !stop.is_served_by(&key.opposite()) {
            return Err(BoardError::NotServed {
                route: key.clone(),
                stop: stop.code.clone(),
            });
        }
        Ok(self.route_arrivals(key, &stop.code).await)
    }

    /// Every stop of a route-direction with live positions and ETAs.
    ///
    /// Without live data the stops come from the graph with no predictions.
    pub async fn route_timeline(&self, key: &RouteKey) -> Result<RouteTimeline, BoardError> {
        if self.graph.route(key).is_none() {
            return Err(BoardError::UnknownRoute(key.clone()));
        }

        let snapshot = match self.selector.select_route(&self.source, key).await {
            Ok(snapshot) => self.with_graph_coordinates(&snapshot),
            Err(reason) => {
                debug!(route = %key, ?reason, "timeline from graph only");
                return Ok(RouteTimeline::from_graph(&self.graph, key, reason));
            }
        };

        let traffic = self.traffic_for(key, &snapshot).await;
        let timeline = RouteTimeline::from_snapshot(&snapshot, &traffic, &self.predictor);
        debug!(route = %key, buses = timeline.active_vehicles, "route timeline");
        Ok(timeline)
    }

    /// Arrivals at a stop for every route-direction serving it.
    ///
    /// Routes are polled concurrently and reported in the graph's order.
    pub async fn stop_board(&self, code: &str) -> Result<ArrivalBoard, BoardError> {
        let stop = self
            .find_stop(code)
            .ok_or_else(|| BoardError::UnknownStop(code.to_string()))?;

        let routes = join_all(
            stop.routes
                .iter()
                .map(|key| self.route_arrivals(key, &stop.code)),
        )
        .await;

        Ok(ArrivalBoard {
            stop: stop.code.clone(),
            name: stop.name.clone(),
            generated_at: Utc::now(),
            routes,
        })
    }
}

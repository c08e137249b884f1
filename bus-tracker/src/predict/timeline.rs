//! Whole-route timelines.
//!
//! A timeline lays out every stop of one route-direction in order, with the
//! buses standing at each stop, the congestion of the segment leaving it,
//! and the prediction for the nearest bus behind it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Coordinate, RouteKey, TrafficLevel};
use crate::graph::NetworkGraph;
use crate::live::{LiveSnapshot, LiveVehicle, NoServiceReason};

use super::board::RouteStatus;
use super::eta::{ArrivalPrediction, Predictor};
use super::traffic::TrafficProfile;

/// One stop on a route timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStop {
    pub index: usize,
    pub code: String,
    pub name: String,
    pub coordinate: Option<Coordinate>,
    /// Buses at this stop, or between it and the next.
    pub vehicles: Vec<LiveVehicle>,
    /// Congestion of the segment leaving this stop.
    pub traffic: TrafficLevel,
    pub traffic_label: &'static str,
    /// Absent when there is no live data.
    pub prediction: Option<ArrivalPrediction>,
}

/// Every stop of a route-direction with live positions and ETAs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTimeline {
    pub route: RouteKey,
    pub status: RouteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<NoServiceReason>,
    /// Request variant the live data came from.
    pub variant: Option<String>,
    pub destination: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub active_vehicles: usize,
    pub stops: Vec<TimelineStop>,
}

impl RouteTimeline {
    /// Timeline from a live snapshot.
    pub fn from_snapshot(
        snapshot: &LiveSnapshot,
        traffic: &TrafficProfile,
        predictor: &Predictor,
    ) -> Self {
        let stops = snapshot
            .stops
            .iter()
            .enumerate()
            .map(|(index, stop)| {
                let level = traffic.level(index);
                TimelineStop {
                    index,
                    code: stop.code.clone(),
                    name: stop.name.clone(),
                    coordinate: stop.coordinate,
                    vehicles: snapshot.vehicles_at(index).cloned().collect(),
                    traffic: level,
                    traffic_label: level.label(),
                    prediction: Some(predictor.predict(snapshot, index, traffic)),
                }
            })
            .collect();

        let active_vehicles = snapshot.active_vehicle_count();
        Self {
            route: snapshot.route.clone(),
            status: if active_vehicles > 0 {
                RouteStatus::Active
            } else {
                RouteStatus::NoService
            },
            reason: None,
            variant: Some(snapshot.variant.clone()),
            destination: snapshot.destination().map(str::to_string),
            generated_at: Utc::now(),
            active_vehicles,
            stops,
        }
    }

    /// Timeline from the static graph alone, when live data is unavailable.
    pub fn from_graph(graph: &NetworkGraph, key: &RouteKey, reason: NoServiceReason) -> Self {
        let codes = graph.route(key).map(|r| r.stops.as_slice()).unwrap_or_default();
        let stops: Vec<TimelineStop> = codes
            .iter()
            .enumerate()
            .map(|(index, code)| {
                let stop = graph.stop(code);
                TimelineStop {
                    index,
                    code: code.clone(),
                    name: stop.map(|s| s.name.clone()).unwrap_or_default(),
                    coordinate: stop.and_then(|s| s.coordinate),
                    vehicles: Vec::new(),
                    traffic: TrafficLevel::UNKNOWN,
                    traffic_label: TrafficLevel::UNKNOWN.label(),
                    prediction: None,
                }
            })
            .collect();

        Self {
            route: key.clone(),
            status: RouteStatus::from(reason),
            reason: Some(reason),
            variant: None,
            destination: stops.last().map(|s| s.name.clone()),
            generated_at: Utc::now(),
            active_vehicles: 0,
            stops,
        }
    }
}

//! Nearest-stop lookup over the static graph.

use serde::Serialize;

use crate::domain::{Coordinate, RouteKey};
use crate::graph::NetworkGraph;

/// Default number of stops returned.
pub const DEFAULT_NEARBY_LIMIT: usize = 50;

/// A stop and its distance from the query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyStop {
    pub code: String,
    pub name: String,
    pub coordinate: Coordinate,
    pub distance_m: u32,
    pub routes: Vec<RouteKey>,
}

/// Up to `limit` stops closest to `origin`, nearest first.
///
/// Stops without a coordinate are skipped. Equal distances keep code order.
pub fn nearby_stops(graph: &NetworkGraph, origin: Coordinate, limit: usize) -> Vec<NearbyStop> {
    let mut located: Vec<(f64, NearbyStop)> = graph
        .stops
        .values()
        .filter_map(|stop| {
            let coordinate = stop.coordinate?;
            let km = origin.distance_km(&coordinate);
            Some((
                km,
                NearbyStop {
                    code: stop.code.clone(),
                    name: stop.name.clone(),
                    coordinate,
                    distance_m: (km * 1000.0).round() as u32,
                    routes: stop.routes.clone(),
                },
            ))
        })
        .collect();

    located.sort_by(|(a, _), (b, _)| a.total_cmp(b));
    located.into_iter().take(limit).map(|(_, stop)| stop).collect()
}

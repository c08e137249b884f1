//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::domain::{Coordinate, RouteKey};
use crate::graph::{NetworkGraph, RouteDirection, Stop};
use crate::nearby::NearbyStop;

/// Query for stops near a point.
#[derive(Debug, Deserialize)]
pub struct NearbyRequest {
    pub lat: f64,
    pub lon: f64,

    /// Maximum number of stops (defaults to 50)
    pub limit: Option<usize>,
}

/// Stops near a point, nearest first.
#[derive(Debug, Serialize)]
pub struct NearbyResponse {
    pub origin: Coordinate,
    pub stops: Vec<NearbyStop>,
}

/// Query for one route's live data.
#[derive(Debug, Default, Deserialize)]
pub struct LiveRequest {
    /// Station code of the stop to predict for; the whole route when absent
    pub stop: Option<String>,
}

/// Free-text search query.
#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub q: String,
}

/// A route-direction in the catalog.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub route: RouteKey,

    /// Name of the last stop of the route-direction
    pub destination: Option<String>,

    pub stop_count: usize,
}

impl RouteSummary {
    pub fn from_route(route: &RouteDirection, graph: &NetworkGraph) -> Self {
        Self {
            route: route.id.clone(),
            destination: route
                .stops
                .last()
                .and_then(|code| graph.stop(code))
                .map(|s| s.name.clone()),
            stop_count: route.stops.len(),
        }
    }
}

/// A stop matched by name.
#[derive(Debug, Serialize)]
pub struct StopSummary {
    pub code: String,
    pub name: String,
    pub coordinate: Option<Coordinate>,
    pub routes: Vec<RouteKey>,
}

impl From<&Stop> for StopSummary {
    fn from(stop: &Stop) -> Self {
        Self {
            code: stop.code.clone(),
            name: stop.name.clone(),
            coordinate: stop.coordinate,
            routes: stop.routes.clone(),
        }
    }
}

/// A route-direction serving a stop.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServingRoute {
    pub route: RouteKey,

    /// Name of the last stop of the route-direction
    pub destination: Option<String>,

    /// Position of the stop along the route (first occurrence)
    pub position: Option<usize>,

    pub stop_count: usize,
}

/// A stop and the routes that serve it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDetail {
    pub code: String,
    pub name: String,
    pub coordinate: Option<Coordinate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub routes: Vec<ServingRoute>,
}

impl StopDetail {
    /// Describe a graph stop with its serving routes.
    pub fn from_stop(stop: &Stop, graph: &NetworkGraph) -> Self {
        let routes = stop
            .routes
            .iter()
            .map(|key| {
                let sequence = graph.route(key);
                ServingRoute {
                    route: key.clone(),
                    destination: sequence
                        .and_then(|r| r.stops.last())
                        .and_then(|code| graph.stop(code))
                        .map(|s| s.name.clone()),
                    position: sequence.and_then(|r| r.stops.iter().position(|c| *c == stop.code)),
                    stop_count: sequence.map_or(0, |r| r.stops.len()),
                }
            })
            .collect();

        Self {
            code: stop.code.clone(),
            name: stop.name.clone(),
            coordinate: stop.coordinate,
            alias: stop.alias.clone(),
            routes,
        }
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::SnapshotStop;

    #[test]
    fn stop_detail_lists_routes() {
        let mut graph = NetworkGraph::new("test");
        graph.record_route(
            &"33_0".parse().unwrap(),
            &[
                SnapshotStop::new("M1", "Barra"),
                SnapshotStop::new("M2", "Lilau"),
                SnapshotStop::new("M3", "Terminal"),
            ],
        );
        graph.record_route(
            &"22_1".parse().unwrap(),
            &[SnapshotStop::new("M2", "Lilau"), SnapshotStop::new("X9", "Airport")],
        );

        let detail = StopDetail::from_stop(graph.stop("M2").unwrap(), &graph);
        assert_eq!(detail.routes.len(), 2);
        assert_eq!(detail.routes[0].destination.as_deref(), Some("Terminal"));
        assert_eq!(detail.routes[0].position, Some(1));
        assert_eq!(detail.routes[1].position, Some(0));
        assert_eq!(detail.routes[1].stop_count, 2);

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["routes"][1]["route"], "22_1");
        assert!(json.get("alias").is_none());
    }

    #[test]
    fn route_summary_names_destination() {
        let mut graph = NetworkGraph::new("test");
        let key = "33_0".parse().unwrap();
        graph.record_route(
            &key,
            &[SnapshotStop::new("M1", "Barra"), SnapshotStop::new("M3", "Terminal")],
        );

        let summary = RouteSummary::from_route(graph.route(&key).unwrap(), &graph);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["route"], "33_0");
        assert_eq!(json["destination"], "Terminal");
        assert_eq!(json["stopCount"], 2);
    }

    #[test]
    fn live_request_stop_is_optional() {
        let req: LiveRequest = serde_json::from_str("{}").unwrap();
        assert!(req.stop.is_none());
        let req: SearchRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.q, "");
    }
}

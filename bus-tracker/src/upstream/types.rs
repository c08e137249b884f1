//! Upstream response DTOs.
//!
//! These map the JSON the upstream portal returns. The service is loose about
//! types (numbers arrive as strings or numbers, empty lists as `null`) so
//! every field is optional and scalar fields that vary are kept as
//! [`serde_json::Value`] until conversion.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Common response envelope: the payload lives under `data`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub data: Option<T>,

    /// Some endpoints report a status header alongside the payload.
    #[serde(default)]
    pub header: Option<Value>,
}

/// Payload of the route data and live bus endpoints.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteData {
    /// Stops in traversal order, each with any buses currently there.
    pub route_info: Option<Vec<RouteStation>>,
}

/// One stop on a route, as reported by the route data endpoints.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStation {
    /// Station code, e.g. `"T308/1"`.
    pub sta_code: Option<String>,

    /// Station display name.
    pub sta_name: Option<String>,

    /// Road or lane the pole is on.
    pub lane_name: Option<String>,

    /// Vehicles at or just past this stop.
    pub bus_info: Option<Vec<BusInfo>>,

    /// Present on some responses; string or number.
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,
}

/// A vehicle attached to a stop in a live response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusInfo {
    pub bus_plate: Option<String>,

    /// `"1"` at the station, `"0"` travelling to the next one.
    pub status: Option<Value>,

    /// km/h, string or number.
    pub speed: Option<Value>,

    /// Passenger count; `-1` when unknown.
    pub passenger_flow: Option<Value>,

    /// `"1"` when the bus is wheelchair accessible.
    pub is_facilities: Option<Value>,

    /// `"1"` large, `"2"` medium, `"3"` small.
    pub bus_type: Option<Value>,
}

/// Payload of the station location endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    pub station_info_list: Option<Vec<StationLocation>>,
}

/// A station and its coordinates.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationLocation {
    pub station_code: Option<String>,
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,
}

/// One traffic segment. The endpoint returns a bare list of these.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficItem {
    pub station_code: Option<String>,

    /// Congestion tier 0 to 4, string or number.
    pub traffic: Option<Value>,
}

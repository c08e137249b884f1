//! Conversion from upstream DTOs to domain types.
//!
//! Conversion is lenient: a stop without a code or a bus without a plate is
//! skipped with a log line rather than failing the whole response, since one
//! bad row should not hide the rest of the route.

use serde_json::Value;
use tracing::debug;

use crate::domain::{Coordinate, RouteKey, TrafficLevel, TrafficSegment};
use crate::live::{BusType, LiveSnapshot, LiveVehicle, SnapshotStop, VehicleStatus};

use super::types::{BusInfo, LocationData, RouteData, RouteStation, TrafficItem};

/// A station code with coordinates from the location endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedStation {
    pub code: String,
    pub coordinate: Coordinate,
}

/// Read a loosely-typed scalar as a trimmed string.
pub(crate) fn value_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coordinate_of(lat: Option<&Value>, lon: Option<&Value>) -> Option<Coordinate> {
    let lat = value_f64(lat?)?;
    let lon = value_f64(lon?)?;
    Coordinate::new(lat, lon).ok()
}

fn convert_station(station: &RouteStation) -> Option<SnapshotStop> {
    let code = station.sta_code.as_deref().map(str::trim).unwrap_or("");
    if code.is_empty() {
        return None;
    }

    Some(SnapshotStop {
        code: code.to_string(),
        name: station
            .sta_name
            .as_deref()
            .map(str::trim)
            .unwrap_or(code)
            .to_string(),
        lane: station
            .lane_name
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string),
        coordinate: coordinate_of(station.latitude.as_ref(), station.longitude.as_ref()),
    })
}

fn convert_bus(bus: &BusInfo, stop_index: usize) -> Option<LiveVehicle> {
    let plate = bus.bus_plate.as_deref().map(str::trim).unwrap_or("");
    if plate.is_empty() {
        return None;
    }

    let flag = |v: &Option<Value>| v.as_ref().and_then(value_str);

    Some(LiveVehicle {
        plate: plate.to_string(),
        status: flag(&bus.status)
            .map(|s| VehicleStatus::from_flag(&s))
            .unwrap_or(VehicleStatus::InTransit),
        speed_kmh: bus.speed.as_ref().and_then(value_f64),
        passenger_flow: bus
            .passenger_flow
            .as_ref()
            .and_then(value_i64)
            .and_then(|n| u32::try_from(n).ok()),
        accessible: flag(&bus.is_facilities).as_deref() == Some("1"),
        bus_type: flag(&bus.bus_type).and_then(|s| BusType::from_flag(&s)),
        stop_index,
    })
}

/// Stop sequence of a route-direction, ignoring any vehicles.
pub fn convert_route_stops(data: &RouteData) -> Vec<SnapshotStop> {
    data.route_info
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter_map(convert_station)
        .collect()
}

/// Convert a live bus response into a snapshot.
///
/// Vehicle indices refer to positions in the converted stop list, so a
/// skipped stop does not shift vehicles onto the wrong station.
pub fn convert_live(route: &RouteKey, variant: &str, data: &RouteData) -> LiveSnapshot {
    let mut stops = Vec::new();
    let mut vehicles = Vec::new();

    for station in data.route_info.as_deref().unwrap_or(&[]) {
        let Some(stop) = convert_station(station) else {
            debug!(route = %route, "skipping station without code");
            continue;
        };
        let index = stops.len();
        stops.push(stop);

        for bus in station.bus_info.as_deref().unwrap_or(&[]) {
            match convert_bus(bus, index) {
                Some(vehicle) => vehicles.push(vehicle),
                None => debug!(route = %route, index, "skipping bus without plate"),
            }
        }
    }

    LiveSnapshot::new(route.clone(), variant, stops, vehicles)
}

/// Station coordinates from the location endpoint. Unparseable rows are dropped.
pub fn convert_locations(data: &LocationData) -> Vec<LocatedStation> {
    data.station_info_list
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter_map(|s| {
            let code = s.station_code.as_deref()?.trim();
            if code.is_empty() {
                return None;
            }
            let coordinate = coordinate_of(s.latitude.as_ref(), s.longitude.as_ref())?;
            Some(LocatedStation {
                code: code.to_string(),
                coordinate,
            })
        })
        .collect()
}

/// Traffic segments in upstream order. Missing levels become unknown.
pub fn convert_traffic(items: &[TrafficItem]) -> Vec<TrafficSegment> {
    items
        .iter()
        .map(|item| TrafficSegment {
            station_code: item
                .station_code
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .to_string(),
            level: item
                .traffic
                .as_ref()
                .and_then(value_i64)
                .map(TrafficLevel::from_raw)
                .unwrap_or(TrafficLevel::UNKNOWN),
        })
        .collect()
}

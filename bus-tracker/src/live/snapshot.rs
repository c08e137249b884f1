//! Live route-direction snapshots.
//!
//! A snapshot is one polling response: the stop order for a route-direction
//! plus the vehicles currently on it. Snapshots are never persisted; each poll
//! cycle fetches, predicts from, and drops its own.

use serde::Serialize;

use crate::domain::{Coordinate, RouteKey};
use crate::resolve::{Resolution, StopResolver};

/// Where a vehicle is relative to its stop index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleStatus {
    /// Standing at the stop.
    AtStop,
    /// Left the stop, travelling towards the next one.
    InTransit,
}

impl VehicleStatus {
    /// Upstream encodes at-stop as `"1"`; anything else is in transit.
    pub fn from_flag(flag: &str) -> Self {
        if flag.trim() == "1" {
            VehicleStatus::AtStop
        } else {
            VehicleStatus::InTransit
        }
    }
}

/// Physical size class of a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    Large,
    Medium,
    Small,
}

impl BusType {
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag.trim() {
            "1" => Some(BusType::Large),
            "2" => Some(BusType::Medium),
            "3" => Some(BusType::Small),
            _ => None,
        }
    }
}

/// A vehicle reported in a live snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveVehicle {
    /// Licence plate.
    pub plate: String,
    pub status: VehicleStatus,
    /// Speed in km/h, if reported.
    pub speed_kmh: Option<f64>,
    /// Passenger count, if the bus reports one.
    pub passenger_flow: Option<u32>,
    pub accessible: bool,
    pub bus_type: Option<BusType>,
    /// Index into the snapshot's stop list.
    pub stop_index: usize,
}

/// One stop in a snapshot, in traversal order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStop {
    /// Station code exactly as the live endpoint spelled it.
    pub code: String,
    pub name: String,
    pub lane: Option<String>,
    pub coordinate: Option<Coordinate>,
}

impl SnapshotStop {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            lane: None,
            coordinate: None,
        }
    }

    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }
}

/// One live response for a route-direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub route: RouteKey,
    /// Name of the request variant that produced this snapshot.
    pub variant: String,
    pub stops: Vec<SnapshotStop>,
    /// Vehicles ordered by stop index.
    pub vehicles: Vec<LiveVehicle>,
}

impl LiveSnapshot {
    /// Create a snapshot, sorting vehicles by stop index.
    ///
    /// Vehicles pointing past the end of the stop list are dropped.
    pub fn new(
        route: RouteKey,
        variant: impl Into<String>,
        stops: Vec<SnapshotStop>,
        mut vehicles: Vec<LiveVehicle>,
    ) -> Self {
        vehicles.retain(|v| v.stop_index < stops.len());
        vehicles.sort_by_key(|v| v.stop_index);
        Self {
            route,
            variant: variant.into(),
            stops,
            vehicles,
        }
    }

    /// Number of vehicles anywhere on the route-direction.
    pub fn active_vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Vehicles at a given stop index.
    pub fn vehicles_at(&self, index: usize) -> impl Iterator<Item = &LiveVehicle> {
        self.vehicles.iter().filter(move |v| v.stop_index == index)
    }

    /// Index this snapshot's stops by position for code resolution.
    pub fn resolver(&self) -> StopResolver<usize> {
        self.stops.iter().map(|s| s.code.as_str()).collect()
    }

    /// Find the position of `code` in this snapshot.
    pub fn locate(&self, code: &str) -> Resolution<usize> {
        self.resolver().resolve(code)
    }

    /// Name of the final stop, used as the destination label.
    pub fn destination(&self) -> Option<&str> {
        self.stops.last().map(|s| s.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::MatchKind;

    fn vehicle(plate: &str, idx: usize) -> LiveVehicle {
        LiveVehicle {
            plate: plate.to_string(),
            status: VehicleStatus::InTransit,
            speed_kmh: None,
            passenger_flow: None,
            accessible: false,
            bus_type: None,
            stop_index: idx,
        }
    }

    fn snapshot(vehicles: Vec<LiveVehicle>) -> LiveSnapshot {
        LiveSnapshot::new(
            "33_0".parse().unwrap(),
            "test",
            vec![
                SnapshotStop::new("M1/1", "Barra"),
                SnapshotStop::new("M2", "Lilau"),
                SnapshotStop::new("M3-2", "Terminal"),
            ],
            vehicles,
        )
    }

    #[test]
    fn vehicles_sorted_and_bounded() {
        let snap = snapshot(vec![vehicle("B", 2), vehicle("A", 0), vehicle("X", 7)]);
        assert_eq!(snap.active_vehicle_count(), 2);
        assert_eq!(snap.vehicles[0].plate, "A");
        assert_eq!(snap.vehicles[1].plate, "B");
        assert_eq!(snap.vehicles_at(2).count(), 1);
    }

    #[test]
    fn locate_uses_code_rules() {
        let snap = snapshot(vec![]);
        assert_eq!(snap.locate("M3/2").key(), Some(&2));
        assert_eq!(snap.locate("m1_1").kind(), Some(MatchKind::Exact));
        assert_eq!(snap.locate("M1").kind(), Some(MatchKind::Base));
        assert!(!snap.locate("Z9").is_resolved());
        assert_eq!(snap.destination(), Some("Terminal"));
    }

    #[test]
    fn status_flags() {
        assert_eq!(VehicleStatus::from_flag("1"), VehicleStatus::AtStop);
        assert_eq!(VehicleStatus::from_flag("0"), VehicleStatus::InTransit);
        assert_eq!(BusType::from_flag("2"), Some(BusType::Medium));
        assert_eq!(BusType::from_flag("9"), None);
    }
}

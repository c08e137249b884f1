//! Arrival estimates from a live snapshot.
//!
//! The nearest approaching bus is the one with the greatest stop index at or
//! before the target. Its ETA is travel time along each segment between it
//! and the target, scaled by that segment's congestion, plus a fixed dwell
//! at every stop strictly between the two. The stop the bus occupies and the
//! target itself carry no dwell.

use serde::Serialize;

use crate::live::{LiveSnapshot, LiveVehicle};

use super::config::PredictConfig;
use super::traffic::TrafficProfile;

/// Classification of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PredictionStatus {
    /// A bus is at the target stop.
    Arrived,
    /// A bus is on its way; `eta_minutes` is set.
    Approaching,
    /// Buses are running, but all of them are past the target.
    NoApproachingVehicle,
    /// The route-direction has no buses at all.
    NoActiveService,
    /// The target index is not part of the snapshot.
    Unknown,
}

/// Derived arrival estimate. Never stored; recomputed from each snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalPrediction {
    pub target_index: usize,
    pub status: PredictionStatus,
    /// The bus this prediction is for.
    pub vehicle: Option<LiveVehicle>,
    /// Whole minutes, only when approaching.
    pub eta_minutes: Option<u32>,
    pub stops_away: Option<usize>,
    /// Along-route distance in metres over segments with known coordinates.
    pub distance_m: Option<u32>,
}

impl ArrivalPrediction {
    fn without_vehicle(target_index: usize, status: PredictionStatus) -> Self {
        Self {
            target_index,
            status,
            vehicle: None,
            eta_minutes: None,
            stops_away: None,
            distance_m: None,
        }
    }
}

/// Unrounded estimate between two stop indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathEstimate {
    pub travel_minutes: f64,
    pub dwell_minutes: f64,
    pub distance_km: f64,
}

impl PathEstimate {
    pub fn total_minutes(&self) -> f64 {
        self.travel_minutes + self.dwell_minutes
    }
}

/// Computes arrival predictions.
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    config: PredictConfig,
}

impl Predictor {
    pub fn new(config: PredictConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PredictConfig {
        &self.config
    }

    /// Travel and dwell between stop `from` and stop `to` (`from <= to`).
    ///
    /// Segments with a missing coordinate at either end contribute nothing.
    pub fn estimate_path(
        &self,
        snapshot: &LiveSnapshot,
        from: usize,
        to: usize,
        traffic: &TrafficProfile,
    ) -> PathEstimate {
        let mut travel_minutes = 0.0;
        let mut distance_km = 0.0;

        for j in from..to {
            let (Some(a), Some(b)) = (
                snapshot.stops.get(j).and_then(|s| s.coordinate),
                snapshot.stops.get(j + 1).and_then(|s| s.coordinate),
            ) else {
                continue;
            };
            let km = a.distance_km(&b);
            distance_km += km;
            travel_minutes +=
                km * self.config.pace_min_per_km * self.config.multiplier(traffic.level(j));
        }

        let between = to.saturating_sub(from).saturating_sub(1);
        PathEstimate {
            travel_minutes,
            dwell_minutes: between as f64 * self.config.dwell_min_per_stop,
            distance_km,
        }
    }

    /// Prediction for one specific bus.
    fn predict_vehicle(
        &self,
        snapshot: &LiveSnapshot,
        vehicle: &LiveVehicle,
        target: usize,
        traffic: &TrafficProfile,
    ) -> ArrivalPrediction {
        let from = vehicle.stop_index;
        let estimate = self.estimate_path(snapshot, from, target, traffic);
        let distance_m = Some((estimate.distance_km * 1000.0).round() as u32);

        if from == target {
            return ArrivalPrediction {
                target_index: target,
                status: PredictionStatus::Arrived,
                vehicle: Some(vehicle.clone()),
                eta_minutes: None,
                stops_away: Some(0),
                distance_m,
            };
        }

        // f64::round rounds half away from zero.
        let minutes = estimate.total_minutes().round().max(0.0) as u32;

        ArrivalPrediction {
            target_index: target,
            status: PredictionStatus::Approaching,
            vehicle: Some(vehicle.clone()),
            eta_minutes: Some(minutes.max(self.config.min_eta_mins)),
            stops_away: Some(target - from),
            distance_m,
        }
    }

    /// Prediction from the nearest approaching bus.
    pub fn predict(
        &self,
        snapshot: &LiveSnapshot,
        target: usize,
        traffic: &TrafficProfile,
    ) -> ArrivalPrediction {
        if target >= snapshot.stops.len() {
            return ArrivalPrediction::without_vehicle(target, PredictionStatus::Unknown);
        }
        if snapshot.vehicles.is_empty() {
            return ArrivalPrediction::without_vehicle(target, PredictionStatus::NoActiveService);
        }

        let nearest = snapshot
            .vehicles
            .iter()
            .filter(|v| v.stop_index <= target)
            .max_by_key(|v| v.stop_index);

        match nearest {
            Some(vehicle) => self.predict_vehicle(snapshot, vehicle, target, traffic),
            None => ArrivalPrediction::without_vehicle(target, PredictionStatus::NoApproachingVehicle),
        }
    }

    /// Independent predictions for every approaching bus, nearest first.
    pub fn predict_all(
        &self,
        snapshot: &LiveSnapshot,
        target: usize,
        traffic: &TrafficProfile,
    ) -> Vec<ArrivalPrediction> {
        if target >= snapshot.stops.len() {
            return Vec::new();
        }

        let mut approaching: Vec<&LiveVehicle> = snapshot
            .vehicles
            .iter()
            .filter(|v| v.stop_index <= target)
            .collect();
        approaching.sort_by_key(|v| std::cmp::Reverse(v.stop_index));

        approaching
            .into_iter()
            .map(|v| self.predict_vehicle(snapshot, v, target, traffic))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::domain::{Coordinate, EARTH_RADIUS_KM};
    use crate::live::{LiveSnapshot, LiveVehicle, SnapshotStop, VehicleStatus};

    /// Degrees of latitude spanning exactly one kilometre.
    pub fn one_km_lat() -> f64 {
        (1.0 / EARTH_RADIUS_KM).to_degrees()
    }

    pub fn vehicle(plate: &str, idx: usize) -> LiveVehicle {
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

    /// `n` stops due north of each other, `km` apart.
    pub fn line(n: usize, km: f64, vehicles: Vec<LiveVehicle>) -> LiveSnapshot {
        let stops = (0..n)
            .map(|i| {
                SnapshotStop::new(format!("S{i}"), format!("Stop {i}")).with_coordinate(Coordinate {
                    lat: 22.1 + i as f64 * km * one_km_lat(),
                    lon: 113.55,
                })
            })
            .collect();
        LiveSnapshot::new("33_0".parse().unwrap(), "test", stops, vehicles)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{line, vehicle};
    use super::*;
    use crate::domain::TrafficLevel;

    fn smooth(n: usize) -> TrafficProfile {
        TrafficProfile::uniform(TrafficLevel::SMOOTH, n)
    }

    #[test]
    fn three_stops_all_smooth() {
        let snap = line(3, 1.0, vec![vehicle("A", 0)]);
        let p = Predictor::default().predict(&snap, 2, &smooth(3));

        assert_eq!(p.status, PredictionStatus::Approaching);
        assert_eq!(p.eta_minutes, Some(4));
        assert_eq!(p.stops_away, Some(2));
        assert_eq!(p.distance_m, Some(2000));
        assert_eq!(p.vehicle.unwrap().plate, "A");
    }

    #[test]
    fn exact_minutes_before_rounding() {
        let snap = line(3, 1.0, vec![vehicle("A", 0)]);
        let est = Predictor::default().estimate_path(&snap, 0, 2, &smooth(3));
        assert!((est.travel_minutes - 3.0).abs() < 1e-9);
        assert_eq!(est.dwell_minutes, 0.75);
    }

    #[test]
    fn severe_final_segment() {
        let snap = line(3, 1.0, vec![vehicle("A", 0)]);
        let mut traffic = smooth(3);
        traffic.set(1, TrafficLevel::SEVERE);

        let p = Predictor::default().predict(&snap, 2, &traffic);
        assert_eq!(p.eta_minutes, Some(5));
    }

    #[test]
    fn vehicle_at_target_has_arrived() {
        let snap = line(3, 1.0, vec![vehicle("A", 2)]);
        let p = Predictor::default().predict(&snap, 2, &smooth(3));

        assert_eq!(p.status, PredictionStatus::Arrived);
        assert_eq!(p.eta_minutes, None);
        assert_eq!(p.stops_away, Some(0));
    }

    #[test]
    fn adjacent_stop_has_no_dwell_and_minimum_one_minute() {
        let snap = line(2, 0.1, vec![vehicle("A", 0)]);
        let est = Predictor::default().estimate_path(&snap, 0, 1, &smooth(2));
        assert_eq!(est.dwell_minutes, 0.0);

        let p = Predictor::default().predict(&snap, 1, &smooth(2));
        assert_eq!(p.eta_minutes, Some(1));
    }

    #[test]
    fn nearest_vehicle_wins() {
        let snap = line(5, 1.0, vec![vehicle("far", 0), vehicle("near", 2), vehicle("past", 4)]);
        let p = Predictor::default().predict(&snap, 3, &smooth(5));
        assert_eq!(p.vehicle.unwrap().plate, "near");
        assert_eq!(p.stops_away, Some(1));
    }

    #[test]
    fn all_vehicles_past_target() {
        let snap = line(4, 1.0, vec![vehicle("A", 3)]);
        let p = Predictor::default().predict(&snap, 1, &smooth(4));
        assert_eq!(p.status, PredictionStatus::NoApproachingVehicle);
        assert!(p.vehicle.is_none());
    }

    #[test]
    fn empty_route_has_no_service() {
        let snap = line(4, 1.0, vec![]);
        let p = Predictor::default().predict(&snap, 1, &smooth(4));
        assert_eq!(p.status, PredictionStatus::NoActiveService);
    }

    #[test]
    fn target_out_of_range_is_unknown() {
        let snap = line(2, 1.0, vec![vehicle("A", 0)]);
        let p = Predictor::default().predict(&snap, 9, &smooth(2));
        assert_eq!(p.status, PredictionStatus::Unknown);
        assert!(Predictor::default().predict_all(&snap, 9, &smooth(2)).is_empty());
    }

    #[test]
    fn missing_coordinates_contribute_zero() {
        let mut snap = line(3, 1.0, vec![vehicle("A", 0)]);
        snap.stops[1].coordinate = None;
        let p = Predictor::default().predict(&snap, 2, &smooth(3));

        // Only the dwell at stop 1 remains.
        assert_eq!(p.eta_minutes, Some(1));
        assert_eq!(p.distance_m, Some(0));
    }

    #[test]
    fn predict_all_is_nearest_first() {
        let snap = line(5, 1.0, vec![vehicle("A", 0), vehicle("B", 3), vehicle("C", 4)]);
        let all = Predictor::default().predict_all(&snap, 3, &smooth(5));

        let plates: Vec<_> = all
            .iter()
            .map(|p| p.vehicle.as_ref().unwrap().plate.as_str())
            .collect();
        assert_eq!(plates, ["B", "A"]);
        assert_eq!(all[0].status, PredictionStatus::Arrived);
        assert_eq!(all[1].status, PredictionStatus::Approaching);
    }

    #[test]
    fn serializes_status_in_kebab_case() {
        let json = serde_json::to_value(PredictionStatus::NoApproachingVehicle).unwrap();
        assert_eq!(json, "no-approaching-vehicle");
    }
}

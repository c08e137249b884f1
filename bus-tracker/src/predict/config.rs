//! Prediction constants.

use serde::{Deserialize, Serialize};

use crate::domain::TrafficLevel;

/// Tuning for arrival estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictConfig {
    /// Base travel pace (minutes per kilometre).
    pub pace_min_per_km: f64,

    /// Time spent at each stop between the bus and the target (minutes).
    pub dwell_min_per_stop: f64,

    /// Multiplier for a moderate segment.
    pub moderate_multiplier: f64,

    /// Multiplier for congested or severe segments.
    pub congested_multiplier: f64,

    /// Smallest ETA reported for a bus that has not yet arrived (minutes).
    pub min_eta_mins: u32,
}

impl PredictConfig {
    /// Travel time multiplier for a segment's congestion level.
    pub fn multiplier(&self, level: TrafficLevel) -> f64 {
        if level >= TrafficLevel::CONGESTED {
            self.congested_multiplier
        } else if level == TrafficLevel::MODERATE {
            self.moderate_multiplier
        } else {
            1.0
        }
    }
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            pace_min_per_km: 1.5,
            dwell_min_per_stop: 0.75,
            moderate_multiplier: 1.5,
            congested_multiplier: 2.0,
            min_eta_mins: 1,
        }
    }
}

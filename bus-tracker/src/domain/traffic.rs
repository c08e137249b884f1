//! Road congestion tiers.

use serde::{Deserialize, Serialize};

/// Ordinal congestion classification of a road segment.
///
/// `0` unknown, `1` smooth, `2` moderate, `3` congested, `4` severe.
/// Upstream values above 4 are clamped to severe, negatives to unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrafficLevel(u8);

impl TrafficLevel {
    pub const UNKNOWN: TrafficLevel = TrafficLevel(0);
    pub const SMOOTH: TrafficLevel = TrafficLevel(1);
    pub const MODERATE: TrafficLevel = TrafficLevel(2);
    pub const CONGESTED: TrafficLevel = TrafficLevel(3);
    pub const SEVERE: TrafficLevel = TrafficLevel(4);

    /// Build a level from a raw upstream value.
    pub fn from_raw(raw: i64) -> Self {
        TrafficLevel(raw.clamp(0, 4) as u8)
    }

    /// The ordinal value, 0 to 4.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Short label for display and logs.
    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "smooth",
            2 => "moderate",
            3 => "congested",
            4 => "severe",
            _ => "unknown",
        }
    }
}

/// Congestion reported for the road segment leaving a station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSegment {
    /// Station code at the start of the segment, as reported upstream.
    pub station_code: String,
    pub level: TrafficLevel,
}

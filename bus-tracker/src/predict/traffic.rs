//! Per-segment congestion aligned to a snapshot's stops.

use crate::domain::{TrafficLevel, TrafficSegment};
use crate::live::LiveSnapshot;
use crate::resolve::StopResolver;

/// Congestion of the segment leaving each stop of a snapshot.
///
/// Index `j` is the level of the segment from stop `j` to stop `j + 1`.
/// Stops without traffic data are [`TrafficLevel::UNKNOWN`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficProfile {
    levels: Vec<TrafficLevel>,
}

impl TrafficProfile {
    /// A profile from levels already in stop order.
    pub fn from_levels(levels: Vec<TrafficLevel>) -> Self {
        Self { levels }
    }

    /// Every segment at the same level.
    pub fn uniform(level: TrafficLevel, stops: usize) -> Self {
        Self {
            levels: vec![level; stops],
        }
    }

    /// Align upstream segments to the snapshot's stops.
    ///
    /// Segments are matched by station code (exact, then base code). A stop
    /// that matches nothing takes the segment at the same position, but only
    /// when that segment carries no code of its own.
    pub fn align(snapshot: &LiveSnapshot, segments: &[TrafficSegment]) -> Self {
        let by_code: StopResolver<usize> =
            segments.iter().map(|s| s.station_code.as_str()).collect();

        let levels = snapshot
            .stops
            .iter()
            .enumerate()
            .map(|(idx, stop)| {
                if let Some(&seg) = by_code.resolve(&stop.code).key() {
                    return segments[seg].level;
                }
                match segments.get(idx) {
                    Some(seg) if seg.station_code.trim().is_empty() => seg.level,
                    _ => TrafficLevel::UNKNOWN,
                }
            })
            .collect();

        Self { levels }
    }

    /// Level of the segment leaving stop `index`.
    pub fn level(&self, index: usize) -> TrafficLevel {
        self.levels.get(index).copied().unwrap_or(TrafficLevel::UNKNOWN)
    }

    /// Raise one segment's level.
    pub fn set(&mut self, index: usize, level: TrafficLevel) {
        if index >= self.levels.len() {
            self.levels.resize(index + 1, TrafficLevel::UNKNOWN);
        }
        self.levels[index] = level;
    }

    pub fn levels(&self) -> &[TrafficLevel] {
        &self.levels
    }
}

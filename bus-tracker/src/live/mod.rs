//! Live vehicle positions.
//!
//! Snapshots come from the upstream live endpoint; the selector decides which
//! request variant to trust and the cache shares fetches within a poll cycle.

mod cache;
mod selector;
mod snapshot;

pub use cache::{CacheConfig, CachedLiveSource};
pub use selector::{
    Candidate, CandidateSelector, CandidateStrategy, DEFAULT_ROUTE_TYPES, NoServiceReason,
    RouteTypeStrategy, Selection, route_type_strategies,
};
pub use snapshot::{BusType, LiveSnapshot, LiveVehicle, SnapshotStop, VehicleStatus};

//! Domain types for the bus tracker.
//!
//! Identifiers coming from configuration or upstream payloads are validated
//! at construction time, so code that receives these types can trust them.

mod error;
mod geo;
mod route;
mod traffic;

pub use error::DomainError;
pub use geo::{Coordinate, EARTH_RADIUS_KM, haversine_km};
pub use route::{Direction, RouteKey, RouteNo};
pub use traffic::{TrafficLevel, TrafficSegment};

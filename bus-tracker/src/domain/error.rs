//! Domain error types.
//!
//! These errors represent validation failures for identifiers coming from
//! configuration or upstream payloads. They are distinct from API/IO errors.

/// Domain-level validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Route number failed validation
    #[error("invalid route {route:?}: {reason}")]
    InvalidRoute { route: String, reason: &'static str },

    /// Direction flag was not `0` or `1`
    #[error("invalid direction {0:?}: expected \"0\" or \"1\"")]
    InvalidDirection(String),

    /// Route-direction key was not of the form `ROUTE_DIR`
    #[error("invalid route key {0:?}")]
    InvalidRouteKey(String),

    /// Latitude or longitude out of range
    #[error("invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

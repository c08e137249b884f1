//! JSON API over the tracker.
//!
//! Exposes nearby-stop lookup, stop details, and live arrival boards.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AppState, LiveTracker};

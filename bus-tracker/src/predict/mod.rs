//! Arrival prediction.
//!
//! Turns a live snapshot plus per-segment congestion into ETAs, and builds
//! per-stop boards across every route serving a stop and whole-route
//! timelines.

mod board;
mod config;
mod eta;
mod timeline;
mod traffic;

pub use board::{ARRIVING_STOPS, ArrivalBoard, BoardError, RouteArrivals, RouteStatus, Tracker};
pub use config::PredictConfig;
pub use eta::{ArrivalPrediction, PathEstimate, PredictionStatus, Predictor};
pub use timeline::{RouteTimeline, TimelineStop};
pub use traffic::TrafficProfile;

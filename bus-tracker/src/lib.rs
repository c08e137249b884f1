//! Live bus arrivals for the Macau DSAT network.
//!
//! Scrapes the portal's route data into a static stop graph, then answers
//! "when does the next bus reach this stop" from live vehicle positions,
//! per-segment traffic, and a simple distance-plus-dwell model.

pub mod config;
pub mod domain;
pub mod graph;
pub mod live;
pub mod nearby;
pub mod predict;
pub mod resolve;
pub mod upstream;
pub mod watch;
pub mod web;

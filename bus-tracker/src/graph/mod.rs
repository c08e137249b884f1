//! Static stop/route network.
//!
//! Built offline by scraping every route-direction, optionally enriched with
//! station coordinates, and persisted as a JSON artifact that the live path
//! loads read-only.

mod builder;
mod coords;
mod error;
mod model;
pub mod store;

pub use builder::{BuildConfig, BuildReport, DEFAULT_DELAY, GraphBuilder};
pub use coords::{BackfillReport, COORDINATE_TOLERANCE, CoordinateBackfill};
pub use error::GraphError;
pub use model::{GraphMeta, NetworkGraph, RouteDirection, STOP_SEARCH_LIMIT, Stop};

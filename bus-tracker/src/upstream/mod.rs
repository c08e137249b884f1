//! Client for the transit portal's undocumented API.
//!
//! Key characteristics of the portal:
//! - every request carries a `token` header that embeds the current minute,
//!   so tokens are generated per request and never cached
//! - parameter order is part of the contract (it feeds the token digest)
//! - payloads are loosely typed: numbers arrive as strings, empty lists as
//!   `null`, and an undecodable body means "no data" rather than failure

mod client;
mod convert;
mod error;
mod mock;
mod source;
mod token;
mod types;

pub use client::{DEFAULT_BASE_URL, EndpointPaths, UpstreamClient, UpstreamConfig};
pub use convert::{LocatedStation, convert_live, convert_route_stops};
pub use error::UpstreamError;
pub use mock::MockUpstream;
pub use source::{LiveSource, LocationSource, RouteSource, Upstream};
pub use token::{Clock, FixedClock, LocalClock, OffsetClock, TOKEN_LEN, generate_token, query_string};
pub use types::{BusInfo, Envelope, LocationData, RouteData, RouteStation, TrafficItem};

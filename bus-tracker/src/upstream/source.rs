//! Data source seams.
//!
//! The graph pipeline and the live path talk to the portal through these
//! traits so they can be driven by recorded responses or in-memory fakes.

use std::future::Future;
use std::sync::Arc;

use crate::domain::{RouteKey, TrafficSegment};
use crate::live::{CandidateStrategy, LiveSnapshot, SnapshotStop};

use super::client::UpstreamClient;
use super::convert::LocatedStation;
use super::error::UpstreamError;
use super::mock::MockUpstream;

/// Static stop sequences, used by the graph builder.
pub trait RouteSource: Send + Sync {
    /// Stops of a route-direction in traversal order. Empty if it does not run.
    fn fetch_route(
        &self,
        key: &RouteKey,
    ) -> impl Future<Output = Result<Vec<SnapshotStop>, UpstreamError>> + Send;
}

/// Station coordinates, used by the coordinate backfill.
pub trait LocationSource: Send + Sync {
    fn fetch_locations(
        &self,
        key: &RouteKey,
    ) -> impl Future<Output = Result<Vec<LocatedStation>, UpstreamError>> + Send;
}

/// Live vehicle positions and traffic.
pub trait LiveSource: Send + Sync {
    /// One live snapshot using the strategy's request variant.
    ///
    /// `Ok(None)` means the portal answered but had nothing for this variant.
    fn fetch_live(
        &self,
        key: &RouteKey,
        strategy: &dyn CandidateStrategy,
    ) -> impl Future<Output = Result<Option<Arc<LiveSnapshot>>, UpstreamError>> + Send;

    /// Congestion per segment, in upstream order.
    fn fetch_traffic(
        &self,
        key: &RouteKey,
    ) -> impl Future<Output = Result<Vec<TrafficSegment>, UpstreamError>> + Send;
}

impl RouteSource for UpstreamClient {
    async fn fetch_route(&self, key: &RouteKey) -> Result<Vec<SnapshotStop>, UpstreamError> {
        self.route_stops(key).await
    }
}

impl LocationSource for UpstreamClient {
    async fn fetch_locations(&self, key: &RouteKey) -> Result<Vec<LocatedStation>, UpstreamError> {
        self.locations(key).await
    }
}

impl LiveSource for UpstreamClient {
    async fn fetch_live(
        &self,
        key: &RouteKey,
        strategy: &dyn CandidateStrategy,
    ) -> Result<Option<Arc<LiveSnapshot>>, UpstreamError> {
        let extra = strategy.extra_params();
        let snapshot = self.live_snapshot(key, strategy.name(), &extra).await?;
        Ok(snapshot.map(Arc::new))
    }

    async fn fetch_traffic(&self, key: &RouteKey) -> Result<Vec<TrafficSegment>, UpstreamError> {
        self.traffic(key).await
    }
}

/// Either the live portal or recorded responses, chosen at startup.
#[derive(Debug, Clone)]
pub enum Upstream {
    Http(UpstreamClient),
    Mock(MockUpstream),
}

impl RouteSource for Upstream {
    async fn fetch_route(&self, key: &RouteKey) -> Result<Vec<SnapshotStop>, UpstreamError> {
        match self {
            Upstream::Http(client) => client.fetch_route(key).await,
            Upstream::Mock(mock) => mock.fetch_route(key).await,
        }
    }
}

impl LocationSource for Upstream {
    async fn fetch_locations(&self, key: &RouteKey) -> Result<Vec<LocatedStation>, UpstreamError> {
        match self {
            Upstream::Http(client) => client.fetch_locations(key).await,
            Upstream::Mock(mock) => mock.fetch_locations(key).await,
        }
    }
}

impl LiveSource for Upstream {
    async fn fetch_live(
        &self,
        key: &RouteKey,
        strategy: &dyn CandidateStrategy,
    ) -> Result<Option<Arc<LiveSnapshot>>, UpstreamError> {
        match self {
            Upstream::Http(client) => client.fetch_live(key, strategy).await,
            Upstream::Mock(mock) => mock.fetch_live(key, strategy).await,
        }
    }

    async fn fetch_traffic(&self, key: &RouteKey) -> Result<Vec<TrafficSegment>, UpstreamError> {
        match self {
            Upstream::Http(client) => client.fetch_traffic(key).await,
            Upstream::Mock(mock) => mock.fetch_traffic(key).await,
        }
    }
}

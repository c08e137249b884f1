//! Periodic polling of observed stops and routes.
//!
//! Each observed stop or route gets its own tokio task that rebuilds its
//! board or timeline on a fixed interval and publishes it on a `watch`
//! channel. Dropping the [`Observation`] stops the task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::RouteKey;
use crate::predict::{ArrivalBoard, BoardError, RouteTimeline, Tracker};
use crate::upstream::LiveSource;

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest allowed poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Longest allowed poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(8);

/// Spawns poll loops for observed stops and routes.
pub struct Watcher<S> {
    tracker: Arc<Tracker<S>>,
    interval: Duration,
}

impl<S> Clone for Watcher<S> {
    fn clone(&self) -> Self {
        Self {
            tracker: Arc::clone(&self.tracker),
            interval: self.interval,
        }
    }
}

impl<S: LiveSource + 'static> Watcher<S> {
    pub fn new(tracker: Arc<Tracker<S>>) -> Self {
        Self {
            tracker,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the poll interval, clamped to the allowed range.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling a stop. The first board is built immediately.
    pub fn observe(&self, code: &str) -> Result<Observation<ArrivalBoard>, BoardError> {
        let stop = self
            .tracker
            .find_stop(code)
            .ok_or_else(|| BoardError::UnknownStop(code.to_string()))?
            .code
            .clone();

        info!(stop = %stop, interval_secs = self.interval.as_secs(), "observing stop");

        let tracker = Arc::clone(&self.tracker);
        Ok(self.spawn(stop, move |stop| {
            let tracker = Arc::clone(&tracker);
            async move { tracker.stop_board(&stop).await }
        }))
    }

    /// Start polling a whole route-direction's timeline.
    pub fn observe_route(&self, key: &RouteKey) -> Result<Observation<RouteTimeline>, BoardError> {
        if self.tracker.graph().route(key).is_none() {
            return Err(BoardError::UnknownRoute(key.clone()));
        }

        info!(route = %key, interval_secs = self.interval.as_secs(), "observing route");

        let tracker = Arc::clone(&self.tracker);
        Ok(self.spawn(key.clone(), move |key| {
            let tracker = Arc::clone(&tracker);
            async move { tracker.route_timeline(&key).await }
        }))
    }

    /// Run `refresh` for `subject` every interval, publishing each result.
    fn spawn<K, T, F, Fut>(&self, subject: K, refresh: F) -> Observation<T>
    where
        K: Clone + std::fmt::Display + Send + 'static,
        T: Send + Sync + 'static,
        F: Fn(K) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, BoardError>> + Send,
    {
        let (tx, rx) = watch::channel(None);
        let period = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match refresh(subject.clone()).await {
                    Ok(value) => {
                        if tx.send(Some(Arc::new(value))).is_err() {
                            debug!(subject = %subject, "no observers left");
                            break;
                        }
                    }
                    Err(e) => warn!(subject = %subject, error = %e, "refresh failed"),
                }
            }
        });

        Observation { latest: rx, task }
    }
}

/// A running poll loop. Dropping it cancels the loop.
pub struct Observation<T> {
    latest: watch::Receiver<Option<Arc<T>>>,
    task: JoinHandle<()>,
}

impl<T> Observation<T> {
    /// The most recent value, if one has been built yet.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.latest.borrow().clone()
    }

    /// Wait for the next value.
    ///
    /// Returns `None` once the poll loop has stopped.
    pub async fn next(&mut self) -> Option<Arc<T>> {
        self.latest.changed().await.ok()?;
        self.latest.borrow_and_update().clone()
    }
}

impl<T> Drop for Observation<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrafficSegment;
    use crate::graph::NetworkGraph;
    use crate::live::{CandidateSelector, CandidateStrategy, LiveSnapshot, SnapshotStop};
    use crate::predict::Predictor;
    use crate::upstream::UpstreamError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLive {
        live_calls: AtomicUsize,
    }

    impl LiveSource for CountingLive {
        async fn fetch_live(
            &self,
            key: &RouteKey,
            strategy: &dyn CandidateStrategy,
        ) -> Result<Option<Arc<LiveSnapshot>>, UpstreamError> {
            self.live_calls.fetch_add(1, Ordering::SeqCst);
            if key.to_string() != "33_0" {
                return Ok(None);
            }
            Ok(Some(Arc::new(LiveSnapshot::new(
                key.clone(),
                strategy.name(),
                vec![SnapshotStop::new("M1", "Barra"), SnapshotStop::new("M2", "Lilau")],
                vec![],
            ))))
        }

        async fn fetch_traffic(&self, _key: &RouteKey) -> Result<Vec<TrafficSegment>, UpstreamError> {
            Ok(vec![])
        }
    }

    fn tracker() -> Arc<Tracker<CountingLive>> {
        let mut graph = NetworkGraph::new("test");
        graph.record_route(
            &"33_0".parse().unwrap(),
            &[SnapshotStop::new("M1", "Barra"), SnapshotStop::new("M2", "Lilau")],
        );
        graph.refresh_meta(Utc::now());
        Arc::new(Tracker::new(
            Arc::new(graph),
            CountingLive::default(),
            CandidateSelector::default(),
            Predictor::default(),
        ))
    }

    #[test]
    fn interval_is_clamped() {
        let watcher = Watcher::new(tracker());
        assert_eq!(watcher.interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(
            watcher.clone().with_interval(Duration::from_secs(1)).interval(),
            MIN_POLL_INTERVAL
        );
        assert_eq!(
            watcher.clone().with_interval(Duration::from_secs(30)).interval(),
            MAX_POLL_INTERVAL
        );
        assert_eq!(
            watcher.with_interval(Duration::from_secs(7)).interval(),
            Duration::from_secs(7)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_boards_until_dropped() {
        let tracker = tracker();
        let watcher = Watcher::new(Arc::clone(&tracker));

        let mut observation = watcher.observe("m2").unwrap();
        let first = observation.next().await.unwrap();
        assert_eq!(first.stop, "M2");
        assert_eq!(first.routes.len(), 1);

        let second = observation.next().await.unwrap();
        assert!(second.generated_at >= first.generated_at);
        assert!(observation.latest().is_some());

        drop(observation);
        tokio::task::yield_now().await;
        let calls = tracker.source().live_calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(tracker.source().live_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_route_timelines_until_dropped() {
        let tracker = tracker();
        let watcher = Watcher::new(Arc::clone(&tracker)).with_interval(Duration::from_secs(8));

        let mut observation = watcher.observe_route(&"33_0".parse().unwrap()).unwrap();
        let first = observation.next().await.unwrap();
        let codes: Vec<_> = first.stops.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, ["M1", "M2"]);

        observation.next().await.unwrap();
        drop(observation);
        tokio::task::yield_now().await;
        let calls = tracker.source().live_calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(tracker.source().live_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn unknown_stop_is_rejected() {
        let watcher = Watcher::new(tracker());
        assert!(matches!(watcher.observe("Q9"), Err(BoardError::UnknownStop(_))));
        assert!(matches!(
            watcher.observe_route(&"33_1".parse().unwrap()),
            Err(BoardError::UnknownRoute(_))
        ));
    }
}

//! Application state for the web layer.

use std::sync::Arc;

use crate::live::CachedLiveSource;
use crate::predict::Tracker;
use crate::upstream::Upstream;

/// The tracker the server runs: portal or recorded data behind a live cache.
pub type LiveTracker = Tracker<CachedLiveSource<Upstream>>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<LiveTracker>,
}

impl AppState {
    pub fn new(tracker: Arc<LiveTracker>) -> Self {
        Self { tracker }
    }
}

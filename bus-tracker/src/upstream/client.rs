//! Token-signed HTTP client for the transit portal.
//!
//! Every call is a form-encoded `POST`. The portal checks three things before
//! answering: a `token` header computed from the exact parameter order (see
//! [`super::token`]), and `Referer`/`Origin` headers naming its own web map.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, ORIGIN, REFERER};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{RouteKey, TrafficSegment};
use crate::live::{LiveSnapshot, SnapshotStop};

use super::convert::{
    LocatedStation, convert_live, convert_locations, convert_route_stops, convert_traffic,
};
use super::error::UpstreamError;
use super::token::{Clock, LocalClock, OffsetClock, generate_token};
use super::types::{Envelope, LocationData, RouteData, TrafficItem};

/// Default base URL of the portal's API.
pub const DEFAULT_BASE_URL: &str = "https://bis.dsat.gov.mo:37812/macauweb/";

const DEFAULT_ORIGIN: &str = "https://bis.dsat.gov.mo:37812";
const DEFAULT_REFERER: &str = "https://bis.dsat.gov.mo:37812/macauweb/map.html";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 8;

/// Endpoint paths, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
    pub route_data: String,
    pub live_bus: String,
    pub location: String,
    pub traffic: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            route_data: "getRouteData.html".to_string(),
            live_bus: "routestation/bus".to_string(),
            location: "routestation/location".to_string(),
            traffic: "routestation/traffic".to_string(),
        }
    }
}

/// Configuration for the upstream client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL for the API, with trailing slash
    pub base_url: String,
    /// `Origin` header sent with every request
    pub origin: String,
    /// `Referer` header sent with every request
    pub referer: String,
    pub user_agent: String,
    /// Value of the `lang` parameter
    pub lang: String,
    /// Value of the `device` parameter
    pub device: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Pin token timestamps to this UTC offset instead of the host zone.
    pub utc_offset_minutes: Option<i32>,
    pub endpoints: EndpointPaths,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            lang: "zh-tw".to_string(),
            device: "web".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            utc_offset_minutes: None,
            endpoints: EndpointPaths::default(),
        }
    }
}

impl UpstreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the response language.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Stamp tokens at a fixed UTC offset, e.g. `480` for UTC+8.
    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = Some(minutes);
        self
    }

    /// Clock for token timestamps. Falls back to host local time when the
    /// configured offset is out of range.
    pub fn clock(&self) -> Arc<dyn Clock> {
        match self.utc_offset_minutes.and_then(OffsetClock::from_minutes) {
            Some(clock) => Arc::new(clock),
            None => {
                if let Some(minutes) = self.utc_offset_minutes {
                    warn!(minutes, "ignoring out-of-range UTC offset");
                }
                Arc::new(LocalClock)
            }
        }
    }
}

/// Upstream portal client.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

fn header(name: &'static str, value: &str) -> Result<HeaderValue, UpstreamError> {
    HeaderValue::from_str(value).map_err(|_| UpstreamError::InvalidHeader {
        name,
        value: value.to_string(),
    })
}

impl UpstreamClient {
    /// Create a client with the configured clock.
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let clock = config.clock();
        Self::with_clock(config, clock)
    }

    /// Create a client stamping tokens from `clock`.
    pub fn with_clock(config: UpstreamConfig, clock: Arc<dyn Clock>) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, header("Origin", &config.origin)?);
        headers.insert(REFERER, header("Referer", &config.referer)?);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            config,
            clock,
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Post `params` in order and decode the JSON response.
    ///
    /// The token is computed here, immediately before sending, so it always
    /// carries the current minute.
    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = self.url(path);
        let token = generate_token(params, self.clock.now());

        let response = self
            .http
            .post(&url)
            .header("token", header("token", &token)?)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .form(params)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(UpstreamError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            });
        }

        let body = response.text().await?;
        debug!(%url, bytes = body.len(), "upstream response");

        serde_json::from_str(&body).map_err(|e| UpstreamError::json(e, &body))
    }

    /// Like [`Self::post_form`], but a malformed or empty body is "no data".
    async fn post_lenient<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, UpstreamError> {
        match self.post_form::<Envelope<T>>(path, params).await {
            Ok(envelope) => Ok(envelope.data),
            Err(UpstreamError::Json { message, .. }) => {
                warn!(path, %message, "undecodable upstream payload, treating as no data");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn base_params(&self, key: &RouteKey) -> Vec<(&'static str, String)> {
        vec![
            ("routeName", key.route.as_str().to_string()),
            ("dir", key.direction.as_param().to_string()),
            ("lang", self.config.lang.clone()),
        ]
    }

    /// Raw route data (stop sequence) for a route-direction.
    pub async fn route_data(&self, key: &RouteKey) -> Result<Option<RouteData>, UpstreamError> {
        let mut params = self.base_params(key);
        params.push(("device", self.config.device.clone()));
        self.post_lenient(&self.config.endpoints.route_data, &params)
            .await
    }

    /// Stop sequence for a route-direction. Empty when the direction does not run.
    pub async fn route_stops(
        &self,
        key: &RouteKey,
    ) -> Result<Vec<SnapshotStop>, UpstreamError> {
        Ok(self
            .route_data(key)
            .await?
            .map(|data| convert_route_stops(&data))
            .unwrap_or_default())
    }

    /// Live vehicles for a route-direction.
    ///
    /// `extra` parameters are sent after `lang` and before `device`, which is
    /// where the portal's own map puts `routeType`.
    pub async fn live_snapshot(
        &self,
        key: &RouteKey,
        variant: &str,
        extra: &[(String, String)],
    ) -> Result<Option<LiveSnapshot>, UpstreamError> {
        let mut params: Vec<(&str, String)> = vec![("action", "dy".to_string())];
        params.extend(self.base_params(key));
        params.extend(extra.iter().map(|(k, v)| (k.as_str(), v.clone())));
        params.push(("device", self.config.device.clone()));

        let data: Option<RouteData> = self
            .post_lenient(&self.config.endpoints.live_bus, &params)
            .await?;
        Ok(data.map(|d| convert_live(key, variant, &d)))
    }

    /// Station coordinates for a route-direction.
    pub async fn locations(
        &self,
        key: &RouteKey,
    ) -> Result<Vec<LocatedStation>, UpstreamError> {
        let mut params = self.base_params(key);
        params.push(("routeCode", key.route.padded_code()));

        let data: Option<LocationData> = self
            .post_lenient(&self.config.endpoints.location, &params)
            .await?;
        Ok(data.map(|d| convert_locations(&d)).unwrap_or_default())
    }

    /// Per-segment congestion for a route-direction.
    pub async fn traffic(
        &self,
        key: &RouteKey,
    ) -> Result<Vec<TrafficSegment>, UpstreamError> {
        let mut params = self.base_params(key);
        params.push(("device", self.config.device.clone()));

        let data: Option<Vec<TrafficItem>> = self
            .post_lenient(&self.config.endpoints.traffic, &params)
            .await?;
        Ok(data.map(|items| convert_traffic(&items)).unwrap_or_default())
    }
}

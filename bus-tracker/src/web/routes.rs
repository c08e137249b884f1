//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::domain::{Coordinate, Direction, DomainError, RouteKey, RouteNo};
use crate::nearby::{DEFAULT_NEARBY_LIMIT, nearby_stops};
use crate::graph::STOP_SEARCH_LIMIT;
use crate::predict::{ArrivalBoard, BoardError};

use super::dto::*;
use super::state::AppState;

/// Upper bound on `limit` for nearby queries.
const MAX_NEARBY_LIMIT: usize = 200;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stops/nearby", get(nearby))
        .route("/api/stops/search", get(search_stops))
        .route("/api/stops/:code", get(stop_detail))
        .route("/api/stops/:code/arrivals", get(stop_arrivals))
        .route("/api/routes", get(search_routes))
        .route("/api/routes/:route/:dir/live", get(route_live))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Stops closest to a coordinate.
async fn nearby(
    State(state): State<AppState>,
    Query(req): Query<NearbyRequest>,
) -> Result<Json<NearbyResponse>, AppError> {
    let origin = Coordinate::new(req.lat, req.lon)?;
    let limit = req.limit.unwrap_or(DEFAULT_NEARBY_LIMIT).min(MAX_NEARBY_LIMIT);

    let stops = nearby_stops(state.tracker.graph(), origin, limit);
    Ok(Json(NearbyResponse { origin, stops }))
}

/// Stops whose name contains `q`.
async fn search_stops(
    State(state): State<AppState>,
    Query(req): Query<SearchRequest>,
) -> Json<Vec<StopSummary>> {
    let stops = state
        .tracker
        .graph()
        .search_stops(&req.q, STOP_SEARCH_LIMIT)
        .into_iter()
        .map(StopSummary::from)
        .collect();
    Json(stops)
}

/// Route-directions whose number contains `q`; all of them without one.
async fn search_routes(
    State(state): State<AppState>,
    Query(req): Query<SearchRequest>,
) -> Json<Vec<RouteSummary>> {
    let graph = state.tracker.graph();
    let routes = graph
        .search_routes(&req.q)
        .into_iter()
        .map(|r| RouteSummary::from_route(r, graph))
        .collect();
    Json(routes)
}

/// A stop and the routes serving it.
async fn stop_detail(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<StopDetail>, AppError> {
    let stop = state
        .tracker
        .find_stop(&code)
        .ok_or_else(|| BoardError::UnknownStop(code.clone()))?;

    Ok(Json(StopDetail::from_stop(stop, state.tracker.graph())))
}

/// Live arrivals for every route serving a stop.
async fn stop_arrivals(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ArrivalBoard>, AppError> {
    let board = state.tracker.stop_board(&code).await?;
    Ok(Json(board))
}

/// Live arrivals for one route-direction at a stop, or its whole timeline
/// when no stop is given.
async fn route_live(
    State(state): State<AppState>,
    Path((route, dir)): Path<(String, String)>,
    Query(req): Query<LiveRequest>,
) -> Result<Response, AppError> {
    let key = RouteKey::new(RouteNo::parse(&route)?, Direction::parse(&dir)?);
    match req.stop {
        Some(stop) => {
            let arrivals = state.tracker.arrivals_for(&key, &stop).await?;
            Ok(Json(arrivals).into_response())
        }
        None => {
            let timeline = state.tracker.route_timeline(&key).await?;
            Ok(Json(timeline).into_response())
        }
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        AppError::BadRequest {
            message: e.to_string(),
        }
    }
}

impl From<BoardError> for AppError {
    fn from(e: BoardError) -> Self {
        match e {
            BoardError::UnknownStop(_)
            | BoardError::NotServed { .. }
            | BoardError::UnknownRoute(_) => AppError::NotFound {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
        };

        warn!(%status, %message, "request rejected");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

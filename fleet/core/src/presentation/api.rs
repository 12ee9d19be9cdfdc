// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API
//!
//! | Method | Path | Result |
//! |--------|------|--------|
//! | GET | `/health` | liveness and uptime |
//! | GET | `/api/location/latest/{vehicle_id}` | latest report, 404 when none |
//! | GET | `/api/location/history/{vehicle_id}?limit=N` | newest-first reports (max 100) |
//! | GET | `/api/geofence/{vehicle_id}` | geofence status, 404 when none |
//! | POST | `/api/telemetry/{*topic}` | publish a raw position payload onto the bus |
//! | GET | `/api/alerts/stream` | SSE feed of published alerts |
//!
//! 404 means "no data"; 5xx is only returned when the store fails.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::application::query::PositionQueryService;
use crate::domain::position::VehicleId;
use crate::domain::topic::TopicFilter;
use crate::infrastructure::message_bus::{MessageBus, MessageBusError};

pub struct AppState {
    pub queries: Arc<dyn PositionQueryService>,
    pub bus: MessageBus,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(queries: Arc<dyn PositionQueryService>, bus: MessageBus) -> Self {
        Self {
            queries,
            bus,
            start_time: Instant::now(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/location/latest/{vehicle_id}", get(latest_handler))
        .route("/api/location/history/{vehicle_id}", get(history_handler))
        .route("/api/geofence/{vehicle_id}", get(geofence_handler))
        .route("/api/telemetry/{*topic}", post(telemetry_handler))
        .route("/api/alerts/stream", get(alert_stream_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(&'static str),
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn vehicle_id(raw: String) -> Result<VehicleId, ApiError> {
    VehicleId::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn latest_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let vehicle_id = vehicle_id(raw_id)?;
    match state.queries.get_latest(&vehicle_id).await {
        Ok(Some(report)) => Ok(Json(report).into_response()),
        Ok(None) => Err(ApiError::NotFound("No location data found")),
        Err(e) => {
            error!(vehicle_id = %vehicle_id, error = %e, "Failed to fetch latest location");
            Err(ApiError::Internal("Error fetching location data"))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Response, ApiError> {
    let vehicle_id = vehicle_id(raw_id)?;
    match state.queries.get_history(&vehicle_id, params.limit).await {
        Ok(history) => Ok(Json(history).into_response()),
        Err(e) => {
            error!(vehicle_id = %vehicle_id, error = %e, "Failed to fetch location history");
            Err(ApiError::Internal("Error fetching location history"))
        }
    }
}

async fn geofence_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let vehicle_id = vehicle_id(raw_id)?;
    match state.queries.get_geofence_status(&vehicle_id).await {
        Ok(Some(status)) => Ok(Json(status).into_response()),
        Ok(None) => Err(ApiError::NotFound("No location data found")),
        Err(e) => {
            error!(vehicle_id = %vehicle_id, error = %e, "Failed to fetch geofence status");
            Err(ApiError::Internal("Error fetching geofence status"))
        }
    }
}

async fn telemetry_handler(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let alert_filter = state
        .bus
        .alert_topic()
        .wildcard_filter()
        .map_err(|_| ApiError::Internal("Invalid alert topic"))?;
    if alert_filter.matches(&topic) {
        return Err(ApiError::BadRequest(format!(
            "Topic '{}' is reserved for geofence alerts",
            topic
        )));
    }

    let delivered = state.bus.publish(topic.clone(), body);
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "topic": topic, "delivered": delivered })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct AlertStreamParams {
    pub vehicle_id: Option<String>,
}

async fn alert_stream_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlertStreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let alert_topic = state.bus.alert_topic();
    let filter = match params.vehicle_id {
        Some(raw_id) => TopicFilter::parse(&alert_topic.for_vehicle(&vehicle_id(raw_id)?)),
        None => alert_topic.wildcard_filter(),
    }
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let receiver = state.bus.subscribe_filtered(vec![filter]);

    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    let alert: serde_json::Value = match serde_json::from_slice(&message.payload) {
                        Ok(alert) => alert,
                        Err(e) => {
                            warn!(topic = %message.topic, error = %e, "Skipping undecodable alert");
                            continue;
                        }
                    };
                    let data = json!({ "topic": message.topic, "alert": alert }).to_string();
                    return Some((Ok(Event::default().event("alert").data(data)), receiver));
                }
                Err(MessageBusError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

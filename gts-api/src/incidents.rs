use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use gts_core::reservation::{Incident, IncidentType};
use gts_core::Actor;

use crate::{error::AppError, feed, state::AppState};

#[derive(Debug, Deserialize)]
pub struct RecentIncidentsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct LogIncidentRequest {
    pub reservation_id: Uuid,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub notes: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/incidents", get(recent_incidents).post(log_incident))
}

/// GET /v1/incidents?limit=50
async fn recent_incidents(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<RecentIncidentsQuery>,
) -> Result<Json<Vec<Incident>>, AppError> {
    Ok(Json(state.manager.recent_incidents(&actor, query.limit).await?))
}

/// POST /v1/incidents
async fn log_incident(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<LogIncidentRequest>,
) -> Result<(StatusCode, Json<Incident>), AppError> {
    let incident = state
        .manager
        .log_incident(req.reservation_id, req.incident_type, req.notes, &actor)
        .await?;
    state.publish(feed::incident(&incident)).await;
    Ok((StatusCode::CREATED, Json(incident)))
}

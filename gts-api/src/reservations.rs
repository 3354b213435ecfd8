use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use gts_catalog::AllocationPlan;
use gts_core::reservation::{Incident, Reservation, ReservationStatus};
use gts_core::{Actor, ReservationFilter, Role};
use gts_reservation::{CreateReservation, Intervention, ReservationDetails, RescueOutcome};

use crate::{error::AppError, feed, state::AppState};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListReservationsQuery {
    pub status: Option<String>,
    pub corridor_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub target_location_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub notes: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/allocations/preview", post(preview_allocation))
        .route("/v1/reservations", post(create_reservation).get(list_reservations))
        .route("/v1/reservations/mine", get(my_reservations))
        .route("/v1/reservations/code/{code}", get(get_by_code))
        .route("/v1/reservations/{id}", get(get_reservation))
        .route("/v1/reservations/{id}/incidents", get(reservation_incidents))
        .route("/v1/reservations/{id}/cancel", put(cancel_reservation))
        .route("/v1/reservations/{id}/reassign", put(reassign_reservation))
        .route("/v1/reservations/{id}/rescue", post(rescue_reservation))
        .route("/v1/reservations/{id}/fail", post(fail_reservation))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/allocations/preview
/// Ranks three stops for the caller without claiming any capacity.
async fn preview_allocation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateReservation>,
) -> Result<Json<AllocationPlan>, AppError> {
    let plan = state.manager.preview(&actor.id, &req).await?;
    Ok(Json(plan))
}

/// POST /v1/reservations
async fn create_reservation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateReservation>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let reservation = state.manager.create(&actor, req).await?;
    state.publish(feed::confirmed(&reservation)).await;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /v1/reservations
async fn list_reservations(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ListReservationsQuery>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    actor.require_role(&[Role::Ops, Role::FleetAdmin])?;

    let status = query
        .status
        .as_deref()
        .map(str::parse::<ReservationStatus>)
        .transpose()?;

    let filter = ReservationFilter {
        status,
        corridor_id: query.corridor_id,
        location_id: query.location_id,
        limit: query.limit.unwrap_or(0),
    };
    Ok(Json(state.manager.find_all(filter).await?))
}

/// GET /v1/reservations/mine
async fn my_reservations(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    actor.require_role(&[Role::Driver])?;
    Ok(Json(state.manager.find_by_driver(&actor.id).await?))
}

/// GET /v1/reservations/code/{code}
async fn get_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Reservation>, AppError> {
    Ok(Json(state.manager.find_by_code(&code).await?))
}

/// GET /v1/reservations/{id}
/// Includes check-in history and incidents.
async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationDetails>, AppError> {
    Ok(Json(state.manager.details(id).await?))
}

/// GET /v1/reservations/{id}/incidents
async fn reservation_incidents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Incident>>, AppError> {
    state.manager.find_by_id(id).await?;
    Ok(Json(state.manager.incidents(id).await?))
}

/// PUT /v1/reservations/{id}/cancel
async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reservation>, AppError> {
    let reservation = state.manager.cancel(id, &actor).await?;
    state.publish(feed::status_changed(&reservation)).await;
    Ok(Json(reservation))
}

/// PUT /v1/reservations/{id}/reassign
async fn reassign_reservation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReassignRequest>,
) -> Result<Json<Intervention>, AppError> {
    let intervention = state
        .manager
        .reassign(id, req.target_location_id, &actor, req.reason)
        .await?;
    publish_intervention(&state, &intervention).await;
    Ok(Json(intervention))
}

/// POST /v1/reservations/{id}/rescue
async fn rescue_reservation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<RescueOutcome>, AppError> {
    let outcome = state.manager.rescue_protocol(id, &actor).await?;
    publish_intervention(&state, &outcome.intervention).await;
    Ok(Json(outcome))
}

/// POST /v1/reservations/{id}/fail
async fn fail_reservation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<FailRequest>,
) -> Result<Json<Intervention>, AppError> {
    let notes = req
        .notes
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "Marked failed by ops".to_string());

    let intervention = state.manager.mark_failed(id, &actor, notes).await?;
    publish_intervention(&state, &intervention).await;
    Ok(Json(intervention))
}

async fn publish_intervention(state: &AppState, intervention: &Intervention) {
    state.publish(feed::status_changed(&intervention.reservation)).await;
    state.publish(feed::incident(&intervention.incident)).await;
}

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use gts_catalog::CapacityLedger;
use gts_core::location::{CapacityRecord, Corridor, Location};
use gts_core::reservation::Reservation;
use gts_core::Actor;
use gts_reservation::LocationView;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SetCapacityRequest {
    pub date: Option<NaiveDate>,
    pub total_spots: Option<i32>,
    pub holdback_spots: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<NaiveDate>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/corridors", get(list_corridors))
        .route("/v1/corridors/{id}/locations", get(corridor_locations))
        .route("/v1/locations/mine", get(my_locations))
        .route("/v1/locations/{id}", get(get_location))
        .route("/v1/locations/{id}/capacity", put(set_capacity))
        .route("/v1/locations/{id}/capacity/force", post(force_add_capacity))
        .route("/v1/locations/{id}/reservations", get(location_reservations))
}

/// GET /v1/corridors
async fn list_corridors(State(state): State<AppState>) -> Result<Json<Vec<Corridor>>, AppError> {
    Ok(Json(state.locations.corridors().await?))
}

/// GET /v1/corridors/{id}/locations
/// Locations in travel order with today's capacity.
async fn corridor_locations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<LocationView>>, AppError> {
    Ok(Json(state.locations.corridor_locations(id).await?))
}

/// GET /v1/locations/mine
async fn my_locations(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<LocationView>>, AppError> {
    Ok(Json(state.locations.admin_locations(&actor).await?))
}

/// GET /v1/locations/{id}
async fn get_location(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Location>, AppError> {
    Ok(Json(state.locations.location(id).await?))
}

/// PUT /v1/locations/{id}/capacity
async fn set_capacity(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetCapacityRequest>,
) -> Result<Json<CapacityRecord>, AppError> {
    let date = req.date.unwrap_or_else(CapacityLedger::today);
    let record = state
        .locations
        .set_capacity(&actor, id, date, req.total_spots, req.holdback_spots)
        .await?;
    Ok(Json(record))
}

/// POST /v1/locations/{id}/capacity/force
/// Ops adds one spot to today's capacity.
async fn force_add_capacity(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<CapacityRecord>, AppError> {
    Ok(Json(state.manager.force_add_capacity(id, &actor).await?))
}

/// GET /v1/locations/{id}/reservations?date=YYYY-MM-DD
async fn location_reservations(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    let date = query.date.unwrap_or_else(CapacityLedger::today);
    Ok(Json(state.locations.location_reservations(&actor, id, date).await?))
}

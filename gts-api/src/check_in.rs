use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gts_core::geofence::GeofenceCheck;
use gts_core::reservation::CheckInType;
use gts_core::{Actor, Role};
use gts_reservation::{ArrivalOutcome, CheckInOutcome};

use crate::{error::AppError, feed, state::AppState};

#[derive(Debug, Deserialize)]
pub struct DriverCheckInRequest {
    pub reservation_id: Uuid,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub check_in_type: CheckInType,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DriverCheckInResponse {
    Arrival(ArrivalOutcome),
    Departure(CheckInOutcome),
}

#[derive(Debug, Deserialize)]
pub struct LocationCheckInRequest {
    pub confirmation_code: String,
    pub location_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct GeofenceRequest {
    pub lat: f64,
    pub lng: f64,
    pub location_lat: f64,
    pub location_lng: f64,
    pub radius_meters: Option<f64>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/check-in/driver", post(driver_check_in))
        .route("/v1/check-in/location", post(location_check_in))
        .route("/v1/check-in/geofence", post(validate_geofence))
}

/// POST /v1/check-in/driver
/// Geofenced arrival, or departure after a check-in.
async fn driver_check_in(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<DriverCheckInRequest>,
) -> Result<Json<DriverCheckInResponse>, AppError> {
    actor.require_role(&[Role::Driver])?;

    let response = match req.check_in_type {
        CheckInType::Arrive => {
            let outcome = state.check_in.arrive(&actor, req.reservation_id, req.lat, req.lng).await?;
            state.publish(feed::status_changed(&outcome.reservation)).await;
            DriverCheckInResponse::Arrival(outcome)
        }
        CheckInType::Depart => {
            let outcome = state.check_in.depart(&actor, req.reservation_id, req.lat, req.lng).await?;
            state.publish(feed::status_changed(&outcome.reservation)).await;
            DriverCheckInResponse::Departure(outcome)
        }
    };

    Ok(Json(response))
}

/// POST /v1/check-in/location
/// Attendant marks a driver arrived by confirmation code.
async fn location_check_in(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<LocationCheckInRequest>,
) -> Result<Json<CheckInOutcome>, AppError> {
    let outcome = state
        .check_in
        .mark_arrived_by_code(&actor, req.confirmation_code.trim(), req.location_id)
        .await?;
    state.publish(feed::status_changed(&outcome.reservation)).await;
    Ok(Json(outcome))
}

/// POST /v1/check-in/geofence
async fn validate_geofence(
    State(state): State<AppState>,
    Json(req): Json<GeofenceRequest>,
) -> Result<Json<GeofenceCheck>, AppError> {
    let check = state
        .check_in
        .validate_geofence(req.lat, req.lng, req.location_lat, req.location_lng, req.radius_meters)?;
    Ok(Json(check))
}

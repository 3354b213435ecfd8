use axum::{extract::State, routing::get, Extension, Json, Router};
use serde::Deserialize;

use gts_core::hos::{HosProvider, HosSnapshot};
use gts_core::{Actor, Role};

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct UpdateHosRequest {
    pub hours_remaining: f64,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/hos/me", get(my_hos).put(update_my_hos))
}

/// GET /v1/hos/me
async fn my_hos(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<HosSnapshot>, AppError> {
    actor.require_role(&[Role::Driver])?;
    Ok(Json(state.hos.snapshot(&actor.id).await))
}

/// PUT /v1/hos/me
/// Driver-entered hours, used as the allocation hint until changed again.
async fn update_my_hos(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateHosRequest>,
) -> Result<Json<HosSnapshot>, AppError> {
    actor.require_role(&[Role::Driver])?;
    if !req.hours_remaining.is_finite() || req.hours_remaining < 0.0 {
        return Err(AppError::ValidationError(format!(
            "hours_remaining must be a non-negative number, got {}",
            req.hours_remaining
        )));
    }

    state.hos.set_hours_remaining(actor.id.clone(), req.hours_remaining).await;
    Ok(Json(state.hos.snapshot(&actor.id).await))
}

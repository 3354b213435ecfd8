use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Router,
};
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use gts_core::reservation::{Incident, Reservation};
use gts_core::Actor;
use gts_shared::events::{
    IncidentRecordedEvent, OpsFeedEvent, ReservationConfirmedEvent, ReservationStatusChangedEvent,
};

use crate::{error::AppError, state::AppState};

pub fn confirmed(reservation: &Reservation) -> OpsFeedEvent {
    OpsFeedEvent::Confirmed(ReservationConfirmedEvent {
        reservation_id: reservation.id,
        driver_id: reservation.driver_id.clone(),
        corridor_id: reservation.corridor_id,
        confirmation_code: reservation.confirmation_code.clone(),
        primary_location_id: reservation.primary_location_id,
        backup_location_id: reservation.backup_location_id,
        emergency_location_id: reservation.emergency_location_id,
        timestamp: Utc::now().timestamp(),
    })
}

pub fn status_changed(reservation: &Reservation) -> OpsFeedEvent {
    OpsFeedEvent::StatusChanged(ReservationStatusChangedEvent {
        reservation_id: reservation.id,
        confirmation_code: reservation.confirmation_code.clone(),
        status: reservation.status().to_string(),
        primary_location_id: reservation.primary_location_id,
        timestamp: Utc::now().timestamp(),
    })
}

pub fn incident(incident: &Incident) -> OpsFeedEvent {
    OpsFeedEvent::Incident(IncidentRecordedEvent {
        incident_id: incident.id,
        reservation_id: incident.reservation_id,
        incident_type: incident.incident_type.as_str().to_string(),
        notes: incident.notes.clone(),
        created_by: incident.created_by.clone(),
        timestamp: incident.created_at.timestamp(),
    })
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/ops/stream", get(ops_stream))
}

/// GET /v1/ops/stream
/// Live server-sent feed of confirmations, status changes and incidents.
async fn ops_stream(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    actor.require_ops()?;
    tracing::info!("Ops feed subscriber connected: {}", actor.id);

    let rx = state.feed_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => Some(Event::default().event(event.kind()).json_data(&event)),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!("Ops feed subscriber lagged, skipped {} events", skipped);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

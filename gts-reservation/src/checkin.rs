use serde::Serialize;
use uuid::Uuid;

use gts_core::geo::is_valid_coordinate;
use gts_core::geofence::{GeofenceCheck, GeofenceValidator};
use gts_core::location::Location;
use gts_core::repository::{HistoryEntry, Repositories};
use gts_core::reservation::{CheckInEvent, CheckInType, Reservation, ReservationAction};
use gts_core::settings::GeofenceSettings;
use gts_core::{Actor, CoreError, CoreResult, Role};

use crate::manager::commit;

#[derive(Debug, Clone, Serialize)]
pub struct ArrivalOutcome {
    pub event: CheckInEvent,
    /// Distance to the primary location, rounded to whole metres.
    pub distance: i64,
    pub within_geofence: bool,
    pub reservation: Reservation,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckInOutcome {
    pub event: CheckInEvent,
    pub reservation: Reservation,
}

/// Geofenced arrival and departure, plus the attendant's code-based shortcut.
pub struct CheckInService {
    repos: Repositories,
    geofence: GeofenceValidator,
}

impl CheckInService {
    pub fn new(repos: Repositories, settings: &GeofenceSettings) -> Self {
        Self {
            repos,
            geofence: GeofenceValidator::new(settings),
        }
    }

    pub fn geofence(&self) -> &GeofenceValidator {
        &self.geofence
    }

    pub async fn arrive(&self, actor: &Actor, reservation_id: Uuid, lat: f64, lng: f64) -> CoreResult<ArrivalOutcome> {
        ensure_coordinates(lat, lng)?;
        let mut reservation = self.load_for(actor, reservation_id).await?;
        reservation.check(ReservationAction::Arrive)?;

        let location = self.location(reservation.primary_location_id).await?;
        let check = self.geofence.validate(lat, lng, location.lat, location.lng);
        let max = self.geofence.max_check_in_distance();
        if check.distance > max {
            return Err(CoreError::OutOfRange {
                distance_m: check.distance.round() as i64,
                max_m: max.round() as i64,
            });
        }

        let event = CheckInEvent::new(
            reservation.id,
            location.id,
            CheckInType::Arrive,
            lat,
            lng,
            self.geofence.confidence(check.distance),
        );
        let event = self.commit_with_event(&mut reservation, ReservationAction::Arrive, event).await?;

        tracing::info!(
            "Reservation {} checked in at {} ({}m, confidence {:.2})",
            reservation.id,
            location.name,
            check.distance.round(),
            event.confidence
        );

        Ok(ArrivalOutcome {
            event,
            distance: check.distance.round() as i64,
            within_geofence: check.valid,
            reservation,
        })
    }

    pub async fn depart(&self, actor: &Actor, reservation_id: Uuid, lat: f64, lng: f64) -> CoreResult<CheckInOutcome> {
        ensure_coordinates(lat, lng)?;
        let mut reservation = self.load_for(actor, reservation_id).await?;

        let event = CheckInEvent::new(
            reservation.id,
            reservation.primary_location_id,
            CheckInType::Depart,
            lat,
            lng,
            1.0,
        );
        let event = self.commit_with_event(&mut reservation, ReservationAction::Depart, event).await?;

        tracing::info!("Reservation {} completed", reservation.id);
        Ok(CheckInOutcome { event, reservation })
    }

    /// Attendant check-in by confirmation code. No geofence; the event is
    /// pinned to the location's own coordinates.
    pub async fn mark_arrived_by_code(
        &self,
        actor: &Actor,
        confirmation_code: &str,
        location_id: Uuid,
    ) -> CoreResult<CheckInOutcome> {
        let mut reservation = self
            .repos
            .reservations
            .get_reservation_by_code(confirmation_code)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Reservation with code {}", confirmation_code)))?;

        let location = self.location(location_id).await?;
        actor.require_location_manager(location.admin_id.as_deref())?;

        if reservation.primary_location_id != location.id {
            return Err(CoreError::Validation(format!(
                "Reservation {} is not booked at {}",
                confirmation_code, location.name
            )));
        }

        let event = CheckInEvent::new(
            reservation.id,
            location.id,
            CheckInType::Arrive,
            location.lat,
            location.lng,
            1.0,
        );
        let event = self.commit_with_event(&mut reservation, ReservationAction::Arrive, event).await?;

        tracing::info!("Reservation {} checked in by attendant {}", reservation.id, actor.id);
        Ok(CheckInOutcome { event, reservation })
    }

    pub fn validate_geofence(
        &self,
        lat: f64,
        lng: f64,
        location_lat: f64,
        location_lng: f64,
        radius_meters: Option<f64>,
    ) -> CoreResult<GeofenceCheck> {
        ensure_coordinates(lat, lng)?;
        ensure_coordinates(location_lat, location_lng)?;
        Ok(match radius_meters {
            Some(radius) if radius.is_finite() && radius > 0.0 => {
                self.geofence.validate_with_radius(lat, lng, location_lat, location_lng, radius)
            }
            Some(radius) => return Err(CoreError::Validation(format!("invalid radius {}", radius))),
            None => self.geofence.validate(lat, lng, location_lat, location_lng),
        })
    }

    pub async fn history(&self, reservation_id: Uuid) -> CoreResult<Vec<CheckInEvent>> {
        Ok(self.repos.check_ins.list_check_ins(reservation_id).await?)
    }

    /// Apply `action` and store the status change and its event as one write.
    async fn commit_with_event(
        &self,
        reservation: &mut Reservation,
        action: ReservationAction,
        event: CheckInEvent,
    ) -> CoreResult<CheckInEvent> {
        let expected = reservation.version;
        reservation.apply(action)?;
        let entry = HistoryEntry::CheckIn(event.clone());
        commit(self.repos.reservations.as_ref(), reservation, expected, Some(&entry)).await?;
        Ok(event)
    }

    async fn load_for(&self, actor: &Actor, reservation_id: Uuid) -> CoreResult<Reservation> {
        let reservation = self
            .repos
            .reservations
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Reservation {}", reservation_id)))?;

        if actor.role == Role::Driver && reservation.driver_id != actor.id {
            return Err(CoreError::Unauthorized("Reservation belongs to another driver".to_string()));
        }
        Ok(reservation)
    }

    async fn location(&self, id: Uuid) -> CoreResult<Location> {
        self.repos
            .locations
            .get_location(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Location {}", id)))
    }
}

fn ensure_coordinates(lat: f64, lng: f64) -> CoreResult<()> {
    if is_valid_coordinate(lat, lng) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!("invalid coordinates ({}, {})", lat, lng)))
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Reservation status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Held,
    Confirmed,
    CheckedIn,
    Completed,
    Canceled,
    Reassigned,
    Failed,
}

/// Everything that may move a reservation between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationAction {
    Confirm,
    Arrive,
    Depart,
    Cancel,
    Reassign,
    Rescue,
    Fail,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Held => "HELD",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::CheckedIn => "CHECKED_IN",
            ReservationStatus::Completed => "COMPLETED",
            ReservationStatus::Canceled => "CANCELED",
            ReservationStatus::Reassigned => "REASSIGNED",
            ReservationStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Completed | ReservationStatus::Canceled | ReservationStatus::Failed
        )
    }

    /// The transition table. Any pair not listed is rejected.
    pub fn next(self, action: ReservationAction) -> CoreResult<ReservationStatus> {
        use ReservationAction as A;
        use ReservationStatus::*;

        let next = match (self, action) {
            (Held, A::Confirm) => Confirmed,
            (Confirmed | Reassigned, A::Arrive) => CheckedIn,
            (CheckedIn, A::Depart) => Completed,
            (Held | Confirmed | CheckedIn | Reassigned, A::Cancel) => Canceled,
            (Held | Confirmed | CheckedIn | Reassigned, A::Reassign | A::Rescue) => Reassigned,
            (Held | Confirmed | CheckedIn | Reassigned, A::Fail) => Failed,
            (from, action) => {
                return Err(CoreError::InvalidTransition {
                    from: from.to_string(),
                    action: action.to_string(),
                })
            }
        };

        Ok(next)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HELD" => Ok(ReservationStatus::Held),
            "CONFIRMED" => Ok(ReservationStatus::Confirmed),
            "CHECKED_IN" => Ok(ReservationStatus::CheckedIn),
            "COMPLETED" => Ok(ReservationStatus::Completed),
            "CANCELED" => Ok(ReservationStatus::Canceled),
            "REASSIGNED" => Ok(ReservationStatus::Reassigned),
            "FAILED" => Ok(ReservationStatus::Failed),
            other => Err(CoreError::Validation(format!("unknown reservation status {}", other))),
        }
    }
}

impl fmt::Display for ReservationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            ReservationAction::Confirm => "confirm",
            ReservationAction::Arrive => "check in",
            ReservationAction::Depart => "check out",
            ReservationAction::Cancel => "cancel",
            ReservationAction::Reassign => "reassign",
            ReservationAction::Rescue => "rescue",
            ReservationAction::Fail => "fail",
        };
        f.write_str(verb)
    }
}

/// Primary, backup and emergency location ids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocationTriple {
    pub primary: Uuid,
    pub backup: Uuid,
    pub emergency: Uuid,
}

impl LocationTriple {
    pub fn is_distinct(&self) -> bool {
        self.primary != self.backup && self.backup != self.emergency && self.primary != self.emergency
    }
}

/// A driver's guaranteed overnight stop. Never deleted.
///
/// The status is private: every change goes through [`Reservation::apply`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub driver_id: String,
    pub corridor_id: Uuid,
    pub start_eta: DateTime<Utc>,
    pub arrival_window_start: DateTime<Utc>,
    pub arrival_window_end: DateTime<Utc>,
    pub primary_location_id: Uuid,
    pub backup_location_id: Uuid,
    pub emergency_location_id: Uuid,
    /// Capacity day the primary spot was claimed against.
    pub capacity_date: NaiveDate,
    status: ReservationStatus,
    pub confirmation_code: String,
    pub hours_remaining: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Reservation {
    /// A new reservation in `HELD`; `confirm` it before persisting.
    #[allow(clippy::too_many_arguments)]
    pub fn held(
        driver_id: impl Into<String>,
        corridor_id: Uuid,
        start_eta: DateTime<Utc>,
        arrival_window: (DateTime<Utc>, DateTime<Utc>),
        locations: LocationTriple,
        capacity_date: NaiveDate,
        confirmation_code: String,
        hours_remaining: Option<f64>,
    ) -> CoreResult<Self> {
        if !locations.is_distinct() {
            return Err(CoreError::Validation(
                "primary, backup and emergency locations must differ".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            driver_id: driver_id.into(),
            corridor_id,
            start_eta,
            arrival_window_start: arrival_window.0,
            arrival_window_end: arrival_window.1,
            primary_location_id: locations.primary,
            backup_location_id: locations.backup,
            emergency_location_id: locations.emergency,
            capacity_date,
            status: ReservationStatus::Held,
            confirmation_code,
            hours_remaining,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    /// Check an action against the transition table without mutating.
    pub fn check(&self, action: ReservationAction) -> CoreResult<ReservationStatus> {
        self.status.next(action)
    }

    /// Apply an action; on rejection the reservation is left untouched.
    pub fn apply(&mut self, action: ReservationAction) -> CoreResult<ReservationStatus> {
        let next = self.status.next(action)?;
        self.status = next;
        self.updated_at = Utc::now();
        Ok(next)
    }

    /// Move the primary slot after a reassign or rescue. Backup and emergency stay fixed.
    pub fn move_primary(
        &mut self,
        action: ReservationAction,
        target: Uuid,
        capacity_date: NaiveDate,
    ) -> CoreResult<ReservationStatus> {
        if !matches!(action, ReservationAction::Reassign | ReservationAction::Rescue) {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                action: action.to_string(),
            });
        }
        let next = self.apply(action)?;
        self.primary_location_id = target;
        self.capacity_date = capacity_date;
        Ok(next)
    }

    pub fn locations(&self) -> LocationTriple {
        LocationTriple {
            primary: self.primary_location_id,
            backup: self.backup_location_id,
            emergency: self.emergency_location_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckInType {
    Arrive,
    Depart,
}

impl CheckInType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckInType::Arrive => "ARRIVE",
            CheckInType::Depart => "DEPART",
        }
    }
}

impl std::str::FromStr for CheckInType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ARRIVE" => Ok(CheckInType::Arrive),
            "DEPART" => Ok(CheckInType::Depart),
            other => Err(CoreError::Validation(format!("unknown check-in type {}", other))),
        }
    }
}

/// Append-only record of a driver (or attendant) check-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInEvent {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub location_id: Uuid,
    #[serde(rename = "type")]
    pub check_in_type: CheckInType,
    pub lat: f64,
    pub lng: f64,
    pub confidence: f64,
    pub ts: DateTime<Utc>,
}

impl CheckInEvent {
    pub fn new(
        reservation_id: Uuid,
        location_id: Uuid,
        check_in_type: CheckInType,
        lat: f64,
        lng: f64,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reservation_id,
            location_id,
            check_in_type,
            lat,
            lng,
            confidence,
            ts: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentType {
    EtaDrift,
    CapacityOverflow,
    LocationIssue,
    ManualOverride,
    RescueProtocol,
}

impl IncidentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::EtaDrift => "ETA_DRIFT",
            IncidentType::CapacityOverflow => "CAPACITY_OVERFLOW",
            IncidentType::LocationIssue => "LOCATION_ISSUE",
            IncidentType::ManualOverride => "MANUAL_OVERRIDE",
            IncidentType::RescueProtocol => "RESCUE_PROTOCOL",
        }
    }
}

impl std::str::FromStr for IncidentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ETA_DRIFT" => Ok(IncidentType::EtaDrift),
            "CAPACITY_OVERFLOW" => Ok(IncidentType::CapacityOverflow),
            "LOCATION_ISSUE" => Ok(IncidentType::LocationIssue),
            "MANUAL_OVERRIDE" => Ok(IncidentType::ManualOverride),
            "RESCUE_PROTOCOL" => Ok(IncidentType::RescueProtocol),
            other => Err(CoreError::Validation(format!("unknown incident type {}", other))),
        }
    }
}

/// Audit trail entry for a manual or automatic intervention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub reservation_id: Uuid,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub notes: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Incident {
    pub fn new(reservation_id: Uuid, incident_type: IncidentType, notes: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reservation_id,
            incident_type,
            notes: notes.into(),
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }
}

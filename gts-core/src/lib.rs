pub mod codes;
pub mod geo;
pub mod geofence;
pub mod hos;
pub mod identity;
pub mod location;
pub mod memory;
pub mod notification;
pub mod repository;
pub mod reservation;
pub mod settings;

pub use codes::{ConfirmationCodeGenerator, RandomHexCodes};
pub use geofence::{GeofenceCheck, GeofenceValidator};
pub use hos::{HosProvider, HosSnapshot, StaticHosProvider};
pub use identity::{Actor, Role};
pub use location::{CapacityRecord, CapacitySummary, Corridor, Location};
pub use memory::InMemoryStore;
pub use notification::{Channel, LogNotifier, Notification, NotificationSender, RecordingNotifier};
pub use repository::{HistoryEntry, ReservationFilter, Repositories};
pub use reservation::{
    CheckInEvent, CheckInType, Incident, IncidentType, LocationTriple, Reservation,
    ReservationAction, ReservationStatus,
};
pub use settings::EngineSettings;

use chrono::NaiveDate;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Corridor {corridor_id} needs at least 3 locations for a reservation (found {found})")]
    InsufficientCorridor { corridor_id: Uuid, found: usize },

    #[error("Insufficient capacity across corridor. Only {available} locations available")]
    InsufficientCapacity { available: usize },

    #[error("Invalid state transition: cannot {action} a reservation in status {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Too far from location. Distance: {distance_m}m, max: {max_m}m")]
    OutOfRange { distance_m: i64, max_m: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Location {location_id} has no sellable spots left on {date}")]
    CapacityExhausted { location_id: Uuid, date: NaiveDate },

    #[error("Location {location_id} has no capacity configured for {date}")]
    CapacityNotConfigured { location_id: Uuid, date: NaiveDate },

    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Capacity ledger contention on location {location_id}, gave up after {attempts} attempts")]
    Contention { location_id: Uuid, attempts: u32 },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Storage(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

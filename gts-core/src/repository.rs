use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::location::{CapacityRecord, Corridor, Location};
use crate::reservation::{CheckInEvent, Incident, Reservation, ReservationStatus};

pub type RepoResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Repository trait for corridor and location reads
#[async_trait]
pub trait LocationRepository: Send + Sync {
    async fn list_corridors(&self) -> RepoResult<Vec<Corridor>>;

    async fn get_corridor(&self, id: Uuid) -> RepoResult<Option<Corridor>>;

    /// Locations of a corridor ordered by `order_in_corridor` ascending.
    async fn list_corridor_locations(&self, corridor_id: Uuid) -> RepoResult<Vec<Location>>;

    async fn get_location(&self, id: Uuid) -> RepoResult<Option<Location>>;

    async fn list_admin_locations(&self, admin_id: &str) -> RepoResult<Vec<Location>>;
}

/// Repository trait for per-location-per-day capacity.
///
/// Writes are conditional so the ledger can run read-compute-commit loops.
#[async_trait]
pub trait CapacityRepository: Send + Sync {
    async fn fetch_capacity(&self, location_id: Uuid, date: NaiveDate) -> RepoResult<Option<CapacityRecord>>;

    /// Insert a record. Returns `false` when one already exists for the key.
    async fn insert_capacity(&self, record: &CapacityRecord) -> RepoResult<bool>;

    /// Replace the record only if the stored version equals `expected_version`.
    /// Returns `false` when another writer got there first.
    async fn update_capacity(&self, record: &CapacityRecord, expected_version: i64) -> RepoResult<bool>;
}

/// Append-only record written in the same unit of work as a status change.
#[derive(Debug, Clone)]
pub enum HistoryEntry {
    CheckIn(CheckInEvent),
    Incident(Incident),
}

#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub corridor_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub limit: usize,
}

/// Repository trait for reservation data access
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Returns `false` when the confirmation code is already taken.
    async fn insert_reservation(&self, reservation: &Reservation) -> RepoResult<bool>;

    async fn get_reservation(&self, id: Uuid) -> RepoResult<Option<Reservation>>;

    async fn get_reservation_by_code(&self, code: &str) -> RepoResult<Option<Reservation>>;

    /// Newest first.
    async fn list_driver_reservations(&self, driver_id: &str) -> RepoResult<Vec<Reservation>>;

    /// Newest first, at most `filter.limit` rows.
    async fn list_reservations(&self, filter: &ReservationFilter) -> RepoResult<Vec<Reservation>>;

    /// Active reservations whose primary is `location_id` and whose arrival window
    /// starts inside `[from, to]`, ordered by arrival window start.
    async fn list_location_reservations(
        &self,
        location_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Reservation>>;

    /// Replace the reservation only if the stored version equals `expected_version`.
    ///
    /// `entry` is appended atomically with the update: either both are stored
    /// or neither is.
    async fn update_reservation(
        &self,
        reservation: &Reservation,
        expected_version: i64,
        entry: Option<&HistoryEntry>,
    ) -> RepoResult<bool>;
}

#[async_trait]
pub trait CheckInRepository: Send + Sync {
    /// Oldest first. Events are written through [`ReservationRepository::update_reservation`].
    async fn list_check_ins(&self, reservation_id: Uuid) -> RepoResult<Vec<CheckInEvent>>;
}

#[async_trait]
pub trait IncidentRepository: Send + Sync {
    /// Standalone incident that does not change the reservation.
    async fn append_incident(&self, incident: &Incident) -> RepoResult<()>;

    /// Newest first.
    async fn list_incidents(&self, reservation_id: Uuid) -> RepoResult<Vec<Incident>>;

    /// Newest first across all reservations.
    async fn list_recent_incidents(&self, limit: usize) -> RepoResult<Vec<Incident>>;
}

/// The data-access interface the engine is built against.
#[derive(Clone)]
pub struct Repositories {
    pub locations: Arc<dyn LocationRepository>,
    pub capacity: Arc<dyn CapacityRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub check_ins: Arc<dyn CheckInRepository>,
    pub incidents: Arc<dyn IncidentRepository>,
}

impl Repositories {
    /// Wire every repository to a single backend that implements all of them.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: LocationRepository
            + CapacityRepository
            + ReservationRepository
            + CheckInRepository
            + IncidentRepository
            + 'static,
    {
        Self {
            locations: store.clone(),
            capacity: store.clone(),
            reservations: store.clone(),
            check_ins: store.clone(),
            incidents: store,
        }
    }
}

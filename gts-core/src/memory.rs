//! In-process implementation of every repository trait.
//!
//! Used by tests and by the API when no database is configured. Capacity rows
//! each sit behind their own mutex, so writers on different (location, date)
//! keys never wait on each other.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::location::{CapacityRecord, Corridor, Location};
use crate::repository::{
    CapacityRepository, CheckInRepository, HistoryEntry, IncidentRepository, LocationRepository,
    RepoResult, ReservationFilter, ReservationRepository,
};
use crate::reservation::{CheckInEvent, Incident, Reservation, ReservationStatus};

type CapacityKey = (Uuid, NaiveDate);

#[derive(Default)]
pub struct InMemoryStore {
    corridors: RwLock<HashMap<Uuid, Corridor>>,
    locations: RwLock<HashMap<Uuid, Location>>,
    capacity: RwLock<HashMap<CapacityKey, Arc<Mutex<CapacityRecord>>>>,
    reservations: RwLock<HashMap<Uuid, Reservation>>,
    check_ins: RwLock<Vec<CheckInEvent>>,
    incidents: RwLock<Vec<Incident>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_corridor(&self, corridor: Corridor) {
        self.corridors.write().await.insert(corridor.id, corridor);
    }

    pub async fn add_location(&self, location: Location) {
        self.locations.write().await.insert(location.id, location);
    }

    /// Seed or overwrite a capacity row directly, bypassing the ledger.
    pub async fn put_capacity(&self, record: CapacityRecord) {
        let key = (record.location_id, record.date);
        self.capacity.write().await.insert(key, Arc::new(Mutex::new(record)));
    }

    async fn capacity_entry(&self, key: &CapacityKey) -> Option<Arc<Mutex<CapacityRecord>>> {
        self.capacity.read().await.get(key).cloned()
    }
}

fn newest_first(reservations: &mut [Reservation]) {
    reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[async_trait]
impl LocationRepository for InMemoryStore {
    async fn list_corridors(&self) -> RepoResult<Vec<Corridor>> {
        let mut corridors: Vec<Corridor> = self.corridors.read().await.values().cloned().collect();
        corridors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(corridors)
    }

    async fn get_corridor(&self, id: Uuid) -> RepoResult<Option<Corridor>> {
        Ok(self.corridors.read().await.get(&id).cloned())
    }

    async fn list_corridor_locations(&self, corridor_id: Uuid) -> RepoResult<Vec<Location>> {
        let mut locations: Vec<Location> = self
            .locations
            .read()
            .await
            .values()
            .filter(|l| l.corridor_id == corridor_id)
            .cloned()
            .collect();
        locations.sort_by_key(|l| l.order_in_corridor);
        Ok(locations)
    }

    async fn get_location(&self, id: Uuid) -> RepoResult<Option<Location>> {
        Ok(self.locations.read().await.get(&id).cloned())
    }

    async fn list_admin_locations(&self, admin_id: &str) -> RepoResult<Vec<Location>> {
        let mut locations: Vec<Location> = self
            .locations
            .read()
            .await
            .values()
            .filter(|l| l.admin_id.as_deref() == Some(admin_id))
            .cloned()
            .collect();
        locations.sort_by_key(|l| l.order_in_corridor);
        Ok(locations)
    }
}

#[async_trait]
impl CapacityRepository for InMemoryStore {
    async fn fetch_capacity(&self, location_id: Uuid, date: NaiveDate) -> RepoResult<Option<CapacityRecord>> {
        match self.capacity_entry(&(location_id, date)).await {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn insert_capacity(&self, record: &CapacityRecord) -> RepoResult<bool> {
        let mut map = self.capacity.write().await;
        let key = (record.location_id, record.date);
        if map.contains_key(&key) {
            return Ok(false);
        }
        map.insert(key, Arc::new(Mutex::new(record.clone())));
        Ok(true)
    }

    async fn update_capacity(&self, record: &CapacityRecord, expected_version: i64) -> RepoResult<bool> {
        let Some(entry) = self.capacity_entry(&(record.location_id, record.date)).await else {
            return Ok(false);
        };
        let mut current = entry.lock().await;
        if current.version != expected_version {
            return Ok(false);
        }
        *current = record.clone();
        Ok(true)
    }
}

#[async_trait]
impl ReservationRepository for InMemoryStore {
    async fn insert_reservation(&self, reservation: &Reservation) -> RepoResult<bool> {
        let mut map = self.reservations.write().await;
        if map.values().any(|r| r.confirmation_code == reservation.confirmation_code) {
            return Ok(false);
        }
        if map.contains_key(&reservation.id) {
            return Err(format!("reservation {} already exists", reservation.id).into());
        }
        map.insert(reservation.id, reservation.clone());
        Ok(true)
    }

    async fn get_reservation(&self, id: Uuid) -> RepoResult<Option<Reservation>> {
        Ok(self.reservations.read().await.get(&id).cloned())
    }

    async fn get_reservation_by_code(&self, code: &str) -> RepoResult<Option<Reservation>> {
        Ok(self
            .reservations
            .read()
            .await
            .values()
            .find(|r| r.confirmation_code == code)
            .cloned())
    }

    async fn list_driver_reservations(&self, driver_id: &str) -> RepoResult<Vec<Reservation>> {
        let mut reservations: Vec<Reservation> = self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| r.driver_id == driver_id)
            .cloned()
            .collect();
        newest_first(&mut reservations);
        Ok(reservations)
    }

    async fn list_reservations(&self, filter: &ReservationFilter) -> RepoResult<Vec<Reservation>> {
        let mut reservations: Vec<Reservation> = self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| filter.status.map_or(true, |s| r.status() == s))
            .filter(|r| filter.corridor_id.map_or(true, |c| r.corridor_id == c))
            .filter(|r| filter.location_id.map_or(true, |l| r.primary_location_id == l))
            .cloned()
            .collect();
        newest_first(&mut reservations);
        reservations.truncate(filter.limit);
        Ok(reservations)
    }

    async fn list_location_reservations(
        &self,
        location_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Reservation>> {
        let mut reservations: Vec<Reservation> = self
            .reservations
            .read()
            .await
            .values()
            .filter(|r| r.primary_location_id == location_id)
            .filter(|r| r.arrival_window_start >= from && r.arrival_window_start <= to)
            .filter(|r| !matches!(r.status(), ReservationStatus::Canceled | ReservationStatus::Failed))
            .cloned()
            .collect();
        reservations.sort_by_key(|r| r.arrival_window_start);
        Ok(reservations)
    }

    async fn update_reservation(
        &self,
        reservation: &Reservation,
        expected_version: i64,
        entry: Option<&HistoryEntry>,
    ) -> RepoResult<bool> {
        // Lock order: reservations, then the log being appended to.
        let mut map = self.reservations.write().await;
        let current = match map.get_mut(&reservation.id) {
            Some(current) if current.version == expected_version => current,
            Some(_) => return Ok(false),
            None => return Err(format!("reservation {} does not exist", reservation.id).into()),
        };

        match entry {
            Some(HistoryEntry::CheckIn(event)) => self.check_ins.write().await.push(event.clone()),
            Some(HistoryEntry::Incident(incident)) => self.incidents.write().await.push(incident.clone()),
            None => {}
        }
        *current = reservation.clone();
        Ok(true)
    }
}

#[async_trait]
impl CheckInRepository for InMemoryStore {
    async fn list_check_ins(&self, reservation_id: Uuid) -> RepoResult<Vec<CheckInEvent>> {
        let mut events: Vec<CheckInEvent> = self
            .check_ins
            .read()
            .await
            .iter()
            .filter(|e| e.reservation_id == reservation_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.ts);
        Ok(events)
    }
}

#[async_trait]
impl IncidentRepository for InMemoryStore {
    async fn append_incident(&self, incident: &Incident) -> RepoResult<()> {
        self.incidents.write().await.push(incident.clone());
        Ok(())
    }

    async fn list_incidents(&self, reservation_id: Uuid) -> RepoResult<Vec<Incident>> {
        let mut incidents: Vec<Incident> = self
            .incidents
            .read()
            .await
            .iter()
            .filter(|i| i.reservation_id == reservation_id)
            .cloned()
            .collect();
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(incidents)
    }

    async fn list_recent_incidents(&self, limit: usize) -> RepoResult<Vec<Incident>> {
        let mut incidents = self.incidents.read().await.clone();
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        incidents.truncate(limit);
        Ok(incidents)
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use gts_catalog::CapacityLedger;
use gts_core::location::{CapacityRecord, CapacitySummary, Corridor, Location};
use gts_core::repository::Repositories;
use gts_core::reservation::Reservation;
use gts_core::{Actor, CoreError, CoreResult, Role};

/// A location with the capacity picture for one day.
#[derive(Debug, Clone, Serialize)]
pub struct LocationView {
    #[serde(flatten)]
    pub location: Location,
    pub capacity: CapacitySummary,
}

/// Corridor and location reads, plus the per-location admin surface.
pub struct LocationService {
    repos: Repositories,
    ledger: Arc<CapacityLedger>,
}

impl LocationService {
    pub fn new(repos: Repositories, ledger: Arc<CapacityLedger>) -> Self {
        Self { repos, ledger }
    }

    pub async fn corridors(&self) -> CoreResult<Vec<Corridor>> {
        Ok(self.repos.locations.list_corridors().await?)
    }

    /// Corridor locations in travel order with today's capacity.
    pub async fn corridor_locations(&self, corridor_id: Uuid) -> CoreResult<Vec<LocationView>> {
        self.repos
            .locations
            .get_corridor(corridor_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Corridor {}", corridor_id)))?;

        let locations = self.repos.locations.list_corridor_locations(corridor_id).await?;
        self.with_capacity(locations, CapacityLedger::today()).await
    }

    pub async fn location(&self, id: Uuid) -> CoreResult<Location> {
        self.repos
            .locations
            .get_location(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Location {}", id)))
    }

    /// Locations run by the calling location admin.
    pub async fn admin_locations(&self, actor: &Actor) -> CoreResult<Vec<LocationView>> {
        actor.require_role(&[Role::LocationAdmin, Role::Ops])?;
        let locations = self.repos.locations.list_admin_locations(&actor.id).await?;
        self.with_capacity(locations, CapacityLedger::today()).await
    }

    /// Active reservations at a location whose arrival window opens on `date` (UTC).
    pub async fn location_reservations(
        &self,
        actor: &Actor,
        location_id: Uuid,
        date: NaiveDate,
    ) -> CoreResult<Vec<Reservation>> {
        let location = self.location(location_id).await?;
        actor.require_location_manager(location.admin_id.as_deref())?;

        let (from, to) = day_bounds(date)?;
        Ok(self.repos.reservations.list_location_reservations(location_id, from, to).await?)
    }

    pub async fn set_capacity(
        &self,
        actor: &Actor,
        location_id: Uuid,
        date: NaiveDate,
        total_spots: Option<i32>,
        holdback_spots: Option<i32>,
    ) -> CoreResult<CapacityRecord> {
        let location = self.location(location_id).await?;
        actor.require_location_manager(location.admin_id.as_deref())?;

        let record = self
            .ledger
            .set_capacity(location_id, date, total_spots, holdback_spots)
            .await?;
        tracing::info!(
            "Capacity at {} on {} set to {} total / {} holdback by {}",
            location.name,
            date,
            record.total_spots,
            record.holdback_spots,
            actor.id
        );
        Ok(record)
    }

    async fn with_capacity(&self, locations: Vec<Location>, date: NaiveDate) -> CoreResult<Vec<LocationView>> {
        let mut views = Vec::with_capacity(locations.len());
        for location in locations {
            let capacity = self.ledger.summary(location.id, date).await?;
            views.push(LocationView { location, capacity });
        }
        Ok(views)
    }
}

fn day_bounds(date: NaiveDate) -> CoreResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CoreError::Validation(format!("invalid date {}", date)))?;
    let end = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| CoreError::Validation(format!("invalid date {}", date)))?;
    Ok((start.and_utc(), end.and_utc()))
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use gts_core::location::Location;
use gts_core::repository::LocationRepository;
use gts_core::reservation::LocationTriple;
use gts_core::{CoreError, CoreResult};

use crate::capacity::CapacityLedger;

/// Three ranked locations plus the arrival window for a new reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub locations: LocationTriple,
    pub arrival_window_start: DateTime<Utc>,
    pub arrival_window_end: DateTime<Utc>,
    pub hours_remaining: f64,
}

/// Picks primary, backup and emergency stops along a corridor.
///
/// Read-only: allocation never touches the ledger's counters.
pub struct AllocationEngine {
    locations: Arc<dyn LocationRepository>,
    ledger: Arc<CapacityLedger>,
    arrival_window: Duration,
    default_hours_remaining: f64,
}

impl AllocationEngine {
    pub fn new(
        locations: Arc<dyn LocationRepository>,
        ledger: Arc<CapacityLedger>,
        arrival_window_minutes: i64,
        default_hours_remaining: f64,
    ) -> Self {
        Self {
            locations,
            ledger,
            arrival_window: Duration::minutes(arrival_window_minutes),
            default_hours_remaining,
        }
    }

    pub async fn allocate(
        &self,
        corridor_id: Uuid,
        start_eta: DateTime<Utc>,
        preferred_location_id: Option<Uuid>,
        hours_remaining: Option<f64>,
    ) -> CoreResult<AllocationPlan> {
        let hours_remaining = hours_remaining.unwrap_or(self.default_hours_remaining);
        let corridor = self.locations.list_corridor_locations(corridor_id).await?;

        if corridor.len() < 3 {
            return Err(CoreError::InsufficientCorridor { corridor_id, found: corridor.len() });
        }

        let today = CapacityLedger::today();
        let mut available = Vec::with_capacity(corridor.len());
        for location in corridor {
            if self.ledger.has_capacity(location.id, today).await? {
                available.push(location);
            }
        }

        if available.len() < 3 {
            return Err(CoreError::InsufficientCapacity { available: available.len() });
        }

        let locations = rank(available, preferred_location_id)?;

        let latest_stop = Utc::now() + Duration::seconds((hours_remaining * 3600.0).round() as i64);
        if start_eta > latest_stop {
            tracing::warn!(
                "ETA {} for corridor {} is beyond the driver's {:.1} remaining hours",
                start_eta,
                corridor_id,
                hours_remaining
            );
        }

        Ok(AllocationPlan {
            locations,
            arrival_window_start: start_eta - self.arrival_window,
            arrival_window_end: start_eta + self.arrival_window,
            hours_remaining,
        })
    }
}

/// Primary is the preferred stop when available, otherwise the middle of the
/// available list. The rest are ranked by ordinal distance from the primary.
fn rank(mut available: Vec<Location>, preferred: Option<Uuid>) -> CoreResult<LocationTriple> {
    let primary_index = preferred
        .and_then(|id| available.iter().position(|l| l.id == id))
        .unwrap_or(available.len() / 2);
    let primary = available.remove(primary_index);

    // sort_by_key is stable, so ties keep corridor order
    available.sort_by_key(|l| (l.order_in_corridor - primary.order_in_corridor).abs());

    match available.as_slice() {
        [backup, emergency, ..] => Ok(LocationTriple {
            primary: primary.id,
            backup: backup.id,
            emergency: emergency.id,
        }),
        _ => Err(CoreError::InsufficientCapacity { available: available.len() + 1 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gts_core::location::{CapacityRecord, Corridor};
    use gts_core::settings::CapacitySettings;
    use gts_core::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        engine: AllocationEngine,
        corridor: Corridor,
        stops: Vec<Location>,
    }

    async fn corridor_with(ordinals: &[i32]) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let corridor = Corridor::new("I-80 Midwest");
        store.add_corridor(corridor.clone()).await;

        let mut stops = Vec::new();
        for (i, ordinal) in ordinals.iter().enumerate() {
            let stop = Location::new(corridor.id, format!("Stop {}", i), 41.0, -90.0 + i as f64 * 0.5, *ordinal);
            store.add_location(stop.clone()).await;
            stops.push(stop);
        }

        let ledger = Arc::new(CapacityLedger::new(store.clone(), CapacitySettings::default()));
        let engine = AllocationEngine::new(store.clone(), ledger, 30, 3.5);
        Fixture { store, engine, corridor, stops }
    }

    async fn fill(store: &InMemoryStore, location: &Location) {
        store
            .put_capacity(CapacityRecord::new(location.id, CapacityLedger::today(), 10, 2, 8))
            .await;
    }

    #[tokio::test]
    async fn test_allocate_picks_middle_and_neighbours() {
        let f = corridor_with(&[1, 2, 3, 4, 5]).await;
        let eta = Utc::now() + Duration::hours(2);

        let plan = f.engine.allocate(f.corridor.id, eta, None, None).await.unwrap();

        assert_eq!(plan.locations.primary, f.stops[2].id);
        // Ordinals 2 and 4 tie; the earlier one wins
        assert_eq!(plan.locations.backup, f.stops[1].id);
        assert_eq!(plan.locations.emergency, f.stops[3].id);
        assert_eq!(plan.arrival_window_start, eta - Duration::minutes(30));
        assert_eq!(plan.arrival_window_end, eta + Duration::minutes(30));
        assert_eq!(plan.hours_remaining, 3.5);
    }

    #[tokio::test]
    async fn test_allocate_honours_preferred_location() {
        let f = corridor_with(&[10, 20, 30, 40]).await;
        let plan = f
            .engine
            .allocate(f.corridor.id, Utc::now(), Some(f.stops[0].id), Some(6.0))
            .await
            .unwrap();

        assert_eq!(plan.locations.primary, f.stops[0].id);
        assert_eq!(plan.locations.backup, f.stops[1].id);
        assert_eq!(plan.locations.emergency, f.stops[2].id);
        assert_eq!(plan.hours_remaining, 6.0);
        assert!(plan.locations.is_distinct());
    }

    #[tokio::test]
    async fn test_full_preferred_location_is_skipped() {
        let f = corridor_with(&[1, 2, 3, 4]).await;
        fill(&f.store, &f.stops[0]).await;

        let plan = f
            .engine
            .allocate(f.corridor.id, Utc::now(), Some(f.stops[0].id), None)
            .await
            .unwrap();

        // Available: ordinals 2, 3, 4; middle is ordinal 3
        assert_eq!(plan.locations.primary, f.stops[2].id);
        assert_ne!(plan.locations.backup, f.stops[0].id);
        assert_ne!(plan.locations.emergency, f.stops[0].id);
    }

    #[tokio::test]
    async fn test_short_corridor_is_rejected() {
        let f = corridor_with(&[1, 2]).await;
        let err = f.engine.allocate(f.corridor.id, Utc::now(), None, None).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientCorridor { found: 2, .. }));
    }

    #[tokio::test]
    async fn test_insufficient_capacity_reports_count() {
        let f = corridor_with(&[1, 2, 3, 4]).await;
        fill(&f.store, &f.stops[1]).await;
        fill(&f.store, &f.stops[3]).await;

        let err = f.engine.allocate(f.corridor.id, Utc::now(), None, None).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientCapacity { available: 2 }));
    }
}

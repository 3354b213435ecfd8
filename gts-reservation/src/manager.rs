use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use gts_catalog::{AllocationEngine, AllocationPlan, CapacityLedger};
use gts_core::codes::{ConfirmationCodeGenerator, RandomHexCodes};
use gts_core::hos::{HosProvider, StaticHosProvider};
use gts_core::location::{CapacityRecord, Location};
use gts_core::notification::{send_best_effort, Channel, LogNotifier, Notification, NotificationSender};
use gts_core::repository::{HistoryEntry, Repositories, ReservationFilter, ReservationRepository};
use gts_core::reservation::{CheckInEvent, Incident, IncidentType, Reservation, ReservationAction};
use gts_core::settings::{EngineSettings, ReservationSettings};
use gts_core::{Actor, CoreError, CoreResult, Role};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReservation {
    pub corridor_id: Uuid,
    pub start_eta: DateTime<Utc>,
    pub preferred_location_id: Option<Uuid>,
    pub hours_remaining: Option<f64>,
}

/// A reservation together with its append-only history.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationDetails {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub check_in_events: Vec<CheckInEvent>,
    pub incidents: Vec<Incident>,
}

/// Result of an ops intervention: the updated reservation and the incident it logged.
#[derive(Debug, Clone, Serialize)]
pub struct Intervention {
    pub reservation: Reservation,
    pub incident: Incident,
}

/// Owns the reservation lifecycle: allocation, capacity claims, and every
/// status change after creation.
pub struct ReservationManager {
    pub(crate) repos: Repositories,
    pub(crate) ledger: Arc<CapacityLedger>,
    allocator: Arc<AllocationEngine>,
    codes: Arc<dyn ConfirmationCodeGenerator>,
    pub(crate) notifier: Arc<dyn NotificationSender>,
    hos: Arc<dyn HosProvider>,
    pub(crate) settings: ReservationSettings,
}

impl ReservationManager {
    pub fn new(repos: Repositories, settings: &EngineSettings) -> Self {
        let ledger = Arc::new(CapacityLedger::new(repos.capacity.clone(), settings.capacity.clone()));
        let allocator = Arc::new(AllocationEngine::new(
            repos.locations.clone(),
            ledger.clone(),
            settings.reservations.arrival_window_minutes,
            settings.hos.default_hours_remaining,
        ));

        Self {
            repos,
            ledger,
            allocator,
            codes: Arc::new(RandomHexCodes::new(settings.reservations.code_prefix.clone())),
            notifier: Arc::new(LogNotifier::new()),
            hos: Arc::new(StaticHosProvider::new(settings.hos.default_hours_remaining)),
            settings: settings.reservations.clone(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_codes(mut self, codes: Arc<dyn ConfirmationCodeGenerator>) -> Self {
        self.codes = codes;
        self
    }

    pub fn with_hos(mut self, hos: Arc<dyn HosProvider>) -> Self {
        self.hos = hos;
        self
    }

    pub fn ledger(&self) -> &Arc<CapacityLedger> {
        &self.ledger
    }

    pub fn allocator(&self) -> &Arc<AllocationEngine> {
        &self.allocator
    }

    pub fn hos(&self) -> &Arc<dyn HosProvider> {
        &self.hos
    }

    /// Allocate without claiming anything.
    pub async fn preview(&self, driver_id: &str, request: &CreateReservation) -> CoreResult<AllocationPlan> {
        let hours = self.hours_hint(driver_id, request.hours_remaining).await?;
        self.allocator
            .allocate(request.corridor_id, request.start_eta, request.preferred_location_id, Some(hours))
            .await
    }

    pub async fn create(&self, actor: &Actor, request: CreateReservation) -> CoreResult<Reservation> {
        actor.require_role(&[Role::Driver])?;

        let plan = self.preview(&actor.id, &request).await?;
        let today = CapacityLedger::today();
        self.ledger.claim(plan.locations.primary, today).await?;

        let reservation = match self.persist_confirmed(&actor.id, &request, &plan, today).await {
            Ok(reservation) => reservation,
            Err(e) => {
                self.release_or_log(plan.locations.primary, today).await;
                return Err(e);
            }
        };

        tracing::info!(
            "Reservation {} confirmed for driver {} at {}",
            reservation.id,
            reservation.driver_id,
            reservation.primary_location_id
        );

        let stop = self.location_name(reservation.primary_location_id).await;
        let notification = Notification::new(
            Channel::Email,
            reservation.driver_id.clone(),
            format!("Your stop at {} is confirmed. Code: {}", stop, reservation.confirmation_code),
        )
        .with_subject("GTS Reservation Confirmed");
        send_best_effort(self.notifier.as_ref(), notification).await;

        Ok(reservation)
    }

    async fn persist_confirmed(
        &self,
        driver_id: &str,
        request: &CreateReservation,
        plan: &AllocationPlan,
        capacity_date: NaiveDate,
    ) -> CoreResult<Reservation> {
        for _ in 0..self.settings.max_code_attempts.max(1) {
            let mut reservation = Reservation::held(
                driver_id,
                request.corridor_id,
                request.start_eta,
                (plan.arrival_window_start, plan.arrival_window_end),
                plan.locations,
                capacity_date,
                self.codes.generate(),
                Some(plan.hours_remaining),
            )?;
            reservation.apply(ReservationAction::Confirm)?;

            if self.repos.reservations.insert_reservation(&reservation).await? {
                return Ok(reservation);
            }
            tracing::debug!("Confirmation code {} already taken, regenerating", reservation.confirmation_code);
        }

        Err(CoreError::Conflict("could not issue a unique confirmation code".to_string()))
    }

    pub async fn find_by_id(&self, id: Uuid) -> CoreResult<Reservation> {
        self.repos
            .reservations
            .get_reservation(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Reservation {}", id)))
    }

    pub async fn details(&self, id: Uuid) -> CoreResult<ReservationDetails> {
        let reservation = self.find_by_id(id).await?;
        let check_in_events = self.repos.check_ins.list_check_ins(id).await?;
        let incidents = self.repos.incidents.list_incidents(id).await?;
        Ok(ReservationDetails { reservation, check_in_events, incidents })
    }

    pub async fn find_by_code(&self, code: &str) -> CoreResult<Reservation> {
        self.repos
            .reservations
            .get_reservation_by_code(code)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Reservation with code {}", code)))
    }

    pub async fn find_by_driver(&self, driver_id: &str) -> CoreResult<Vec<Reservation>> {
        Ok(self.repos.reservations.list_driver_reservations(driver_id).await?)
    }

    /// Filtered listing, newest first, never more than the configured limit.
    pub async fn find_all(&self, mut filter: ReservationFilter) -> CoreResult<Vec<Reservation>> {
        let cap = self.settings.list_limit;
        filter.limit = if filter.limit == 0 { cap } else { filter.limit.min(cap) };
        Ok(self.repos.reservations.list_reservations(&filter).await?)
    }

    pub async fn cancel(&self, id: Uuid, actor: &Actor) -> CoreResult<Reservation> {
        actor.require_role(&[Role::Driver, Role::Ops])?;
        let mut reservation = self.find_by_id(id).await?;
        if actor.role == Role::Driver && reservation.driver_id != actor.id {
            return Err(CoreError::Unauthorized("Drivers may only cancel their own reservations".to_string()));
        }

        let expected = reservation.version;
        reservation.apply(ReservationAction::Cancel)?;
        commit(self.repos.reservations.as_ref(), &mut reservation, expected, None).await?;

        self.release_or_log(reservation.primary_location_id, reservation.capacity_date).await;
        tracing::info!("Reservation {} canceled by {}", id, actor.id);
        Ok(reservation)
    }

    /// Ops override: move the primary slot to `target_location_id`.
    pub async fn reassign(
        &self,
        id: Uuid,
        target_location_id: Uuid,
        actor: &Actor,
        reason: Option<String>,
    ) -> CoreResult<Intervention> {
        actor.require_ops()?;
        let reservation = self.find_by_id(id).await?;
        reservation.check(ReservationAction::Reassign)?;

        if reservation.primary_location_id == target_location_id {
            return Err(CoreError::Validation("Target is already the primary location".to_string()));
        }
        let target = self.find_location(target_location_id).await?;
        let old_name = self.location_name(reservation.primary_location_id).await;

        let notes = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| format!("Reassigned from {} to {} by ops", old_name, target.name));

        let intervention = self
            .move_primary(reservation, ReservationAction::Reassign, &target, IncidentType::ManualOverride, notes, actor, None)
            .await?;

        tracing::info!("Reservation {} reassigned to {} by {}", id, target.id, actor.id);
        Ok(intervention)
    }

    /// Terminal failure of the plan (e.g. the location closed). Releases the primary spot.
    pub async fn mark_failed(&self, id: Uuid, actor: &Actor, notes: String) -> CoreResult<Intervention> {
        actor.require_ops()?;
        let mut reservation = self.find_by_id(id).await?;

        let incident = Incident::new(id, IncidentType::LocationIssue, notes, actor.id.clone());
        let expected = reservation.version;
        reservation.apply(ReservationAction::Fail)?;
        commit(
            self.repos.reservations.as_ref(),
            &mut reservation,
            expected,
            Some(&HistoryEntry::Incident(incident.clone())),
        )
        .await?;
        self.release_or_log(reservation.primary_location_id, reservation.capacity_date).await;

        tracing::warn!("Reservation {} marked FAILED by {}", id, actor.id);
        Ok(Intervention { reservation, incident })
    }

    pub async fn force_add_capacity(&self, location_id: Uuid, actor: &Actor) -> CoreResult<CapacityRecord> {
        actor.require_ops()?;
        self.find_location(location_id).await?;
        let record = self.ledger.force_add_capacity(location_id, CapacityLedger::today()).await?;
        tracing::info!(
            "Ops {} forced extra capacity at {} (total now {})",
            actor.id,
            location_id,
            record.total_spots
        );
        Ok(record)
    }

    /// Record an observation (ETA drift, overflow, a lot problem) without
    /// touching the reservation itself.
    pub async fn log_incident(
        &self,
        reservation_id: Uuid,
        incident_type: IncidentType,
        notes: String,
        actor: &Actor,
    ) -> CoreResult<Incident> {
        actor.require_role(&[Role::Ops, Role::LocationAdmin])?;
        if notes.trim().is_empty() {
            return Err(CoreError::Validation("incident notes must not be empty".to_string()));
        }
        self.find_by_id(reservation_id).await?;

        let incident = Incident::new(reservation_id, incident_type, notes, actor.id.clone());
        self.repos.incidents.append_incident(&incident).await?;

        tracing::info!(
            "{} incident logged on reservation {} by {}",
            incident_type.as_str(),
            reservation_id,
            actor.id
        );
        Ok(incident)
    }

    pub async fn incidents(&self, reservation_id: Uuid) -> CoreResult<Vec<Incident>> {
        Ok(self.repos.incidents.list_incidents(reservation_id).await?)
    }

    pub async fn recent_incidents(&self, actor: &Actor, limit: Option<usize>) -> CoreResult<Vec<Incident>> {
        actor.require_ops()?;
        let limit = limit.unwrap_or(50).min(self.settings.list_limit);
        Ok(self.repos.incidents.list_recent_incidents(limit).await?)
    }

    /// Claim the target, commit the new primary together with its incident,
    /// then release the old spot on the day it was claimed. A failed commit
    /// hands the target's spot back.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn move_primary(
        &self,
        mut reservation: Reservation,
        action: ReservationAction,
        target: &Location,
        incident_type: IncidentType,
        notes: String,
        actor: &Actor,
        window_end: Option<DateTime<Utc>>,
    ) -> CoreResult<Intervention> {
        let today = CapacityLedger::today();
        let (old_primary, old_date) = (reservation.primary_location_id, reservation.capacity_date);
        let incident = Incident::new(reservation.id, incident_type, notes, actor.id.clone());

        self.ledger.claim(target.id, today).await?;

        let expected = reservation.version;
        let entry = HistoryEntry::Incident(incident.clone());
        let committed = async {
            reservation.move_primary(action, target.id, today)?;
            if let Some(end) = window_end {
                reservation.arrival_window_end = end;
            }
            commit(self.repos.reservations.as_ref(), &mut reservation, expected, Some(&entry)).await
        }
        .await;

        if let Err(e) = committed {
            self.release_or_log(target.id, today).await;
            return Err(e);
        }

        self.release_or_log(old_primary, old_date).await;

        let notification = Notification::new(
            Channel::Sms,
            reservation.driver_id.clone(),
            format!(
                "Your stop has moved to {}. Code: {}",
                target.name, reservation.confirmation_code
            ),
        );
        send_best_effort(self.notifier.as_ref(), notification).await;

        Ok(Intervention { reservation, incident })
    }

    pub(crate) async fn find_location(&self, id: Uuid) -> CoreResult<Location> {
        self.repos
            .locations
            .get_location(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Location {}", id)))
    }

    async fn location_name(&self, id: Uuid) -> String {
        match self.repos.locations.get_location(id).await {
            Ok(Some(location)) => location.name,
            _ => id.to_string(),
        }
    }

    async fn hours_hint(&self, driver_id: &str, hint: Option<f64>) -> CoreResult<f64> {
        match hint {
            Some(hours) if hours.is_finite() && hours >= 0.0 => Ok(hours),
            Some(hours) => Err(CoreError::Validation(format!("hours_remaining must be non-negative, got {}", hours))),
            None => Ok(self.hos.snapshot(driver_id).await.hours_remaining),
        }
    }

    /// Capacity release after the reservation is already committed. There is
    /// nothing left to roll back, so a failure here is logged rather than returned.
    pub(crate) async fn release_or_log(&self, location_id: Uuid, date: NaiveDate) {
        if let Err(e) = self.ledger.release(location_id, date).await {
            tracing::error!("Failed to release capacity at {} on {}: {}", location_id, date, e);
        }
    }
}

/// Write `reservation` back, with its history entry, if nobody else changed it
/// since `expected_version`.
pub(crate) async fn commit(
    repo: &dyn ReservationRepository,
    reservation: &mut Reservation,
    expected_version: i64,
    entry: Option<&HistoryEntry>,
) -> CoreResult<()> {
    reservation.version = expected_version + 1;
    if repo.update_reservation(reservation, expected_version, entry).await? {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "reservation {} was modified concurrently",
            reservation.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gts_core::location::Corridor;
    use gts_core::repository::CapacityRepository;
    use gts_core::{InMemoryStore, ReservationStatus};

    struct FixedCodes(Vec<&'static str>, std::sync::Mutex<usize>);

    impl ConfirmationCodeGenerator for FixedCodes {
        fn generate(&self) -> String {
            let mut i = self.1.lock().unwrap();
            let code = self.0[(*i).min(self.0.len() - 1)];
            *i += 1;
            code.to_string()
        }
    }

    async fn setup() -> (Arc<InMemoryStore>, ReservationManager, Corridor, Vec<Location>) {
        let store = Arc::new(InMemoryStore::new());
        let corridor = Corridor::new("I-95 Northeast");
        store.add_corridor(corridor.clone()).await;
        let mut stops = Vec::new();
        for ordinal in 1..=4 {
            let stop = Location::new(corridor.id, format!("Stop {}", ordinal), 40.0 + ordinal as f64 * 0.1, -75.0, ordinal);
            store.add_location(stop.clone()).await;
            stops.push(stop);
        }
        let manager = ReservationManager::new(Repositories::from_store(store.clone()), &EngineSettings::default());
        (store, manager, corridor, stops)
    }

    fn request(corridor: &Corridor) -> CreateReservation {
        CreateReservation {
            corridor_id: corridor.id,
            start_eta: Utc::now() + Duration::hours(3),
            preferred_location_id: None,
            hours_remaining: None,
        }
    }

    #[tokio::test]
    async fn test_create_requires_driver() {
        let (_, manager, corridor, _) = setup().await;
        let ops = Actor::new("ops-1", Role::Ops);
        let err = manager.create(&ops, request(&corridor)).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_code_collision_is_regenerated() {
        let (store, manager, corridor, _) = setup().await;
        let manager = manager.with_codes(Arc::new(FixedCodes(
            vec!["GTS-AAAAAA", "GTS-AAAAAA", "GTS-BBBBBB"],
            std::sync::Mutex::new(0),
        )));
        let driver = Actor::new("driver-1", Role::Driver);

        let first = manager.create(&driver, request(&corridor)).await.unwrap();
        let second = manager.create(&driver, request(&corridor)).await.unwrap();
        assert_eq!(first.confirmation_code, "GTS-AAAAAA");
        assert_eq!(second.confirmation_code, "GTS-BBBBBB");
        assert_eq!(second.status(), ReservationStatus::Confirmed);

        let sold = store
            .fetch_capacity(second.primary_location_id, CapacityLedger::today())
            .await
            .unwrap()
            .unwrap()
            .sold_spots;
        assert_eq!(sold, 2);
    }

    #[tokio::test]
    async fn test_exhausted_codes_release_the_claim() {
        let (store, manager, corridor, _) = setup().await;
        let manager = manager.with_codes(Arc::new(FixedCodes(vec!["GTS-AAAAAA"], std::sync::Mutex::new(0))));
        let driver = Actor::new("driver-1", Role::Driver);

        let first = manager.create(&driver, request(&corridor)).await.unwrap();
        let err = manager.create(&driver, request(&corridor)).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let record = store
            .fetch_capacity(first.primary_location_id, CapacityLedger::today())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.sold_spots, 1);
    }

    #[tokio::test]
    async fn test_driver_cannot_cancel_someone_elses_reservation() {
        let (_, manager, corridor, _) = setup().await;
        let owner = Actor::new("driver-1", Role::Driver);
        let other = Actor::new("driver-2", Role::Driver);

        let reservation = manager.create(&owner, request(&corridor)).await.unwrap();
        let err = manager.cancel(reservation.id, &other).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));
        assert_eq!(manager.find_by_id(reservation.id).await.unwrap().status(), ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_find_all_is_capped() {
        let (_, manager, corridor, _) = setup().await;
        let driver = Actor::new("driver-1", Role::Driver);
        for _ in 0..3 {
            manager.create(&driver, request(&corridor)).await.unwrap();
        }

        let all = manager.find_all(ReservationFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        let capped = manager
            .find_all(ReservationFilter { limit: 2, ..ReservationFilter::default() })
            .await
            .unwrap();
        assert_eq!(capped.len(), 2);
        assert!(capped[0].created_at >= capped[1].created_at);
    }

    #[tokio::test]
    async fn test_reassign_is_ops_only_and_moves_capacity() {
        let (store, manager, corridor, stops) = setup().await;
        let driver = Actor::new("driver-1", Role::Driver);
        let ops = Actor::new("ops-1", Role::Ops);
        let reservation = manager.create(&driver, request(&corridor)).await.unwrap();
        let target = stops.iter().find(|s| s.id != reservation.primary_location_id).unwrap();

        let err = manager.reassign(reservation.id, target.id, &driver, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));

        let outcome = manager.reassign(reservation.id, target.id, &ops, None).await.unwrap();
        assert_eq!(outcome.reservation.status(), ReservationStatus::Reassigned);
        assert_eq!(outcome.reservation.primary_location_id, target.id);
        assert_eq!(outcome.reservation.backup_location_id, reservation.backup_location_id);
        assert_eq!(outcome.incident.incident_type, IncidentType::ManualOverride);

        let today = CapacityLedger::today();
        let old = store.fetch_capacity(reservation.primary_location_id, today).await.unwrap().unwrap();
        let new = store.fetch_capacity(target.id, today).await.unwrap().unwrap();
        assert_eq!(old.sold_spots, 0);
        assert_eq!(new.sold_spots, 1);
    }

    #[tokio::test]
    async fn test_mark_failed_releases_and_logs() {
        let (store, manager, corridor, _) = setup().await;
        let driver = Actor::new("driver-1", Role::Driver);
        let ops = Actor::new("ops-1", Role::Ops);
        let reservation = manager.create(&driver, request(&corridor)).await.unwrap();

        let outcome = manager
            .mark_failed(reservation.id, &ops, "Lot flooded".to_string())
            .await
            .unwrap();
        assert_eq!(outcome.reservation.status(), ReservationStatus::Failed);
        assert_eq!(outcome.incident.incident_type, IncidentType::LocationIssue);

        let record = store
            .fetch_capacity(reservation.primary_location_id, CapacityLedger::today())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.sold_spots, 0);

        let err = manager.cancel(reservation.id, &ops).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_log_incident_roles_and_types() {
        let (_, manager, corridor, _) = setup().await;
        let driver = Actor::new("driver-1", Role::Driver);
        let attendant = Actor::new("admin-3", Role::LocationAdmin);
        let reservation = manager.create(&driver, request(&corridor)).await.unwrap();

        let err = manager
            .log_incident(reservation.id, IncidentType::EtaDrift, "Running late".to_string(), &driver)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));

        let err = manager
            .log_incident(Uuid::new_v4(), IncidentType::EtaDrift, "Running late".to_string(), &attendant)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let incident = manager
            .log_incident(reservation.id, IncidentType::CapacityOverflow, "Lot overbooked".to_string(), &attendant)
            .await
            .unwrap();
        assert_eq!(incident.incident_type, IncidentType::CapacityOverflow);
        assert_eq!(incident.created_by, "admin-3");

        // Logging never moves the reservation
        let unchanged = manager.find_by_id(reservation.id).await.unwrap();
        assert_eq!(unchanged.status(), ReservationStatus::Confirmed);
        assert_eq!(unchanged.version, reservation.version);
        assert_eq!(manager.incidents(reservation.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_releases_the_day_it_claimed() {
        let (store, manager, corridor, _) = setup().await;
        let driver = Actor::new("driver-1", Role::Driver);
        let reservation = manager.create(&driver, request(&corridor)).await.unwrap();

        // Pretend the spot was claimed yesterday and the cancel lands after midnight
        let today = CapacityLedger::today();
        let yesterday = today.pred_opt().unwrap();
        let primary = reservation.primary_location_id;
        store.put_capacity(CapacityRecord::new(primary, yesterday, 20, 2, 1)).await;
        let mut aged = reservation.clone();
        aged.capacity_date = yesterday;
        aged.version = reservation.version + 1;
        assert!(store.update_reservation(&aged, reservation.version, None).await.unwrap());

        manager.cancel(reservation.id, &driver).await.unwrap();

        let claimed_day = store.fetch_capacity(primary, yesterday).await.unwrap().unwrap();
        let current_day = store.fetch_capacity(primary, today).await.unwrap().unwrap();
        assert_eq!(claimed_day.sold_spots, 0);
        assert_eq!(current_day.sold_spots, 1);
    }
}

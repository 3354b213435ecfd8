use chrono::{Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use gts_catalog::CapacityLedger;
use gts_core::reservation::{IncidentType, Reservation, ReservationAction};
use gts_core::{Actor, CoreError, CoreResult};

use crate::manager::{Intervention, ReservationManager};

/// Which fallback slot a rescue landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RescueTier {
    Backup,
    Emergency,
}

impl RescueTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RescueTier::Backup => "backup",
            RescueTier::Emergency => "emergency",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RescueOutcome {
    pub tier: RescueTier,
    #[serde(flatten)]
    pub intervention: Intervention,
}

impl ReservationManager {
    /// Reroute a driver whose primary stop fell through.
    ///
    /// Moves to the backup when it still has a spot, otherwise to the emergency
    /// location. A tier the driver is already parked on is skipped. If the
    /// emergency location is full too, nothing changes.
    pub async fn rescue_protocol(&self, id: Uuid, actor: &Actor) -> CoreResult<RescueOutcome> {
        actor.require_ops()?;
        let reservation = self.find_by_id(id).await?;
        reservation.check(ReservationAction::Rescue)?;

        let primary = reservation.primary_location_id;
        if reservation.emergency_location_id == primary {
            return Err(CoreError::Validation(
                "Reservation is already at its emergency location".to_string(),
            ));
        }

        let today = CapacityLedger::today();
        let backup_open = reservation.backup_location_id != primary
            && self.ledger.has_capacity(reservation.backup_location_id, today).await?;
        let tier = if backup_open { RescueTier::Backup } else { RescueTier::Emergency };

        let result = self.rescue_to(reservation.clone(), tier, actor).await;

        // The backup can fill between the check and the claim
        let (tier, intervention) = match result {
            Err(CoreError::CapacityExhausted { .. }) if tier == RescueTier::Backup => {
                tracing::warn!("Backup for reservation {} filled during rescue, trying emergency", id);
                let intervention = self.rescue_to(reservation, RescueTier::Emergency, actor).await?;
                (RescueTier::Emergency, intervention)
            }
            other => (tier, other?),
        };

        tracing::warn!(
            "Rescue protocol moved reservation {} to {} location {}",
            id,
            tier.as_str(),
            intervention.reservation.primary_location_id
        );

        Ok(RescueOutcome { tier, intervention })
    }

    async fn rescue_to(
        &self,
        reservation: Reservation,
        tier: RescueTier,
        actor: &Actor,
    ) -> CoreResult<Intervention> {
        let target_id = match tier {
            RescueTier::Backup => reservation.backup_location_id,
            RescueTier::Emergency => reservation.emergency_location_id,
        };
        let target = self.find_location(target_id).await?;
        let window_end = Utc::now() + Duration::minutes(self.settings.rescue_window_minutes);
        let notes = format!(
            "Auto-reassigned to {} location due to ETA drift or capacity issue",
            tier.as_str()
        );

        self.move_primary(
            reservation,
            ReservationAction::Rescue,
            &target,
            IncidentType::RescueProtocol,
            notes,
            actor,
            Some(window_end),
        )
        .await
    }
}

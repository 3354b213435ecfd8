use uuid::Uuid;

/// Topic for reservation lifecycle changes.
pub const RESERVATION_TOPIC: &str = "reservations.status";
/// Topic for ops incidents (rescue, manual override, failures).
pub const INCIDENT_TOPIC: &str = "reservations.incidents";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationConfirmedEvent {
    pub reservation_id: Uuid,
    pub driver_id: String,
    pub corridor_id: Uuid,
    pub confirmation_code: String,
    pub primary_location_id: Uuid,
    pub backup_location_id: Uuid,
    pub emergency_location_id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationStatusChangedEvent {
    pub reservation_id: Uuid,
    pub confirmation_code: String,
    pub status: String,
    pub primary_location_id: Uuid,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct IncidentRecordedEvent {
    pub incident_id: Uuid,
    pub reservation_id: Uuid,
    pub incident_type: String,
    pub notes: String,
    pub created_by: String,
    pub timestamp: i64,
}

/// Envelope pushed to the ops live feed.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpsFeedEvent {
    Confirmed(ReservationConfirmedEvent),
    StatusChanged(ReservationStatusChangedEvent),
    Incident(IncidentRecordedEvent),
}

impl OpsFeedEvent {
    pub fn reservation_id(&self) -> Uuid {
        match self {
            OpsFeedEvent::Confirmed(e) => e.reservation_id,
            OpsFeedEvent::StatusChanged(e) => e.reservation_id,
            OpsFeedEvent::Incident(e) => e.reservation_id,
        }
    }

    /// SSE event name and metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            OpsFeedEvent::Confirmed(_) => "confirmed",
            OpsFeedEvent::StatusChanged(_) => "status_changed",
            OpsFeedEvent::Incident(_) => "incident",
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            OpsFeedEvent::Incident(_) => INCIDENT_TOPIC,
            _ => RESERVATION_TOPIC,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_event_is_tagged() {
        let event = OpsFeedEvent::StatusChanged(ReservationStatusChangedEvent {
            reservation_id: Uuid::new_v4(),
            confirmation_code: "GTS-ABC123".to_string(),
            status: "CANCELED".to_string(),
            primary_location_id: Uuid::new_v4(),
            timestamp: 0,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "status_changed");
        assert_eq!(json["status"], "CANCELED");
        assert_eq!(event.topic(), RESERVATION_TOPIC);
    }
}

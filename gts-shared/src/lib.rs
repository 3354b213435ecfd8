pub mod events;
pub mod pii;

pub use events::{
    IncidentRecordedEvent, OpsFeedEvent, ReservationConfirmedEvent, ReservationStatusChangedEvent,
};
pub use pii::Masked;

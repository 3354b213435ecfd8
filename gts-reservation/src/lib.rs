pub mod checkin;
pub mod locations;
pub mod manager;
pub mod rescue;

pub use checkin::{ArrivalOutcome, CheckInOutcome, CheckInService};
pub use locations::{LocationService, LocationView};
pub use manager::{CreateReservation, Intervention, ReservationDetails, ReservationManager};
pub use rescue::{RescueOutcome, RescueTier};

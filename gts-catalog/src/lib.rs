pub mod allocation;
pub mod capacity;

pub use allocation::{AllocationEngine, AllocationPlan};
pub use capacity::CapacityLedger;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A highway corridor; its locations are stored separately and ordered by ordinal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Corridor {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl Corridor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
        }
    }
}

/// A truck stop. Belongs to exactly one corridor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub corridor_id: Uuid,
    /// Position along the corridor in travel order. Gaps are allowed.
    pub order_in_corridor: i32,
    pub admin_id: Option<String>,
    pub timezone: String,
    pub reliability_score: f64,
}

impl Location {
    pub fn new(corridor_id: Uuid, name: impl Into<String>, lat: f64, lng: f64, order_in_corridor: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: String::new(),
            lat,
            lng,
            corridor_id,
            order_in_corridor,
            admin_id: None,
            timezone: "America/New_York".to_string(),
            reliability_score: 1.0,
        }
    }
}

/// Spot accounting for one location on one calendar date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityRecord {
    pub location_id: Uuid,
    pub date: NaiveDate,
    pub total_spots: i32,
    /// Buffer never sold to drivers.
    pub holdback_spots: i32,
    pub sold_spots: i32,
    /// Bumped on every committed mutation.
    pub version: i64,
}

impl CapacityRecord {
    pub fn new(location_id: Uuid, date: NaiveDate, total_spots: i32, holdback_spots: i32, sold_spots: i32) -> Self {
        Self {
            location_id,
            date,
            total_spots,
            holdback_spots,
            sold_spots,
            version: 0,
        }
    }

    /// Spots that may ever be sold: total minus holdback.
    pub fn sellable(&self) -> i32 {
        self.total_spots - self.holdback_spots
    }

    pub fn available(&self) -> i32 {
        self.sellable() - self.sold_spots
    }

    pub fn has_capacity(&self) -> bool {
        self.available() > 0
    }

    /// `0 <= holdback <= total` and `0 <= sold <= total - holdback`.
    pub fn is_consistent(&self) -> bool {
        self.holdback_spots >= 0
            && self.holdback_spots <= self.total_spots
            && self.sold_spots >= 0
            && self.sold_spots <= self.sellable()
    }

    pub fn summary(&self) -> CapacitySummary {
        CapacitySummary {
            location_id: self.location_id,
            date: self.date,
            total_spots: self.total_spots,
            holdback_spots: self.holdback_spots,
            sold_spots: self.sold_spots,
            available_spots: self.available(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacitySummary {
    pub location_id: Uuid,
    pub date: NaiveDate,
    pub total_spots: i32,
    pub holdback_spots: i32,
    pub sold_spots: i32,
    pub available_spots: i32,
}

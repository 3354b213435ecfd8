use serde::{Deserialize, Serialize};

use crate::geo::distance_m;
use crate::settings::GeofenceSettings;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeofenceCheck {
    pub distance: f64,
    pub valid: bool,
}

/// Stateless check of a reported position against a location's geofence.
#[derive(Debug, Clone)]
pub struct GeofenceValidator {
    radius_meters: f64,
    hard_reject_factor: f64,
    confidence_decay_meters: f64,
}

impl GeofenceValidator {
    pub fn new(settings: &GeofenceSettings) -> Self {
        Self {
            radius_meters: settings.radius_meters,
            hard_reject_factor: settings.hard_reject_factor,
            confidence_decay_meters: settings.confidence_decay_meters,
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius_meters
    }

    pub fn validate(&self, lat: f64, lng: f64, location_lat: f64, location_lng: f64) -> GeofenceCheck {
        self.validate_with_radius(lat, lng, location_lat, location_lng, self.radius_meters)
    }

    pub fn validate_with_radius(
        &self,
        lat: f64,
        lng: f64,
        location_lat: f64,
        location_lng: f64,
        radius_meters: f64,
    ) -> GeofenceCheck {
        let distance = distance_m(lat, lng, location_lat, location_lng);
        GeofenceCheck {
            distance,
            valid: distance <= radius_meters,
        }
    }

    /// Beyond this distance a driver check-in is rejected instead of scored.
    pub fn max_check_in_distance(&self) -> f64 {
        self.radius_meters * self.hard_reject_factor
    }

    /// 1.0 inside the radius, then linear decay to 0.
    pub fn confidence(&self, distance: f64) -> f64 {
        if distance <= self.radius_meters {
            1.0
        } else {
            (1.0 - (distance - self.radius_meters) / self.confidence_decay_meters).max(0.0)
        }
    }
}

impl Default for GeofenceValidator {
    fn default() -> Self {
        Self::new(&GeofenceSettings::default())
    }
}

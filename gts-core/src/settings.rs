use serde::{Deserialize, Serialize};

/// Engine tunables, passed explicitly into each component constructor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub geofence: GeofenceSettings,
    pub hos: HosSettings,
    pub capacity: CapacitySettings,
    pub reservations: ReservationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceSettings {
    pub radius_meters: f64,
    /// Check-ins further than `radius * hard_reject_factor` are rejected outright.
    pub hard_reject_factor: f64,
    /// Distance beyond the radius over which confidence decays linearly to zero.
    pub confidence_decay_meters: f64,
}

impl Default for GeofenceSettings {
    fn default() -> Self {
        Self {
            radius_meters: 500.0,
            hard_reject_factor: 3.0,
            confidence_decay_meters: 5000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HosSettings {
    pub default_hours_remaining: f64,
}

impl Default for HosSettings {
    fn default() -> Self {
        Self { default_hours_remaining: 3.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacitySettings {
    /// When true a missing (location, date) record counts as available and a
    /// claim provisions a default record. When false, missing records fail closed.
    pub auto_provision: bool,
    pub default_total_spots: i32,
    pub default_holdback_spots: i32,
    pub max_commit_attempts: u32,
}

impl Default for CapacitySettings {
    fn default() -> Self {
        Self {
            auto_provision: true,
            default_total_spots: 20,
            default_holdback_spots: 2,
            max_commit_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationSettings {
    pub arrival_window_minutes: i64,
    pub rescue_window_minutes: i64,
    pub code_prefix: String,
    pub max_code_attempts: u32,
    pub list_limit: usize,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            arrival_window_minutes: 30,
            rescue_window_minutes: 60,
            code_prefix: "GTS-".to_string(),
            max_code_attempts: 5,
            list_limit: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let json = r#"{ "geofence": { "radius_meters": 250.0 }, "capacity": { "auto_provision": false } }"#;
        let settings: EngineSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.geofence.radius_meters, 250.0);
        assert_eq!(settings.geofence.hard_reject_factor, 3.0);
        assert!(!settings.capacity.auto_provision);
        assert_eq!(settings.capacity.default_total_spots, 20);
        assert_eq!(settings.hos.default_hours_remaining, 3.5);
        assert_eq!(settings.reservations.code_prefix, "GTS-");
    }
}

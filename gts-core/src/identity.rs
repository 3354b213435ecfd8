use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CoreError, CoreResult};

/// Roles issued by the identity provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Driver,
    Ops,
    LocationAdmin,
    FleetAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Driver => "DRIVER",
            Role::Ops => "OPS",
            Role::LocationAdmin => "LOCATION_ADMIN",
            Role::FleetAdmin => "FLEET_ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRIVER" => Ok(Role::Driver),
            "OPS" => Ok(Role::Ops),
            "LOCATION_ADMIN" => Ok(Role::LocationAdmin),
            "FLEET_ADMIN" => Ok(Role::FleetAdmin),
            other => Err(CoreError::Validation(format!("unknown role {}", other))),
        }
    }
}

/// The opaque user identity plus role handed to the engine by the auth layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn require_role(&self, allowed: &[Role]) -> CoreResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(CoreError::Unauthorized(format!(
                "role {} may not perform this action",
                self.role
            )))
        }
    }

    pub fn require_ops(&self) -> CoreResult<()> {
        self.require_role(&[Role::Ops])
    }

    /// Ops may manage every location; a location admin only the ones they run.
    pub fn require_location_manager(&self, admin_id: Option<&str>) -> CoreResult<()> {
        match self.role {
            Role::Ops => Ok(()),
            Role::LocationAdmin if admin_id == Some(self.id.as_str()) => Ok(()),
            _ => Err(CoreError::Unauthorized("Not authorized for this location".to_string())),
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role an actor acts under. Roles are assigned upstream; this crate only
/// reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Admin,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown actor role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for ActorRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            "system" => Ok(Self::System),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Whoever issued an operation. Recorded on every audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }

    pub fn customer(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ActorRole::Customer)
    }

    pub fn admin(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, ActorRole::Admin)
    }

    /// The actor used for work the service does on its own behalf.
    pub fn system(name: impl Into<String>) -> Self {
        Self::new("system", name, ActorRole::System)
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.id, self.role)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Authorization level assigned to a user by the identity provider.
///
/// The set is closed: a role string that does not parse is rejected at the
/// boundary and never reaches the permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "manager")]
    Manager,
    #[serde(rename = "senior_dc", alias = "senior-operator")]
    SeniorDc,
    #[serde(rename = "dc", alias = "operator")]
    Dc,
    #[serde(rename = "analyst")]
    Analyst,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Manager,
        Role::SeniorDc,
        Role::Dc,
        Role::Analyst,
    ];

    /// Roles that are allowed to author projects, records and scenarios.
    pub const CONTRIBUTORS: &'static [Role] = &[Role::Admin, Role::Manager, Role::SeniorDc, Role::Dc];

    /// Roles that may delete shared artifacts.
    pub const LEADS: &'static [Role] = &[Role::Admin, Role::Manager];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::SeniorDc => "senior_dc",
            Role::Dc => "dc",
            Role::Analyst => "analyst",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "senior_dc" | "senior-dc" | "senior-operator" => Ok(Role::SeniorDc),
            "dc" | "operator" => Ok(Role::Dc),
            "analyst" => Ok(Role::Analyst),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

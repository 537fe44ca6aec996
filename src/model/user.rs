//! Console users: profile rows plus their role assignments.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::wire_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[default]
    #[serde(rename = "funcionario")]
    Staff,
}

wire_enum!(Role {
    Admin => "admin",
    Staff => "funcionario",
});

/// A profile row joined with its roles.
///
/// Every user carries exactly one role in practice; the list mirrors the
/// `user_roles` table, which does not enforce that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
}

impl UserProfile {
    /// First assigned role, falling back to staff like the role editor does.
    #[cfg(test)]
    #[must_use]
    pub fn primary_role(&self) -> Role {
        self.roles.first().copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProfileRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

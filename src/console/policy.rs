//! Authorization: `{subject, action} -> allow | deny`.
//!
//! Callers read the subject's roles from the record store right before the
//! privileged step, then ask the policy. The policy itself holds no state.

use serde::Serialize;
use uuid::Uuid;

use crate::model::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
}

impl Subject {
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Create accounts and change roles.
    ManageUsers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

pub trait Authorizer: Send + Sync {
    fn decide(&self, subject: &Subject, action: Action) -> Decision;
}

/// Only admins manage users. Record edits and personal settings are open to
/// every signed-in user and never reach the policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl Authorizer for RolePolicy {
    fn decide(&self, subject: &Subject, action: Action) -> Decision {
        match action {
            Action::ManageUsers if subject.has_role(Role::Admin) => Decision::Allow,
            Action::ManageUsers => Decision::Deny("Apenas administradores podem gerenciar usuários"),
        }
    }
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;

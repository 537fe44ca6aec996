//! CRM entities as stored by the backend.
//!
//! DESIGN
//! ======
//! Records are passive rows owned by the backend. Enum values keep the
//! backend's wire strings (`novo`, `enviada`, `entrada`, ...) so rows written
//! by other clients of the same tables round-trip unchanged.

pub mod lead;
pub mod project;
pub mod proposal;
pub mod settings;
pub mod transaction;
pub mod user;

pub use lead::{Lead, LeadStatus, LeadUpdate, NewLeadRow};
pub use project::{NewProjectRow, Project, ProjectStatus};
pub use proposal::{NewProposalRow, Proposal, ProposalStatus, ProposalUpdate};
pub use settings::{DEFAULT_PRIMARY_COLOR, Settings};
pub use transaction::{NewTransactionRow, Transaction, TransactionKind};
pub use user::{NewProfileRow, Role, UserProfile};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates `as_str`, `parse` and `Display` for a wire-string enum.
macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            #[must_use]
            pub fn parse(raw: &str) -> Option<Self> {
                match raw.trim() {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use wire_enum;

/// Reference entry used by forms that link a record to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientOption {
    pub id: Uuid,
    pub name: String,
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

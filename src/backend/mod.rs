//! Backend collaborators: tables, auth, object storage, realtime changes.
//!
//! ARCHITECTURE
//! ============
//! The console never talks to Postgres or the filesystem directly. It goes
//! through four seams, each a trait object held by `Backend`:
//! - `RecordStore`: table reads and single-row mutations
//! - `AuthProvider`: credentials, sessions, session-change events
//! - `ObjectStorage`: public bucket uploads
//! - `ChangeFeed`: coarse insert/update/delete notifications per table
//!
//! Production wires the Postgres and filesystem implementations; tests wire
//! the in-memory ones from `backend::memory`.

pub mod auth;
#[cfg(test)]
pub mod memory;
pub mod realtime;
pub mod records;
pub mod storage;

use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

pub use auth::{AuthProvider, Identity, SessionEvent, SignUp};
pub use realtime::ChangeFeed;
pub use records::RecordStore;
pub use storage::ObjectStorage;

use crate::error::ErrorCode;

// =============================================================================
// TABLES & CHANGES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Clients,
    Proposals,
    Transactions,
    Projects,
    Profiles,
    UserRoles,
    Settings,
}

impl Table {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clients => "clients",
            Self::Proposals => "proposals",
            Self::Transactions => "transactions",
            Self::Projects => "projects",
            Self::Profiles => "profiles",
            Self::UserRoles => "user_roles",
            Self::Settings => "settings",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "clients" => Some(Self::Clients),
            "proposals" => Some(Self::Proposals),
            "transactions" => Some(Self::Transactions),
            "projects" => Some(Self::Projects),
            "profiles" => Some(Self::Profiles),
            "user_roles" => Some(Self::UserRoles),
            "settings" => Some(Self::Settings),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Map a trigger `TG_OP` value (`INSERT`, `UPDATE`, `DELETE`).
    #[must_use]
    pub fn from_tg_op(op: &str) -> Option<Self> {
        match op.to_ascii_uppercase().as_str() {
            "INSERT" => Some(Self::Insert),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One row changed somewhere in `table`. Carries no usable payload; it is a
/// refetch trigger only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend refused the operation; the message is shown to the user.
    #[error("{0}")]
    Rejected(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl ErrorCode for BackendError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "E_REMOTE",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
            Self::Storage(_) => "E_STORAGE",
            Self::Hashing(_) => "E_INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Rejected(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Storage(_) | Self::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// =============================================================================
// BUNDLE
// =============================================================================

/// The set of collaborators the console runs against.
#[derive(Clone)]
pub struct Backend {
    pub records: Arc<dyn RecordStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub changes: ChangeFeed,
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

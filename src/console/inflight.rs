//! Duplicate-submission guard.
//!
//! DESIGN
//! ======
//! A submit holds a slot keyed by `(user, form)` for as long as its remote
//! call runs; a second submit of the same form by the same user is refused
//! until the first finishes. Every guarded call is also bounded by a
//! timeout, so a hung backend releases the slot instead of leaving the form
//! busy forever.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::http::StatusCode;
use tracing::warn;
use uuid::Uuid;

use crate::error::ErrorCode;

type Slot = (Uuid, &'static str);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("a submission of this form is already in progress")]
    Busy,
    #[error("the backend did not answer within {0:?}")]
    TimedOut(Duration),
}

impl ErrorCode for GuardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Busy => "E_BUSY",
            Self::TimedOut(_) => "E_TIMEOUT",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Busy => StatusCode::CONFLICT,
            Self::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

#[derive(Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<Slot>>>,
}

/// Holds a slot until dropped.
pub struct InFlightGuard {
    registry: InFlight,
    slot: Slot,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.slot);
    }
}

impl InFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `(user_id, form)`, or `None` if it is taken.
    #[must_use]
    pub fn try_begin(&self, user_id: Uuid, form: &'static str) -> Option<InFlightGuard> {
        let slot = (user_id, form);
        let inserted = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot);
        inserted.then(|| InFlightGuard { registry: self.clone(), slot })
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_busy(&self, user_id: Uuid, form: &'static str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(user_id, form))
    }

    /// Run `work` holding the slot, bounded by `limit`.
    ///
    /// # Errors
    ///
    /// `Busy` if the slot is taken (`work` is not polled); `TimedOut` if
    /// `work` outlives `limit` (it is dropped and the slot released).
    pub async fn run<T>(
        &self,
        user_id: Uuid,
        form: &'static str,
        limit: Duration,
        work: impl Future<Output = T>,
    ) -> Result<T, GuardError> {
        let _guard = self.try_begin(user_id, form).ok_or(GuardError::Busy)?;
        tokio::time::timeout(limit, work).await.map_err(|_| {
            warn!(%user_id, form, ?limit, "inflight: submit timed out");
            GuardError::TimedOut(limit)
        })
    }
}

#[cfg(test)]
#[path = "inflight_test.rs"]
mod tests;

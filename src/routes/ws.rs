//! WebSocket handler — live list snapshots.
//!
//! DESIGN
//! ======
//! One socket follows one list. On upgrade the handler mounts a `LiveList`
//! for the requested view and enters a `select!` loop:
//! - each published snapshot is sent to the client as a JSON text frame
//! - client close (or a failed send) ends the loop
//!
//! Dropping the `LiveList` at the end of the loop stops its refetch task and
//! unsubscribes it from the change feed.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → initial snapshot (version 1)
//! 2. Change on a watched table → refetch → next snapshot
//! 3. Close → unmount

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::auth::AuthUser;
use super::records::lead_filter;
use crate::console::list::{self, ListSource, LiveList, Snapshot};
use crate::error::ApiError;
use crate::model::LeadStatus;
use crate::state::AppState;

/// Which list a socket follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveView {
    Leads(Option<LeadStatus>),
    Proposals,
    Transactions,
    Projects,
    Users,
}

impl LiveView {
    /// Parse `view` and, for leads, the optional `status` filter.
    pub(crate) fn from_params(params: &HashMap<String, String>) -> Result<Self, ApiError> {
        let view = params.get("view").map(String::as_str).unwrap_or_default();
        match view {
            "leads" => {
                let status = params.get("status").map(String::as_str).unwrap_or_default();
                Ok(Self::Leads(lead_filter(status)?))
            }
            "proposals" => Ok(Self::Proposals),
            "transactions" => Ok(Self::Transactions),
            "projects" => Ok(Self::Projects),
            "users" => Ok(Self::Users),
            other => Err(ApiError::bad_request(format!("unknown view: {other:?}"))),
        }
    }
}

#[derive(Serialize)]
struct SnapshotFrame<'a, T: Serialize> {
    view: &'static str,
    #[serde(flatten)]
    snapshot: &'a Snapshot<T>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let view = match LiveView::from_params(&params) {
        Ok(view) => view,
        Err(e) => return e.into_response(),
    };
    let user_id = user.identity.id;

    ws.on_upgrade(move |socket| async move {
        match view {
            LiveView::Leads(status) => run_list::<list::Leads>(socket, state, user_id, status).await,
            LiveView::Proposals => run_list::<list::Proposals>(socket, state, user_id, ()).await,
            LiveView::Transactions => run_list::<list::Transactions>(socket, state, user_id, ()).await,
            LiveView::Projects => run_list::<list::Projects>(socket, state, user_id, ()).await,
            LiveView::Users => run_list::<list::Users>(socket, state, user_id, ()).await,
        }
    })
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_list<S: ListSource>(mut socket: WebSocket, state: AppState, user_id: Uuid, filter: S::Filter) {
    let mut live = LiveList::<S>::mount(state.backend.records.clone(), &state.backend.changes, filter).await;
    info!(%user_id, list = S::NAME, "ws: list mounted");

    if send_snapshot::<S>(&mut socket, &live.snapshot()).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            snapshot = live.changed() => {
                let Some(snapshot) = snapshot else { break };
                if send_snapshot::<S>(&mut socket, &snapshot).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(%user_id, list = S::NAME, "ws: list unmounted");
}

async fn send_snapshot<S: ListSource>(socket: &mut WebSocket, snapshot: &Snapshot<S::Item>) -> Result<(), axum::Error> {
    let frame = SnapshotFrame { view: S::NAME, snapshot };
    let text = match serde_json::to_string(&frame) {
        Ok(text) => text,
        Err(e) => {
            warn!(list = S::NAME, error = %e, "ws: snapshot encode failed");
            return Ok(());
        }
    };
    socket.send(Message::Text(text.into())).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

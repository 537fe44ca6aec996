//! User management routes: list, privileged creation, role changes.
//!
//! Creation is a multi-step provisioning run (identity, profile, role) held
//! in the actor's in-flight slot, without the submit timeout. Listing is open
//! to every signed-in user; the response says whether the caller may manage
//! users so the page can hide the admin controls.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::auth::{AuthUser, MaybeAuthUser};
use super::records::{ListPage, ListQuery, load_page, submit_form};
use crate::console::forms::{EditUserRole, Submitted};
use crate::console::inflight::GuardError;
use crate::console::list;
use crate::console::policy::{Action, Subject};
use crate::console::users::{NewUser, ProvisionError, Provisioned, Provisioner};
use crate::error::ApiError;
use crate::model::UserProfile;
use crate::state::AppState;

const CREATE_USER: &str = "user.create";

#[derive(Debug, Serialize)]
pub struct UsersPage {
    #[serde(flatten)]
    pub page: ListPage<UserProfile>,
    pub can_manage: bool,
}

/// `GET /api/users?q=`
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Json<UsersPage> {
    let page = load_page::<list::Users, ()>(&state, (), &query.q, |_| None).await;
    let roles = state.backend.records.roles_for(user.identity.id).await.unwrap_or_else(|e| {
        warn!(user_id = %user.identity.id, error = %e, "users: role lookup failed");
        Vec::new()
    });
    let subject = Subject { user_id: user.identity.id, roles };
    let can_manage = state.policy.decide(&subject, Action::ManageUsers).is_allowed();
    Json(UsersPage { page, can_manage })
}

/// `POST /api/users`: admin-only account provisioning.
pub async fn create_user(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Json(form): Json<NewUser>,
) -> Result<(StatusCode, Json<Provisioned>), ApiError> {
    let provisioner = Provisioner {
        records: state.backend.records.as_ref(),
        auth: state.backend.auth.as_ref(),
        redirect_to: format!("{}/", state.config.public_url),
    };
    let actor = user.identity();

    // Busy guard only: cancelling between steps would skip compensation.
    let _slot = match actor {
        Some(identity) => Some(
            state
                .inflight
                .try_begin(identity.id, CREATE_USER)
                .ok_or(ProvisionError::Guard(GuardError::Busy))?,
        ),
        None => None,
    };
    let provisioned = provisioner.create_user(actor, &form, state.policy.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(provisioned)))
}

/// `PATCH /api/users/{id}/role`
pub async fn update_role(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path(id): Path<Uuid>,
    Json(mut form): Json<EditUserRole>,
) -> Result<Json<Submitted>, ApiError> {
    form.user_id = id;
    submit_form(&state, user.identity(), form).await
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;

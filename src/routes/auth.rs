//! Auth routes: sign-in, self sign-up, sign-out, and the session extractors.
//!
//! DESIGN
//! ======
//! The browser holds an opaque session token in an HttpOnly cookie. Every
//! request that needs an identity resolves it through the auth provider via
//! the same lookup the page gate uses, so a failed lookup reads as signed out
//! everywhere.

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::warn;

use crate::backend::Identity;
use crate::console::session::resolve_identity;
use crate::console::users::{Provisioner, Registration};
use crate::console::validate::{FieldErrors, required_email};
use crate::error::ApiError;
use crate::model::Role;
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";
const SESSION_MAX_AGE_DAYS: i64 = 30;

pub(crate) fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::days(SESSION_MAX_AGE_DAYS))
        .build()
}

pub(crate) fn cleared_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO)
        .build()
}

pub(crate) fn session_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(COOKIE_NAME)
        .map(Cookie::value)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub identity: Identity,
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or_else(ApiError::unauthorized)?;
        let app_state = AppState::from_ref(state);
        let identity = resolve_identity(app_state.backend.auth.as_ref(), Some(&token), app_state.config.remote_timeout)
            .await
            .identity()
            .cloned()
            .ok_or_else(ApiError::unauthorized)?;
        Ok(Self { identity, token })
    }
}

/// Session identity when there is one. Mutation routes take this so the
/// form itself reports the missing session after validating.
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref().map(|user| &user.identity)
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(AuthUser::from_request_parts(parts, state).await.ok()))
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let email = required_email(&mut errors, "email", &self.email);
        if self.password.is_empty() {
            errors.add("password", "Senha é obrigatória");
        }
        errors.finish(|| email)
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub identity: Identity,
    pub roles: Vec<Role>,
}

/// `POST /api/auth/login`: verify credentials, set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = body.validate()?;
    let session = state
        .backend
        .auth
        .sign_in(&email, &body.password)
        .await
        .map_err(|e| {
            warn!(error = %e, "auth: sign in failed");
            ApiError::from_code(&e)
        })?;

    let roles = state.backend.records.roles_for(session.identity.id).await.unwrap_or_else(|e| {
        warn!(user_id = %session.identity.id, error = %e, "auth: role lookup failed");
        Vec::new()
    });
    let jar = jar.add(session_cookie(session.token, state.config.cookie_secure));
    Ok((jar, Json(MeResponse { identity: session.identity, roles })).into_response())
}

/// `POST /api/auth/register`: create a staff account, then sign it in.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<Registration>,
) -> Result<Response, ApiError> {
    let provisioner = Provisioner {
        records: state.backend.records.as_ref(),
        auth: state.backend.auth.as_ref(),
        redirect_to: format!("{}/", state.config.public_url),
    };
    let provisioned = provisioner.register(&form).await?;

    match state.backend.auth.sign_in(&provisioned.identity.email, &form.password).await {
        Ok(session) => {
            let jar = jar.add(session_cookie(session.token, state.config.cookie_secure));
            Ok((StatusCode::CREATED, jar, Json(provisioned)).into_response())
        }
        Err(e) => {
            // Account exists; the visitor can still sign in by hand.
            warn!(user_id = %provisioned.identity.id, error = %e, "auth: sign in after register failed");
            Ok((StatusCode::CREATED, Json(provisioned)).into_response())
        }
    }
}

/// `POST /api/auth/logout`: end the session, clear the cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = state.backend.auth.sign_out(&auth.token).await {
        warn!(user_id = %auth.identity.id, error = %e, "auth: sign out failed");
    }
    let jar = CookieJar::new().add(cleared_cookie(state.config.cookie_secure));
    (jar, StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`: current identity and roles.
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<MeResponse>, ApiError> {
    let roles = state
        .backend
        .records
        .roles_for(auth.identity.id)
        .await
        .map_err(|e| ApiError::from_code(&e))?;
    Ok(Json(MeResponse { identity: auth.identity, roles }))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

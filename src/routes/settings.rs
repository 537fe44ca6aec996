//! Settings routes: the caller's branding settings and theme variables.
//!
//! Every route works on the caller's own `SettingsStore` from the registry.
//! Color and logo changes are optimistic: the response carries the new
//! values even when persisting failed, with an error notice in that case.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum::response::Json;
use serde::Deserialize;

use super::auth::AuthUser;
use crate::console::settings::SettingsView;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ColorRequest {
    pub primary_color: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoUrlRequest {
    pub logo_url: Option<String>,
}

/// `GET /api/settings`
pub async fn get_settings(State(state): State<AppState>, user: AuthUser) -> Json<SettingsView> {
    let (store, notice) = state.settings.store_for(user.identity.id).await;
    Json(store.view(notice).await)
}

/// `PUT /api/settings/color`
pub async fn set_color(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ColorRequest>,
) -> Result<Json<SettingsView>, ApiError> {
    let (store, _) = state.settings.store_for(user.identity.id).await;
    store
        .set_primary_color(&body.primary_color)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_code(&e))
}

/// `PUT /api/settings/logo-url`: set or clear (`null`) the logo link.
pub async fn set_logo_url(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<LogoUrlRequest>,
) -> Json<SettingsView> {
    let (store, _) = state.settings.store_for(user.identity.id).await;
    Json(store.set_logo_url(body.logo_url).await)
}

/// `POST /api/settings/logo`: raw image body, typed by `Content-Type`.
pub async fn upload_logo(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SettingsView>, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let (store, _) = state.settings.store_for(user.identity.id).await;
    store
        .upload_logo(body.to_vec(), content_type)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_code(&e))
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;

//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves three things: the JSON API under `/api`, the
//! websocket live-list feed at `/api/ws`, and the console pages. Page paths
//! go through the session gate and then get the SPA shell. Uploaded branding
//! assets are public under `/storage`, static shell assets under `/assets`.
//!
//! The bucket shares the console's origin, so everything under `/storage` is
//! served sandboxed and with sniffing off: an uploaded file can never run
//! script with a signed-in user's cookie.

pub mod auth;
pub mod pages;
pub mod records;
pub mod settings;
pub mod users;
pub mod ws;

use axum::Router;
use axum::http::header::{CONTENT_SECURITY_POLICY, X_CONTENT_TYPE_OPTIONS};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, patch, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeader;
use tower_http::trace::TraceLayer;

use crate::console::session::Route;
use crate::state::AppState;

/// JSON API and websocket routes.
fn api_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/leads", get(records::list_leads).post(records::create_lead))
        .route("/api/leads/{id}", patch(records::edit_lead))
        .route("/api/clients/options", get(records::client_options))
        .route("/api/proposals", get(records::list_proposals).post(records::create_proposal))
        .route("/api/proposals/form", get(records::proposal_form))
        .route("/api/proposals/{id}", get(records::view_proposal).patch(records::edit_proposal))
        .route("/api/proposals/{id}/form", get(records::edit_proposal_form))
        .route(
            "/api/transactions",
            get(records::list_transactions).post(records::create_transaction),
        )
        .route("/api/transactions/form", get(records::transaction_form))
        .route("/api/projects", get(records::list_projects).post(records::create_project))
        .route("/api/projects/form", get(records::project_form))
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/users/{id}/role", patch(users::update_role))
        .route("/api/settings", get(settings::get_settings))
        .route("/api/settings/color", put(settings::set_color))
        .route("/api/settings/logo-url", put(settings::set_logo_url))
        .route("/api/settings/logo", post(settings::upload_logo))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

/// Every console page, plus the catch-all, behind the session gate.
fn page_routes(state: AppState) -> Router {
    let mut router: Router<AppState> = Router::new();
    for path in Route::PAGES.iter().filter_map(|route| route.path()) {
        router = router.route(path, get(pages::page));
    }
    router.fallback(pages::page).with_state(state)
}

/// Build the complete application router.
pub fn app(state: AppState) -> Router {
    let storage = SetResponseHeader::overriding(
        SetResponseHeader::overriding(
            ServeDir::new(&state.config.storage_dir),
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("sandbox"),
        ),
        X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    let assets = ServeDir::new(state.config.static_dir.join("assets"));

    api_routes(state.clone())
        .nest_service("/storage", storage)
        .nest_service("/assets", assets)
        .merge(page_routes(state))
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

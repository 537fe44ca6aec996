//! Console pages behind the session gate.
//!
//! Every page path (and the catch-all) resolves the session cookie, asks the
//! gate what to do, and either redirects or serves the SPA shell. The shell
//! is `index.html` from the static dir when present, a bare document
//! otherwise. Unknown paths get the shell with a 404 status once signed in.

use axum::extract::{OriginalUri, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use tracing::debug;

use super::auth::COOKIE_NAME;
use crate::console::session::{GateDecision, Route, gate, resolve_identity};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub from: Option<String>,
}

pub async fn page(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<PageQuery>,
    jar: CookieJar,
) -> Response {
    let route = Route::parse(uri.path());
    let token = jar.get(COOKIE_NAME).map(Cookie::value);
    let identity = resolve_identity(state.backend.auth.as_ref(), token, state.config.remote_timeout).await;
    let attempted = uri.path_and_query().map_or_else(|| uri.path(), |pq| pq.as_str());

    match gate(route, &identity, attempted, query.from.as_deref()) {
        GateDecision::Redirect(target) => {
            debug!(path = %uri.path(), %target, "pages: gate redirect");
            Redirect::to(&target).into_response()
        }
        // Pending serves the shell too; it renders its loading state until
        // the session resolves.
        GateDecision::Render | GateDecision::Pending => {
            let status = if route == Route::NotFound { StatusCode::NOT_FOUND } else { StatusCode::OK };
            (status, shell(&state, route).await).into_response()
        }
    }
}

pub(crate) fn title(route: Route) -> &'static str {
    match route {
        Route::Login => "Entrar",
        Route::Register => "Criar conta",
        Route::Dashboard => "Dashboard",
        Route::Leads => "Leads",
        Route::Proposals => "Propostas",
        Route::Finance => "Financeiro",
        Route::Projects => "Projetos",
        Route::Users => "Usuários",
        Route::Settings => "Configurações",
        Route::NotFound => "Página não encontrada",
    }
}

async fn shell(state: &AppState, route: Route) -> Html<String> {
    let index = state.config.static_dir.join("index.html");
    match tokio::fs::read_to_string(&index).await {
        Ok(html) => Html(html),
        Err(_) => Html(format!(
            "<!doctype html><html lang=\"pt-BR\"><head><meta charset=\"utf-8\"><title>{} | Barden CRM</title></head>\
             <body><div id=\"app\" data-route=\"{}\"></div></body></html>",
            title(route),
            route.path().unwrap_or("*"),
        )),
    }
}

#[cfg(test)]
#[path = "pages_test.rs"]
mod tests;

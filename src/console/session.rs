//! Session gate: which page a visitor may see given what we know about them.
//!
//! DESIGN
//! ======
//! Identity resolution has three outcomes (still loading, signed in, signed
//! out) and the gate never renders protected content in the first. Signed-out
//! visitors to a protected route are sent to `/login` carrying the attempted
//! location in `from`; signed-in visitors to `/login` or `/register` are sent
//! back to `from`, or to the dashboard.
//!
//! ERROR HANDLING
//! ==============
//! A failed identity lookup counts as signed out. A lookup that outlives the
//! remote timeout stays `Loading`: pages answer with the bare shell and no
//! redirect, API extractors answer 401. There is no retry; the next request
//! resolves again.

use std::fmt::Write;
use std::time::Duration;

use tracing::warn;

use crate::backend::{AuthProvider, Identity};

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

/// Every page the console serves. Anything else is `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Leads,
    Proposals,
    Finance,
    Projects,
    Users,
    Settings,
    NotFound,
}

impl Route {
    pub const PAGES: &'static [Route] = &[
        Route::Login,
        Route::Register,
        Route::Dashboard,
        Route::Leads,
        Route::Proposals,
        Route::Finance,
        Route::Projects,
        Route::Users,
        Route::Settings,
    ];

    /// Map a request path (query and trailing slash ignored) to a route.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Self::Dashboard,
            "/login" => Self::Login,
            "/register" => Self::Register,
            "/leads" => Self::Leads,
            "/propostas" => Self::Proposals,
            "/financeiro" => Self::Finance,
            "/projetos" => Self::Projects,
            "/usuarios" => Self::Users,
            "/configuracoes" => Self::Settings,
            _ => Self::NotFound,
        }
    }

    #[must_use]
    pub fn path(self) -> Option<&'static str> {
        match self {
            Self::Login => Some("/login"),
            Self::Register => Some("/register"),
            Self::Dashboard => Some("/"),
            Self::Leads => Some("/leads"),
            Self::Proposals => Some("/propostas"),
            Self::Finance => Some("/financeiro"),
            Self::Projects => Some("/projetos"),
            Self::Users => Some("/usuarios"),
            Self::Settings => Some("/configuracoes"),
            Self::NotFound => None,
        }
    }

    /// Only the sign-in and sign-up pages are reachable without a session.
    #[must_use]
    pub fn is_public(self) -> bool {
        matches!(self, Self::Login | Self::Register)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityState {
    Loading,
    Resolved(Option<Identity>),
}

impl IdentityState {
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Resolved(Some(identity)) => Some(identity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Identity still resolving: show a loading indicator, nothing else.
    Pending,
    Redirect(String),
    Render,
}

/// Decide what to do with a visit to `route`.
///
/// `attempted` is the full path and query the visitor asked for; `from` is
/// the already-decoded `from` parameter of a login or register visit.
#[must_use]
pub fn gate(route: Route, state: &IdentityState, attempted: &str, from: Option<&str>) -> GateDecision {
    let IdentityState::Resolved(identity) = state else {
        return GateDecision::Pending;
    };
    match (identity.is_some(), route.is_public()) {
        (false, false) => GateDecision::Redirect(login_redirect(attempted)),
        (true, true) => GateDecision::Redirect(return_target(from).to_owned()),
        _ => GateDecision::Render,
    }
}

/// `/login?from=<attempted>`, percent-encoded.
#[must_use]
pub fn login_redirect(attempted: &str) -> String {
    if attempted.is_empty() || attempted == HOME_PATH {
        return LOGIN_PATH.to_owned();
    }
    format!("{LOGIN_PATH}?from={}", encode_component(attempted))
}

/// Where to land after signing in. Only same-origin paths are honored.
#[must_use]
pub fn return_target(from: Option<&str>) -> &str {
    match from {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            let route = Route::parse(path);
            if route.is_public() { HOME_PATH } else { path }
        }
        _ => HOME_PATH,
    }
}

fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'/') {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

/// Resolve a session token to an identity state. A lookup still running
/// after `limit` leaves the state `Loading`.
pub async fn resolve_identity(auth: &dyn AuthProvider, token: Option<&str>, limit: Duration) -> IdentityState {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return IdentityState::Resolved(None);
    };
    match tokio::time::timeout(limit, auth.current_identity(token)).await {
        Ok(Ok(identity)) => IdentityState::Resolved(identity),
        Ok(Err(e)) => {
            warn!(error = %e, "session: identity lookup failed");
            IdentityState::Resolved(None)
        }
        Err(_) => {
            warn!(?limit, "session: identity lookup still pending");
            IdentityState::Loading
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

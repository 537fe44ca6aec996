//! Auth provider — credentials, session tokens, session-change events.
//!
//! ARCHITECTURE
//! ============
//! Identities live in `auth_users`, separate from the `profiles` table the
//! console lists. Browsers hold a long-lived random session token (HttpOnly
//! cookie); every request resolves it back to an identity.
//!
//! Sign-in and sign-out are broadcast as `SessionEvent`s so process-wide
//! per-user state (the settings registry) can warm up and evict without the
//! auth code knowing about it.

use std::fmt::Write;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use sqlx::{PgPool, Row};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use super::BackendError;

const SESSION_EVENT_CAPACITY: usize = 64;
const INVALID_CREDENTIALS: &str = "Invalid login credentials";

/// The authenticated user as the auth provider knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
}

/// Sign-up request: credential pair, profile metadata, and where the
/// confirmation link should land.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub name: String,
    pub redirect_to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut(Uuid),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;
    async fn sign_up(&self, request: SignUp) -> Result<Identity, BackendError>;
    /// Resolve a session token. Unknown or expired tokens yield `None`.
    async fn current_identity(&self, token: &str) -> Result<Option<Identity>, BackendError>;
    async fn sign_out(&self, token: &str) -> Result<(), BackendError>;
    /// Remove an identity and its sessions.
    async fn delete_identity(&self, user_id: Uuid) -> Result<(), BackendError>;
    fn session_events(&self) -> broadcast::Receiver<SessionEvent>;
}

// =============================================================================
// TOKENS & PASSWORDS
// =============================================================================

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex session token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Hash a password with Argon2id into a PHC string.
///
/// # Errors
///
/// Returns `BackendError::Hashing` if the hasher rejects its input.
pub fn hash_password(password: &str) -> Result<String, BackendError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| BackendError::Hashing(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BackendError::Hashing(e.to_string()))
}

/// Check a password against a stored PHC string. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &str, phc: &str) -> bool {
    PasswordHash::new(phc)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

async fn hash_off_thread(password: String) -> Result<String, BackendError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| BackendError::Hashing(e.to_string()))?
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgAuthProvider {
    pool: PgPool,
    events: broadcast::Sender<SessionEvent>,
}

impl PgAuthProvider {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self { pool, events }
    }
}

#[async_trait]
impl AuthProvider for PgAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let email = email.trim().to_ascii_lowercase();
        let row = sqlx::query("SELECT id, email, name, password_hash FROM auth_users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| BackendError::Rejected(INVALID_CREDENTIALS.into()))?;

        let phc: String = row.get("password_hash");
        let candidate = password.to_owned();
        let matches = tokio::task::spawn_blocking(move || verify_password(&candidate, &phc))
            .await
            .map_err(|e| BackendError::Hashing(e.to_string()))?;
        if !matches {
            return Err(BackendError::Rejected(INVALID_CREDENTIALS.into()));
        }

        let identity = Identity { id: row.get("id"), email: row.get("email"), name: row.get("name") };
        let token = generate_token();
        sqlx::query("INSERT INTO sessions (token, user_id) VALUES ($1, $2)")
            .bind(&token)
            .bind(identity.id)
            .execute(&self.pool)
            .await?;

        info!(user_id = %identity.id, "auth: signed in");
        let _ = self.events.send(SessionEvent::SignedIn(identity.clone()));
        Ok(Session { token, identity })
    }

    async fn sign_up(&self, request: SignUp) -> Result<Identity, BackendError> {
        let email = request.email.trim().to_ascii_lowercase();
        let password_hash = hash_off_thread(request.password).await?;

        let row = sqlx::query(
            r"INSERT INTO auth_users (email, name, password_hash, confirm_redirect)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (email) DO NOTHING
              RETURNING id",
        )
        .bind(&email)
        .bind(&request.name)
        .bind(&password_hash)
        .bind(&request.redirect_to)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| BackendError::Rejected("User already registered".into()))?;

        let identity = Identity { id: row.get("id"), email, name: request.name };
        info!(user_id = %identity.id, redirect_to = %request.redirect_to, "auth: identity created");
        Ok(identity)
    }

    async fn current_identity(&self, token: &str) -> Result<Option<Identity>, BackendError> {
        let row = sqlx::query(
            r"SELECT u.id, u.email, u.name
              FROM sessions s
              JOIN auth_users u ON u.id = s.user_id
              WHERE s.token = $1 AND s.expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Identity { id: r.get("id"), email: r.get("email"), name: r.get("name") }))
    }

    async fn sign_out(&self, token: &str) -> Result<(), BackendError> {
        let row = sqlx::query("DELETE FROM sessions WHERE token = $1 RETURNING user_id")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(r) = row {
            let user_id: Uuid = r.get("user_id");
            info!(%user_id, "auth: signed out");
            let _ = self.events.send(SessionEvent::SignedOut(user_id));
        }
        Ok(())
    }

    async fn delete_identity(&self, user_id: Uuid) -> Result<(), BackendError> {
        sqlx::query("DELETE FROM auth_users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

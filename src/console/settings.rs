//! Settings store: per-user branding (logo, primary color) and the theme
//! variables derived from it.
//!
//! DESIGN
//! ======
//! `SettingsRegistry` lives in `AppState` and hands out one `SettingsStore`
//! per signed-in user. Handlers receive the store explicitly; nothing reads
//! settings from ambient state. The registry follows auth session events:
//! sign-in warms the user's store, sign-out drops it.
//!
//! Updates are optimistic. Local state changes first and is what the caller
//! sees; the upsert follows. A failed upsert produces an error notice and
//! leaves local state as set (no rollback), so the next successful write
//! carries it to the backend. Writes to one store are serialized from the
//! local change through the upsert, so the stored row ends on the same value
//! as local state.
//!
//! ERROR HANDLING
//! ==============
//! A failed load falls back to defaults with an error notice and is not
//! cached, so the next request tries again.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::notice::Notice;
use crate::backend::{BackendError, ObjectStorage, RecordStore, SessionEvent};
use crate::error::ErrorCode;
use crate::model::{DEFAULT_PRIMARY_COLOR, Settings};

pub const LOGO_BUCKET: &str = "branding";
const HOVER_LIGHTNESS_DROP: i32 = 6;

// =============================================================================
// COLOR
// =============================================================================

/// Parse `#RGB` or `#RRGGBB` values into RGB channels.
#[must_use]
pub fn parse_hex_rgb(raw: &str) -> Option<(u8, u8, u8)> {
    let hex = raw.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => Some((
            channel(&hex[0..1].repeat(2))?,
            channel(&hex[1..2].repeat(2))?,
            channel(&hex[2..3].repeat(2))?,
        )),
        6 => Some((channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
        _ => None,
    }
}

/// Hue in degrees, saturation and lightness in percent, each rounded.
#[must_use]
pub fn hex_to_hsl(raw: &str) -> Option<(i32, i32, i32)> {
    let (r, g, b) = parse_hex_rgb(raw)?;
    let (r, g, b) = (f64::from(r) / 255.0, f64::from(g) / 255.0, f64::from(b) / 255.0);

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let (mut h, mut s) = (0.0, 0.0);

    if max > min {
        let d = max - min;
        s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
        h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        h /= 6.0;
    }

    #[allow(clippy::cast_possible_truncation)]
    let round = |v: f64| v.round() as i32;
    Some((round(h * 360.0), round(s * 100.0), round(l * 100.0)))
}

/// CSS custom properties the console theme reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeVars {
    #[serde(rename = "--primary")]
    pub primary: String,
    #[serde(rename = "--primary-hover")]
    pub primary_hover: String,
}

impl ThemeVars {
    /// Derive theme variables from a hex color; unparseable input falls back
    /// to the default color.
    #[must_use]
    pub fn from_hex(hex: &str) -> Self {
        let (h, s, l) = hex_to_hsl(hex)
            .or_else(|| hex_to_hsl(DEFAULT_PRIMARY_COLOR))
            .unwrap_or_default();
        let hover = (l - HOVER_LIGHTNESS_DROP).max(0);
        Self { primary: format!("{h} {s}% {l}%"), primary_hover: format!("{h} {s}% {hover}%") }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid color: {0}")]
    InvalidColor(String),
    #[error("unsupported image type: {0}")]
    UnsupportedImage(String),
    #[error("empty upload")]
    EmptyUpload,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ErrorCode for SettingsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidColor(_) | Self::EmptyUpload => "E_VALIDATION",
            Self::UnsupportedImage(_) => "E_UNSUPPORTED_MEDIA",
            Self::Backend(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidColor(_) | Self::EmptyUpload => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UnsupportedImage(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Backend(e) => e.status(),
        }
    }
}

/// File extension for accepted logo content types. SVG is refused: the bucket
/// is served from the console's own origin and SVG can carry script.
#[must_use]
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// `logos/<user>-<content hash prefix>.<ext>`: a new upload never overwrites
/// an image another tab may still be showing.
#[must_use]
pub fn logo_object_path(user_id: Uuid, bytes: &[u8], ext: &str) -> String {
    let digest = Sha256::digest(bytes);
    let mut prefix = String::with_capacity(16);
    for b in &digest[..8] {
        let _ = write!(prefix, "{b:02x}");
    }
    format!("logos/{user_id}-{prefix}.{ext}")
}

// =============================================================================
// STORE
// =============================================================================

/// Result of a settings mutation: the state the caller should now show, plus
/// a notice when persistence failed.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub settings: Settings,
    pub theme: ThemeVars,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

pub struct SettingsStore {
    user_id: Uuid,
    state: RwLock<Settings>,
    /// Held from a local change until its upsert settles.
    writes: Mutex<()>,
    records: Arc<dyn RecordStore>,
    storage: Arc<dyn ObjectStorage>,
}

impl SettingsStore {
    /// Load one user's settings. A missing row yields defaults; a failed read
    /// yields defaults plus an error notice.
    pub async fn load(
        user_id: Uuid,
        records: Arc<dyn RecordStore>,
        storage: Arc<dyn ObjectStorage>,
    ) -> (Self, Option<Notice>) {
        let (settings, notice) = match records.fetch_settings(user_id).await {
            Ok(Some(settings)) => (settings, None),
            Ok(None) => (Settings::defaults(user_id), None),
            Err(e) => {
                warn!(%user_id, error = %e, "settings: load failed");
                (Settings::defaults(user_id), Some(Notice::error("Erro ao carregar configurações")))
            }
        };
        (Self { user_id, state: RwLock::new(settings), writes: Mutex::new(()), records, storage }, notice)
    }

    pub async fn snapshot(&self) -> Settings {
        self.state.read().await.clone()
    }

    /// Recomputed from the current color on every call.
    #[cfg(test)]
    pub async fn theme(&self) -> ThemeVars {
        ThemeVars::from_hex(&self.state.read().await.primary_color)
    }

    pub async fn view(&self, notice: Option<Notice>) -> SettingsView {
        let settings = self.snapshot().await;
        let theme = ThemeVars::from_hex(&settings.primary_color);
        SettingsView { settings, theme, notice }
    }

    /// # Errors
    ///
    /// Returns `InvalidColor` for anything but `#RGB` / `#RRGGBB`; state is
    /// untouched in that case.
    pub async fn set_primary_color(&self, hex: &str) -> Result<SettingsView, SettingsError> {
        if parse_hex_rgb(hex).is_none() {
            return Err(SettingsError::InvalidColor(hex.to_owned()));
        }
        let color = hex.trim().to_owned();
        let notice = self.apply(|s| s.primary_color = color).await;
        Ok(self.view(notice).await)
    }

    pub async fn set_logo_url(&self, url: Option<String>) -> SettingsView {
        let url = url.map(|u| u.trim().to_owned()).filter(|u| !u.is_empty());
        let notice = self.apply(|s| s.logo_url = url).await;
        self.view(notice).await
    }

    /// Upload a logo image to the public bucket and point the settings at it.
    ///
    /// # Errors
    ///
    /// Rejects empty bodies and non-image content types before any upload;
    /// returns the storage error if the upload fails (settings unchanged).
    pub async fn upload_logo(&self, bytes: Vec<u8>, content_type: &str) -> Result<SettingsView, SettingsError> {
        let ext = image_extension(content_type)
            .ok_or_else(|| SettingsError::UnsupportedImage(content_type.to_owned()))?;
        if bytes.is_empty() {
            return Err(SettingsError::EmptyUpload);
        }
        let path = logo_object_path(self.user_id, &bytes, ext);
        let url = self.storage.upload(LOGO_BUCKET, &path, bytes).await?;
        info!(user_id = %self.user_id, %path, "settings: logo uploaded");
        Ok(self.set_logo_url(Some(url)).await)
    }

    async fn apply(&self, change: impl FnOnce(&mut Settings)) -> Option<Notice> {
        let _ordered = self.writes.lock().await;
        let next = {
            let mut state = self.state.write().await;
            change(&mut state);
            state.clone()
        };
        match self.records.upsert_settings(&next).await {
            Ok(()) => {
                debug!(user_id = %self.user_id, "settings: saved");
                None
            }
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "settings: save failed");
                Some(Notice::error("Erro ao salvar configurações"))
            }
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Clone)]
pub struct SettingsRegistry {
    stores: Arc<RwLock<HashMap<Uuid, Arc<SettingsStore>>>>,
    records: Arc<dyn RecordStore>,
    storage: Arc<dyn ObjectStorage>,
}

impl SettingsRegistry {
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { stores: Arc::new(RwLock::new(HashMap::new())), records, storage }
    }

    /// The user's store, loading it on first use.
    pub async fn store_for(&self, user_id: Uuid) -> (Arc<SettingsStore>, Option<Notice>) {
        if let Some(store) = self.stores.read().await.get(&user_id) {
            return (store.clone(), None);
        }

        let (store, notice) = SettingsStore::load(user_id, self.records.clone(), self.storage.clone()).await;
        let store = Arc::new(store);
        if notice.is_some() {
            return (store, notice);
        }

        let mut stores = self.stores.write().await;
        let entry = stores.entry(user_id).or_insert(store);
        (entry.clone(), None)
    }

    pub async fn evict(&self, user_id: Uuid) {
        if self.stores.write().await.remove(&user_id).is_some() {
            debug!(%user_id, "settings: evicted");
        }
    }

    #[cfg(test)]
    pub async fn cached(&self) -> usize {
        self.stores.read().await.len()
    }

    /// Follow auth session changes until the event source closes.
    pub fn spawn_session_listener(&self, mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::SignedIn(identity)) => {
                        let _ = registry.store_for(identity.id).await;
                    }
                    Ok(SessionEvent::SignedOut(user_id)) => registry.evict(user_id).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "settings: session events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;

//! Per-user branding settings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PRIMARY_COLOR: &str = "#1A75FF";

/// One row per user id, upserted on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub user_id: Uuid,
    pub logo_url: Option<String>,
    pub primary_color: String,
}

impl Settings {
    #[must_use]
    pub fn defaults(user_id: Uuid) -> Self {
        Self { user_id, logo_url: None, primary_color: DEFAULT_PRIMARY_COLOR.to_owned() }
    }
}

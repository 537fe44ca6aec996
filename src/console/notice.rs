//! Transient user notices.
//!
//! A notice is the data behind a toast: the console returns it alongside
//! results and logs it, leaving presentation to the page.

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        let message = message.into();
        info!(%message, "notice");
        Self { level: NoticeLevel::Success, message }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(%message, "notice");
        Self { level: NoticeLevel::Error, message }
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

//! Client projects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::wire_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProjectStatus {
    #[default]
    #[serde(rename = "planejamento")]
    Planning,
    #[serde(rename = "andamento")]
    InProgress,
    #[serde(rename = "revisao")]
    Review,
    #[serde(rename = "concluido")]
    Done,
    #[serde(rename = "cancelado")]
    Cancelled,
}

wire_enum!(ProjectStatus {
    Planning => "planejamento",
    InProgress => "andamento",
    Review => "revisao",
    Done => "concluido",
    Cancelled => "cancelado",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub client_id: Uuid,
    pub client_name: Option<String>,
    pub status: ProjectStatus,
    /// Percent complete, always within `0..=100`.
    pub progress: i32,
    pub responsible: Option<Uuid>,
    pub responsible_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProjectRow {
    pub name: String,
    pub client_id: Uuid,
    pub status: ProjectStatus,
    pub progress: i32,
    pub responsible: Uuid,
}

//! Leads (the `clients` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::wire_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LeadStatus {
    #[default]
    #[serde(rename = "novo")]
    New,
    #[serde(rename = "analise")]
    InAnalysis,
    #[serde(rename = "negociacao")]
    Negotiating,
    #[serde(rename = "aceita")]
    Accepted,
    #[serde(rename = "recusada")]
    Declined,
}

wire_enum!(LeadStatus {
    New => "novo",
    InAnalysis => "analise",
    Negotiating => "negociacao",
    Accepted => "aceita",
    Declined => "recusada",
});

/// A lead or client row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Rows written without a status read back as `novo`.
    pub status: LeadStatus,
    pub source: Option<String>,
    pub potential_value: Option<f64>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload produced by a validated new-lead form.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLeadRow {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub potential_value: Option<f64>,
    pub status: LeadStatus,
    pub created_by: Uuid,
}

/// Update payload produced by a validated edit-lead form.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadUpdate {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub status: LeadStatus,
    pub potential_value: Option<f64>,
}

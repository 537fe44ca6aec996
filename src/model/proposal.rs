//! Commercial proposals sent to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::wire_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProposalStatus {
    #[default]
    #[serde(rename = "enviada")]
    Sent,
    #[serde(rename = "analise")]
    Analysis,
    #[serde(rename = "negociacao")]
    Negotiating,
    #[serde(rename = "aceita")]
    Accepted,
    #[serde(rename = "recusada")]
    Declined,
}

wire_enum!(ProposalStatus {
    Sent => "enviada",
    Analysis => "analise",
    Negotiating => "negociacao",
    Accepted => "aceita",
    Declined => "recusada",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub client_id: Uuid,
    /// Joined from `clients.name`; `None` when the client row is gone.
    pub client_name: Option<String>,
    pub value: f64,
    pub status: ProposalStatus,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProposalRow {
    pub client_id: Uuid,
    pub value: f64,
    pub status: ProposalStatus,
    pub description: String,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProposalUpdate {
    pub client_id: Uuid,
    pub value: f64,
    pub status: ProposalStatus,
    pub description: String,
}

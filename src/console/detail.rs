//! Read-only record views: what a "details" dialog shows for one row.
//!
//! Missing joined or optional values are replaced by the placeholder text the
//! dialog displays, so the page renders the view as-is.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::{Proposal, ProposalStatus};

pub const MISSING_CLIENT: &str = "Cliente não encontrado";
pub const MISSING_DESCRIPTION: &str = "Nenhuma descrição fornecida.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalDetail {
    pub id: Uuid,
    pub client_name: String,
    pub value: f64,
    pub status: ProposalStatus,
    /// Send date, taken from the row's creation time.
    pub created_at: DateTime<Utc>,
    pub description: String,
}

impl From<Proposal> for ProposalDetail {
    fn from(p: Proposal) -> Self {
        Self {
            id: p.id,
            client_name: p.client_name.unwrap_or_else(|| MISSING_CLIENT.to_owned()),
            value: p.value,
            status: p.status,
            created_at: p.created_at,
            description: p
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| MISSING_DESCRIPTION.to_owned()),
        }
    }
}

#[cfg(test)]
#[path = "detail_test.rs"]
mod tests;

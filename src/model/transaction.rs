//! Financial movements (inflows and outflows).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::wire_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransactionKind {
    #[default]
    #[serde(rename = "entrada")]
    Inflow,
    #[serde(rename = "saida")]
    Outflow,
}

wire_enum!(TransactionKind {
    Inflow => "entrada",
    Outflow => "saida",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub description: String,
    pub value: f64,
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub client_id: Option<Uuid>,
    pub client_name: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Value with the sign of its direction: inflows add, outflows subtract.
    #[must_use]
    pub fn signed_value(&self) -> f64 {
        match self.kind {
            TransactionKind::Inflow => self.value,
            TransactionKind::Outflow => -self.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransactionRow {
    pub description: String,
    pub value: f64,
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub client_id: Option<Uuid>,
    pub created_by: Uuid,
}

//! Figures the list pages show above their tables, derived from the loaded
//! items only (no extra queries).

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::model::{Project, ProjectStatus, Proposal, ProposalStatus, Transaction, TransactionKind};

/// Months covered by the finance chart, current month included.
pub const FINANCE_SERIES_MONTHS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalSummary {
    pub total: usize,
    pub accepted: usize,
    pub in_analysis: usize,
    /// Accepted share of all proposals, in whole percent.
    pub conversion_rate: u32,
}

#[must_use]
pub fn proposals(items: &[Proposal]) -> ProposalSummary {
    let count = |status: ProposalStatus| items.iter().filter(|p| p.status == status).count();
    let accepted = count(ProposalStatus::Accepted);
    ProposalSummary {
        total: items.len(),
        accepted,
        in_analysis: count(ProposalStatus::Analysis),
        conversion_rate: percent(accepted, items.len()),
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    (part as f64 / whole as f64 * 100.0).round() as u32
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTotals {
    /// `YYYY-MM`.
    pub month: String,
    pub inflow: f64,
    pub outflow: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinanceSummary {
    pub month_inflow: f64,
    pub month_outflow: f64,
    pub month_net: f64,
    /// Signed sum of every movement ever recorded.
    pub balance: f64,
    /// Oldest month first, ending with the current one.
    pub series: Vec<MonthTotals>,
}

fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

/// The `n`-th month before `(year, month)`.
fn months_back((year, month): (i32, u32), n: u32) -> (i32, u32) {
    #[allow(clippy::cast_possible_wrap)]
    let index = year * 12 + month as i32 - 1 - n as i32;
    #[allow(clippy::cast_sign_loss)]
    let month = index.rem_euclid(12) as u32 + 1;
    (index.div_euclid(12), month)
}

#[must_use]
pub fn finance(items: &[Transaction], today: NaiveDate) -> FinanceSummary {
    let current = month_key(today);
    let mut series: Vec<MonthTotals> = (0..FINANCE_SERIES_MONTHS)
        .rev()
        .map(|n| {
            let (y, m) = months_back(current, n);
            MonthTotals { month: format!("{y:04}-{m:02}"), inflow: 0.0, outflow: 0.0 }
        })
        .collect();

    let (mut month_inflow, mut month_outflow, mut balance) = (0.0, 0.0, 0.0);
    for tx in items {
        balance += tx.signed_value();
        let key = month_key(tx.date);
        if key == current {
            match tx.kind {
                TransactionKind::Inflow => month_inflow += tx.value,
                TransactionKind::Outflow => month_outflow += tx.value,
            }
        }
        let label = format!("{:04}-{:02}", key.0, key.1);
        if let Some(bucket) = series.iter_mut().find(|b| b.month == label) {
            match tx.kind {
                TransactionKind::Inflow => bucket.inflow += tx.value,
                TransactionKind::Outflow => bucket.outflow += tx.value,
            }
        }
    }

    FinanceSummary { month_inflow, month_outflow, month_net: month_inflow - month_outflow, balance, series }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub total: usize,
    pub in_progress: usize,
    pub in_review: usize,
    pub done: usize,
}

#[must_use]
pub fn projects(items: &[Project]) -> ProjectSummary {
    let count = |status: ProjectStatus| items.iter().filter(|p| p.status == status).count();
    ProjectSummary {
        total: items.len(),
        in_progress: count(ProjectStatus::InProgress),
        in_review: count(ProjectStatus::Review),
        done: count(ProjectStatus::Done),
    }
}

#[cfg(test)]
#[path = "summary_test.rs"]
mod tests;

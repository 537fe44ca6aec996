//! Table access: reads ordered by an explicit column, single-row mutations.
//!
//! DESIGN
//! ======
//! One method per query the console issues, typed by entity. Filters are
//! equality predicates only. Mutations never return the written row; views
//! learn about new rows from the change feed.
//!
//! Money columns are `NUMERIC(14,2)` in the schema and cross the wire as
//! `float8` casts.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::BackendError;
use crate::model::{
    ClientOption, Lead, LeadStatus, LeadUpdate, NewLeadRow, NewProfileRow, NewProjectRow, NewProposalRow,
    NewTransactionRow, Project, ProjectStatus, Proposal, ProposalStatus, ProposalUpdate, Role, Settings, Transaction,
    TransactionKind, UserProfile,
};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Leads newest first, optionally restricted to one status.
    async fn list_leads(&self, status: Option<LeadStatus>) -> Result<Vec<Lead>, BackendError>;
    async fn insert_lead(&self, row: NewLeadRow) -> Result<(), BackendError>;
    async fn update_lead(&self, id: Uuid, update: LeadUpdate) -> Result<(), BackendError>;
    /// Client reference list ordered by name.
    async fn client_options(&self) -> Result<Vec<ClientOption>, BackendError>;

    async fn list_proposals(&self) -> Result<Vec<Proposal>, BackendError>;
    /// One proposal with its client name joined in.
    async fn fetch_proposal(&self, id: Uuid) -> Result<Option<Proposal>, BackendError>;
    async fn insert_proposal(&self, row: NewProposalRow) -> Result<(), BackendError>;
    async fn update_proposal(&self, id: Uuid, update: ProposalUpdate) -> Result<(), BackendError>;

    /// Transactions ordered by date, newest first.
    async fn list_transactions(&self) -> Result<Vec<Transaction>, BackendError>;
    async fn insert_transaction(&self, row: NewTransactionRow) -> Result<(), BackendError>;

    async fn list_projects(&self) -> Result<Vec<Project>, BackendError>;
    async fn insert_project(&self, row: NewProjectRow) -> Result<(), BackendError>;

    async fn list_users(&self) -> Result<Vec<UserProfile>, BackendError>;
    async fn insert_profile(&self, row: NewProfileRow) -> Result<(), BackendError>;
    async fn delete_profile(&self, user_id: Uuid) -> Result<(), BackendError>;
    async fn roles_for(&self, user_id: Uuid) -> Result<Vec<Role>, BackendError>;
    async fn insert_role(&self, user_id: Uuid, role: Role) -> Result<(), BackendError>;
    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<(), BackendError>;

    async fn fetch_settings(&self, user_id: Uuid) -> Result<Option<Settings>, BackendError>;
    async fn upsert_settings(&self, settings: &Settings) -> Result<(), BackendError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn lead_from_row(r: &PgRow) -> Lead {
    let status: Option<String> = r.get("status");
    Lead {
        id: r.get("id"),
        name: r.get("name"),
        email: r.get("email"),
        phone: r.get("phone"),
        status: status.as_deref().and_then(LeadStatus::parse).unwrap_or_default(),
        source: r.get("source"),
        potential_value: r.get("potential_value"),
        created_by: r.get("created_by"),
        created_at: r.get("created_at"),
    }
}

fn proposal_from_row(r: &PgRow) -> Proposal {
    let status: Option<String> = r.get("status");
    Proposal {
        id: r.get("id"),
        client_id: r.get("client_id"),
        client_name: r.get("client_name"),
        value: r.get("value"),
        status: status.as_deref().and_then(ProposalStatus::parse).unwrap_or_default(),
        description: r.get("description"),
        created_by: r.get("created_by"),
        created_at: r.get("created_at"),
    }
}

fn transaction_from_row(r: &PgRow) -> Transaction {
    let kind: String = r.get("kind");
    Transaction {
        id: r.get("id"),
        description: r.get("description"),
        value: r.get("value"),
        kind: TransactionKind::parse(&kind).unwrap_or_default(),
        date: r.get("date"),
        client_id: r.get("client_id"),
        client_name: r.get("client_name"),
        created_by: r.get("created_by"),
        created_at: r.get("created_at"),
    }
}

fn project_from_row(r: &PgRow) -> Project {
    let status: String = r.get("status");
    Project {
        id: r.get("id"),
        name: r.get("name"),
        client_id: r.get("client_id"),
        client_name: r.get("client_name"),
        status: ProjectStatus::parse(&status).unwrap_or_default(),
        progress: r.get("progress"),
        responsible: r.get("responsible"),
        responsible_name: r.get("responsible_name"),
        created_at: r.get("created_at"),
    }
}

/// Turn constraint violations into user-facing rejections; keep the rest as
/// database errors.
fn classify(err: sqlx::Error) -> BackendError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() {
            return BackendError::Rejected(db.message().to_owned());
        }
    }
    BackendError::Database(err)
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list_leads(&self, status: Option<LeadStatus>) -> Result<Vec<Lead>, BackendError> {
        let rows = sqlx::query(
            r"SELECT id, name, email, phone, status, source,
                     potential_value::float8 AS potential_value, created_by, created_at
              FROM clients
              WHERE ($1::text IS NULL OR status = $1)
              ORDER BY created_at DESC",
        )
        .bind(status.map(LeadStatus::as_str))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(lead_from_row).collect())
    }

    async fn insert_lead(&self, row: NewLeadRow) -> Result<(), BackendError> {
        sqlx::query(
            r"INSERT INTO clients (name, email, phone, source, potential_value, status, created_by)
              VALUES ($1, $2, $3, $4, $5::float8::numeric, $6, $7)",
        )
        .bind(&row.name)
        .bind(&row.email)
        .bind(&row.phone)
        .bind(&row.source)
        .bind(row.potential_value)
        .bind(row.status.as_str())
        .bind(row.created_by)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn update_lead(&self, id: Uuid, update: LeadUpdate) -> Result<(), BackendError> {
        let result = sqlx::query(
            r"UPDATE clients
              SET name = $2, email = $3, phone = $4, source = $5, status = $6,
                  potential_value = $7::float8::numeric
              WHERE id = $1",
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.email)
        .bind(&update.phone)
        .bind(&update.source)
        .bind(update.status.as_str())
        .bind(update.potential_value)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        if result.rows_affected() == 0 {
            return Err(BackendError::NotFound("lead"));
        }
        Ok(())
    }

    async fn client_options(&self) -> Result<Vec<ClientOption>, BackendError> {
        let rows = sqlx::query_as::<_, (Uuid, String)>("SELECT id, name FROM clients ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id, name)| ClientOption { id, name }).collect())
    }

    async fn list_proposals(&self) -> Result<Vec<Proposal>, BackendError> {
        let rows = sqlx::query(
            r"SELECT p.id, p.client_id, c.name AS client_name, p.value::float8 AS value,
                     p.status, p.description, p.created_by, p.created_at
              FROM proposals p
              LEFT JOIN clients c ON c.id = p.client_id
              ORDER BY p.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(proposal_from_row).collect())
    }

    async fn fetch_proposal(&self, id: Uuid) -> Result<Option<Proposal>, BackendError> {
        let row = sqlx::query(
            r"SELECT p.id, p.client_id, c.name AS client_name, p.value::float8 AS value,
                     p.status, p.description, p.created_by, p.created_at
              FROM proposals p
              LEFT JOIN clients c ON c.id = p.client_id
              WHERE p.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(proposal_from_row))
    }

    async fn insert_proposal(&self, row: NewProposalRow) -> Result<(), BackendError> {
        sqlx::query(
            r"INSERT INTO proposals (client_id, value, status, description, created_by)
              VALUES ($1, $2::float8::numeric, $3, $4, $5)",
        )
        .bind(row.client_id)
        .bind(row.value)
        .bind(row.status.as_str())
        .bind(&row.description)
        .bind(row.created_by)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn update_proposal(&self, id: Uuid, update: ProposalUpdate) -> Result<(), BackendError> {
        let result = sqlx::query(
            r"UPDATE proposals
              SET client_id = $2, value = $3::float8::numeric, status = $4, description = $5
              WHERE id = $1",
        )
        .bind(id)
        .bind(update.client_id)
        .bind(update.value)
        .bind(update.status.as_str())
        .bind(&update.description)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        if result.rows_affected() == 0 {
            return Err(BackendError::NotFound("proposal"));
        }
        Ok(())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, BackendError> {
        let rows = sqlx::query(
            r"SELECT t.id, t.description, t.value::float8 AS value, t.kind, t.date,
                     t.client_id, c.name AS client_name, t.created_by, t.created_at
              FROM transactions t
              LEFT JOIN clients c ON c.id = t.client_id
              ORDER BY t.date DESC, t.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(transaction_from_row).collect())
    }

    async fn insert_transaction(&self, row: NewTransactionRow) -> Result<(), BackendError> {
        sqlx::query(
            r"INSERT INTO transactions (description, value, kind, date, client_id, created_by)
              VALUES ($1, $2::float8::numeric, $3, $4, $5, $6)",
        )
        .bind(&row.description)
        .bind(row.value)
        .bind(row.kind.as_str())
        .bind(row.date)
        .bind(row.client_id)
        .bind(row.created_by)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, BackendError> {
        let rows = sqlx::query(
            r"SELECT pr.id, pr.name, pr.client_id, c.name AS client_name, pr.status, pr.progress,
                     pr.responsible, pf.name AS responsible_name, pr.created_at
              FROM projects pr
              LEFT JOIN clients c ON c.id = pr.client_id
              LEFT JOIN profiles pf ON pf.id = pr.responsible
              ORDER BY pr.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(project_from_row).collect())
    }

    async fn insert_project(&self, row: NewProjectRow) -> Result<(), BackendError> {
        sqlx::query(
            r"INSERT INTO projects (name, client_id, status, progress, responsible)
              VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&row.name)
        .bind(row.client_id)
        .bind(row.status.as_str())
        .bind(row.progress)
        .bind(row.responsible)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, BackendError> {
        let rows = sqlx::query(
            r"SELECT p.id, p.name, p.email,
                     COALESCE(array_agg(r.role ORDER BY r.role) FILTER (WHERE r.role IS NOT NULL), '{}') AS roles
              FROM profiles p
              LEFT JOIN user_roles r ON r.user_id = p.id
              GROUP BY p.id, p.name, p.email
              ORDER BY p.name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let roles: Vec<String> = r.get("roles");
                UserProfile {
                    id: r.get("id"),
                    name: r.get("name"),
                    email: r.get("email"),
                    roles: roles.iter().filter_map(|raw| Role::parse(raw)).collect(),
                }
            })
            .collect())
    }

    async fn insert_profile(&self, row: NewProfileRow) -> Result<(), BackendError> {
        sqlx::query("INSERT INTO profiles (id, name, email) VALUES ($1, $2, $3)")
            .bind(row.id)
            .bind(&row.name)
            .bind(&row.email)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_profile(&self, user_id: Uuid) -> Result<(), BackendError> {
        sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn roles_for(&self, user_id: Uuid) -> Result<Vec<Role>, BackendError> {
        let rows = sqlx::query_scalar::<_, String>("SELECT role FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().filter_map(|raw| Role::parse(raw)).collect())
    }

    async fn insert_role(&self, user_id: Uuid, role: Role) -> Result<(), BackendError> {
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    /// Replace every role row of the user with `role`, in one transaction.
    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<(), BackendError> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(BackendError::NotFound("user role"));
        }
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_settings(&self, user_id: Uuid) -> Result<Option<Settings>, BackendError> {
        let row = sqlx::query("SELECT user_id, logo_url, primary_color FROM settings WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Settings {
            user_id: r.get("user_id"),
            logo_url: r.get("logo_url"),
            primary_color: r.get("primary_color"),
        }))
    }

    async fn upsert_settings(&self, settings: &Settings) -> Result<(), BackendError> {
        sqlx::query(
            r"INSERT INTO settings (user_id, logo_url, primary_color, updated_at)
              VALUES ($1, $2, $3, now())
              ON CONFLICT (user_id) DO UPDATE
              SET logo_url = EXCLUDED.logo_url,
                  primary_color = EXCLUDED.primary_color,
                  updated_at = now()",
        )
        .bind(settings.user_id)
        .bind(&settings.logo_url)
        .bind(&settings.primary_color)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "records_test.rs"]
mod tests;

//! Record form dialogs: create and edit forms with validation.
//!
//! DESIGN
//! ======
//! `FormDialog<F>` is the lifecycle shared by every dialog: open (loading
//! the client reference list when the form needs one), validate, check the
//! acting identity, make exactly one remote mutation, then reset and close.
//! Each entity form only supplies its fields, its schema, and the mutation.
//!
//! Field values arrive as the raw strings the user typed. Validation turns
//! them into typed payloads; currency inputs are coerced with
//! `validate::parse_currency`.
//!
//! ERROR HANDLING
//! ==============
//! Validation and identity failures make no remote call. A remote failure
//! keeps the dialog open with the typed values intact and an error notice.

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::inflight::GuardError;
use super::notice::Notice;
use super::policy::{Action, Authorizer, Decision, Subject};
use super::validate::{
    FieldErrors, optional_amount, optional_email, optional_text, required_amount, required_choice, required_uuid,
    text_between,
};
use crate::backend::{BackendError, Identity, RecordStore};
use crate::error::{ApiError, ErrorCode};
use crate::model::{
    ClientOption, LeadStatus, LeadUpdate, NewLeadRow, NewProjectRow, NewProposalRow, NewTransactionRow,
    ProjectStatus, Proposal, ProposalStatus, ProposalUpdate, Role, TransactionKind,
};

/// What the page should do after a successful submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AfterSubmit {
    /// Nothing: the live list picks the change up from the change feed.
    #[serde(rename = "subscription")]
    Subscription,
    /// Reload the whole page.
    #[serde(rename = "page")]
    FullReload,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("{0}")]
    Invalid(FieldErrors),
    #[error("sign in required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error(transparent)]
    Remote(#[from] BackendError),
    #[error(transparent)]
    Guard(#[from] GuardError),
}

impl ErrorCode for SubmitError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(e) => e.error_code(),
            Self::Unauthenticated => "E_UNAUTHENTICATED",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::Remote(e) => e.error_code(),
            Self::Guard(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(e) => e.status(),
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Remote(e) => e.status(),
            Self::Guard(e) => e.status(),
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Invalid(fields) => fields.into(),
            other => ApiError::from_code(&other),
        }
    }
}

/// Notice text for a failed mutation: the backend's own message when it
/// rejected the request, the form's generic text otherwise.
fn failure_message(err: &BackendError, fallback: &str) -> String {
    match err {
        BackendError::Rejected(message) if !message.is_empty() => message.clone(),
        _ => fallback.to_owned(),
    }
}

// =============================================================================
// FORM TRAIT & DIALOG
// =============================================================================

#[async_trait]
pub trait Form: Default + Send + Sync {
    type Valid: Send + 'static;

    /// Stable name, used for in-flight tracking and logs.
    const KIND: &'static str;
    const NEEDS_CLIENTS: bool = false;
    const AFTER_SUBMIT: AfterSubmit = AfterSubmit::Subscription;
    /// Action the actor must be allowed, checked against freshly read roles.
    const REQUIRES: Option<Action> = None;
    const SUCCESS: &'static str;
    const UNAUTHENTICATED: &'static str;
    const FAILURE: &'static str;

    /// # Errors
    ///
    /// Every failing field, keyed by field name.
    fn validate(&self) -> Result<Self::Valid, FieldErrors>;

    /// The single remote mutation for a validated form.
    async fn persist(valid: Self::Valid, actor: &Identity, records: &dyn RecordStore) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct Submitted {
    pub reload: AfterSubmit,
    pub notice: Notice,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(bound = "F: Serialize")]
pub struct FormDialog<F: Form> {
    pub fields: F,
    pub open: bool,
    pub clients: Vec<ClientOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl<F: Form> FormDialog<F> {
    #[must_use]
    pub fn with_fields(fields: F) -> Self {
        Self { fields, open: true, clients: Vec::new(), notice: None }
    }

    /// Open the dialog. Forms that link to a client load the reference list,
    /// once per call; a failed load leaves the list empty with a notice.
    pub async fn open(&mut self, records: &dyn RecordStore) {
        self.open = true;
        self.notice = None;
        if !F::NEEDS_CLIENTS {
            return;
        }
        match records.client_options().await {
            Ok(clients) => self.clients = clients,
            Err(e) => {
                warn!(form = F::KIND, error = %e, "forms: client list load failed");
                self.clients.clear();
                self.notice = Some(Notice::error("Erro ao carregar lista de clientes"));
            }
        }
    }

    #[cfg(test)]
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Validate, check the actor, and make the form's one mutation.
    ///
    /// # Errors
    ///
    /// See `SubmitError`. Only `Remote` means a call was made.
    pub async fn submit(
        &mut self,
        actor: Option<&Identity>,
        records: &dyn RecordStore,
        policy: &dyn Authorizer,
    ) -> Result<Submitted, SubmitError> {
        let valid = self.fields.validate().map_err(SubmitError::Invalid)?;

        let Some(actor) = actor else {
            self.notice = Some(Notice::error(F::UNAUTHENTICATED));
            return Err(SubmitError::Unauthenticated);
        };

        if let Some(action) = F::REQUIRES {
            let roles = records.roles_for(actor.id).await?;
            let subject = Subject { user_id: actor.id, roles };
            if let Decision::Deny(reason) = policy.decide(&subject, action) {
                self.notice = Some(Notice::error(reason));
                return Err(SubmitError::Forbidden(reason));
            }
        }

        if let Err(e) = F::persist(valid, actor, records).await {
            warn!(form = F::KIND, user_id = %actor.id, error = %e, "forms: submit failed");
            self.notice = Some(Notice::error(failure_message(&e, F::FAILURE)));
            return Err(SubmitError::Remote(e));
        }

        info!(form = F::KIND, user_id = %actor.id, "forms: submitted");
        self.fields = F::default();
        self.open = false;
        let notice = Notice::success(F::SUCCESS);
        self.notice = Some(notice.clone());
        Ok(Submitted { reload: F::AFTER_SUBMIT, notice })
    }
}

// =============================================================================
// LEADS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub source: String,
    pub potential_value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeadDraft {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub potential_value: Option<f64>,
}

fn validate_lead_fields(
    errors: &mut FieldErrors,
    name: &str,
    email: &str,
    phone: &str,
    source: &str,
    potential_value: &str,
) -> LeadDraft {
    LeadDraft {
        name: text_between(errors, "name", "Nome", name, 3, usize::MAX),
        email: optional_email(errors, "email", email),
        phone: optional_text(phone),
        source: optional_text(source),
        potential_value: optional_amount(errors, "potential_value", potential_value),
    }
}

#[async_trait]
impl Form for NewLead {
    type Valid = LeadDraft;

    const KIND: &'static str = "lead.create";
    const SUCCESS: &'static str = "Lead cadastrado com sucesso!";
    const UNAUTHENTICATED: &'static str = "Você precisa estar logado para criar um lead.";
    const FAILURE: &'static str = "Erro ao cadastrar lead.";

    fn validate(&self) -> Result<LeadDraft, FieldErrors> {
        let mut errors = FieldErrors::new();
        let draft = validate_lead_fields(
            &mut errors,
            &self.name,
            &self.email,
            &self.phone,
            &self.source,
            &self.potential_value,
        );
        errors.finish(|| draft)
    }

    async fn persist(valid: LeadDraft, actor: &Identity, records: &dyn RecordStore) -> Result<(), BackendError> {
        records
            .insert_lead(NewLeadRow {
                name: valid.name,
                email: valid.email,
                phone: valid.phone,
                source: valid.source,
                potential_value: valid.potential_value,
                status: LeadStatus::New,
                created_by: actor.id,
            })
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditLead {
    #[serde(skip)]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub source: String,
    pub status: String,
    pub potential_value: String,
}

impl Default for EditLead {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            source: String::new(),
            status: LeadStatus::New.as_str().to_owned(),
            potential_value: String::new(),
        }
    }
}

#[async_trait]
impl Form for EditLead {
    type Valid = (Uuid, LeadUpdate);

    const KIND: &'static str = "lead.edit";
    const SUCCESS: &'static str = "Lead atualizado com sucesso!";
    const UNAUTHENTICATED: &'static str = "Você precisa estar logado para editar um lead.";
    const FAILURE: &'static str = "Erro ao atualizar lead.";

    fn validate(&self) -> Result<(Uuid, LeadUpdate), FieldErrors> {
        let mut errors = FieldErrors::new();
        let draft = validate_lead_fields(
            &mut errors,
            &self.name,
            &self.email,
            &self.phone,
            &self.source,
            &self.potential_value,
        );
        let status = if self.status.trim().is_empty() {
            LeadStatus::New
        } else {
            required_choice(&mut errors, "status", &self.status, LeadStatus::parse, "Status inválido")
        };
        let id = self.id;
        errors.finish(|| {
            (
                id,
                LeadUpdate {
                    name: draft.name,
                    email: draft.email,
                    phone: draft.phone,
                    source: draft.source,
                    status,
                    potential_value: draft.potential_value,
                },
            )
        })
    }

    async fn persist(valid: (Uuid, LeadUpdate), _actor: &Identity, records: &dyn RecordStore) -> Result<(), BackendError> {
        let (id, update) = valid;
        records.update_lead(id, update).await
    }
}

// =============================================================================
// PROPOSALS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalFields {
    pub client_id: String,
    pub value: String,
    pub status: String,
    pub description: String,
}

impl Default for ProposalFields {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            value: String::new(),
            status: ProposalStatus::Sent.as_str().to_owned(),
            description: String::new(),
        }
    }
}

impl ProposalFields {
    fn validate(&self) -> Result<ProposalUpdate, FieldErrors> {
        let mut errors = FieldErrors::new();
        let client_id = required_uuid(&mut errors, "client_id", &self.client_id);
        let value = required_amount(&mut errors, "value", &self.value);
        let status = required_choice(&mut errors, "status", &self.status, ProposalStatus::parse, "Status inválido");
        let description = text_between(&mut errors, "description", "Descrição", &self.description, 10, 1000);
        errors.finish(|| ProposalUpdate { client_id, value, status, description })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewProposal(pub ProposalFields);

#[async_trait]
impl Form for NewProposal {
    type Valid = ProposalUpdate;

    const KIND: &'static str = "proposal.create";
    const NEEDS_CLIENTS: bool = true;
    const SUCCESS: &'static str = "Proposta criada com sucesso!";
    const UNAUTHENTICATED: &'static str = "Você precisa estar logado para criar uma proposta";
    const FAILURE: &'static str = "Erro ao criar proposta";

    fn validate(&self) -> Result<ProposalUpdate, FieldErrors> {
        self.0.validate()
    }

    async fn persist(valid: ProposalUpdate, actor: &Identity, records: &dyn RecordStore) -> Result<(), BackendError> {
        records
            .insert_proposal(NewProposalRow {
                client_id: valid.client_id,
                value: valid.value,
                status: valid.status,
                description: valid.description,
                created_by: actor.id,
            })
            .await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditProposal {
    #[serde(skip)]
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: ProposalFields,
}

impl EditProposal {
    /// Dialog fields as stored on `proposal`, ready to edit.
    #[must_use]
    pub fn from_record(proposal: &Proposal) -> Self {
        Self {
            id: proposal.id,
            fields: ProposalFields {
                client_id: proposal.client_id.to_string(),
                value: proposal.value.to_string(),
                status: proposal.status.as_str().to_owned(),
                description: proposal.description.clone().unwrap_or_default(),
            },
        }
    }
}

#[async_trait]
impl Form for EditProposal {
    type Valid = (Uuid, ProposalUpdate);

    const KIND: &'static str = "proposal.edit";
    const NEEDS_CLIENTS: bool = true;
    const SUCCESS: &'static str = "Proposta atualizada com sucesso!";
    const UNAUTHENTICATED: &'static str = "Você precisa estar logado para editar uma proposta";
    const FAILURE: &'static str = "Erro ao atualizar proposta";

    fn validate(&self) -> Result<(Uuid, ProposalUpdate), FieldErrors> {
        let id = self.id;
        self.fields.validate().map(|update| (id, update))
    }

    async fn persist(
        valid: (Uuid, ProposalUpdate),
        _actor: &Identity,
        records: &dyn RecordStore,
    ) -> Result<(), BackendError> {
        let (id, update) = valid;
        records.update_proposal(id, update).await
    }
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTransaction {
    pub description: String,
    pub value: String,
    pub kind: String,
    /// `YYYY-MM-DD`; defaults to today.
    pub date: String,
    /// Empty for a movement not tied to a client.
    pub client_id: String,
}

impl Default for NewTransaction {
    fn default() -> Self {
        Self {
            description: String::new(),
            value: String::new(),
            kind: TransactionKind::Inflow.as_str().to_owned(),
            date: Utc::now().date_naive().format("%Y-%m-%d").to_string(),
            client_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub description: String,
    pub value: f64,
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub client_id: Option<Uuid>,
}

#[async_trait]
impl Form for NewTransaction {
    type Valid = TransactionDraft;

    const KIND: &'static str = "transaction.create";
    const NEEDS_CLIENTS: bool = true;
    const SUCCESS: &'static str = "Movimentação criada com sucesso!";
    const UNAUTHENTICATED: &'static str = "Você precisa estar logado para criar uma movimentação";
    const FAILURE: &'static str = "Erro ao criar movimentação";

    fn validate(&self) -> Result<TransactionDraft, FieldErrors> {
        let mut errors = FieldErrors::new();
        let description = text_between(&mut errors, "description", "Descrição", &self.description, 3, 200);
        let value = required_amount(&mut errors, "value", &self.value);
        let kind = required_choice(&mut errors, "kind", &self.kind, TransactionKind::parse, "Tipo inválido");

        let date = if self.date.trim().is_empty() {
            errors.add("date", "Data é obrigatória");
            NaiveDate::default()
        } else {
            NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").unwrap_or_else(|_| {
                errors.add("date", "Data inválida");
                NaiveDate::default()
            })
        };

        let client_id = if self.client_id.trim().is_empty() {
            None
        } else {
            Some(required_uuid(&mut errors, "client_id", &self.client_id))
        };

        errors.finish(|| TransactionDraft { description, value, kind, date, client_id })
    }

    async fn persist(valid: TransactionDraft, actor: &Identity, records: &dyn RecordStore) -> Result<(), BackendError> {
        records
            .insert_transaction(NewTransactionRow {
                description: valid.description,
                value: valid.value,
                kind: valid.kind,
                date: valid.date,
                client_id: valid.client_id,
                created_by: actor.id,
            })
            .await
    }
}

// =============================================================================
// PROJECTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewProject {
    pub name: String,
    pub client_id: String,
    pub status: String,
    pub progress: String,
}

impl Default for NewProject {
    fn default() -> Self {
        Self {
            name: String::new(),
            client_id: String::new(),
            status: ProjectStatus::Planning.as_str().to_owned(),
            progress: "0".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDraft {
    pub name: String,
    pub client_id: Uuid,
    pub status: ProjectStatus,
    pub progress: i32,
}

/// Blank counts as 0; fractions are truncated after the range check.
#[allow(clippy::cast_possible_truncation)]
fn parse_progress(errors: &mut FieldErrors, raw: &str) -> i32 {
    let trimmed = raw.trim();
    let value = if trimmed.is_empty() { Some(0.0) } else { trimmed.parse::<f64>().ok() };
    match value {
        Some(v) if (0.0..=100.0).contains(&v) => v.trunc() as i32,
        _ => {
            errors.add("progress", "Progresso deve ser entre 0 e 100");
            0
        }
    }
}

#[async_trait]
impl Form for NewProject {
    type Valid = ProjectDraft;

    const KIND: &'static str = "project.create";
    const NEEDS_CLIENTS: bool = true;
    const AFTER_SUBMIT: AfterSubmit = AfterSubmit::FullReload;
    const SUCCESS: &'static str = "Projeto criado com sucesso!";
    const UNAUTHENTICATED: &'static str = "Você precisa estar logado para criar um projeto";
    const FAILURE: &'static str = "Erro ao criar projeto";

    fn validate(&self) -> Result<ProjectDraft, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = text_between(&mut errors, "name", "Nome", &self.name, 3, 100);
        let client_id = required_uuid(&mut errors, "client_id", &self.client_id);
        let status = required_choice(&mut errors, "status", &self.status, ProjectStatus::parse, "Status inválido");
        let progress = parse_progress(&mut errors, &self.progress);
        errors.finish(|| ProjectDraft { name, client_id, status, progress })
    }

    async fn persist(valid: ProjectDraft, actor: &Identity, records: &dyn RecordStore) -> Result<(), BackendError> {
        records
            .insert_project(NewProjectRow {
                name: valid.name,
                client_id: valid.client_id,
                status: valid.status,
                progress: valid.progress,
                responsible: actor.id,
            })
            .await
    }
}

// =============================================================================
// USER ROLES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditUserRole {
    #[serde(skip)]
    pub user_id: Uuid,
    pub role: String,
}

impl Default for EditUserRole {
    fn default() -> Self {
        Self { user_id: Uuid::nil(), role: Role::Staff.as_str().to_owned() }
    }
}

#[async_trait]
impl Form for EditUserRole {
    type Valid = (Uuid, Role);

    const KIND: &'static str = "user.role";
    const REQUIRES: Option<Action> = Some(Action::ManageUsers);
    const SUCCESS: &'static str = "Função do usuário atualizada com sucesso!";
    const UNAUTHENTICATED: &'static str = "Você precisa estar logado";
    const FAILURE: &'static str = "Erro ao atualizar função do usuário";

    fn validate(&self) -> Result<(Uuid, Role), FieldErrors> {
        let mut errors = FieldErrors::new();
        let role = required_choice(&mut errors, "role", &self.role, Role::parse, "Função inválida");
        let user_id = self.user_id;
        errors.finish(|| (user_id, role))
    }

    async fn persist(valid: (Uuid, Role), _actor: &Identity, records: &dyn RecordStore) -> Result<(), BackendError> {
        let (user_id, role) = valid;
        records.update_role(user_id, role).await
    }
}

#[cfg(test)]
#[path = "forms_test.rs"]
mod tests;

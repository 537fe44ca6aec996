//! Record routes: list pages, form dialogs, and their submits.
//!
//! DESIGN
//! ======
//! Handlers are thin: a list route loads a `ListView` and attaches the page
//! summary; a form route opens a `FormDialog` (side-loading references); a
//! submit route fills a dialog with the posted fields and submits it inside
//! the caller's in-flight slot so a double click cannot mutate twice.
//!
//! ERROR HANDLING
//! ==============
//! Submit failures render as `ApiError` with the dialog's notice text as the
//! message, so the user sees exactly what the dialog would show. A failed
//! list load is not an HTTP error: the page gets its items (empty on a first
//! load) and the load-failure notice.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::auth::{AuthUser, MaybeAuthUser};
use crate::backend::{BackendError, Identity};
use crate::console::detail::ProposalDetail;
use crate::console::forms::{
    EditLead, EditProposal, Form, FormDialog, NewLead, NewProject, NewProposal, NewTransaction, SubmitError, Submitted,
};
use crate::console::list::{self, ListSource, ListView};
use crate::console::notice::Notice;
use crate::console::summary::{self, FinanceSummary, ProjectSummary, ProposalSummary};
use crate::error::ApiError;
use crate::model::{ClientOption, Lead, LeadStatus, Project, Proposal, Transaction};
use crate::state::AppState;

// =============================================================================
// SHARED
// =============================================================================

/// One list page: visible items, optional derived figures, load notice.
#[derive(Debug, Serialize)]
#[serde(bound = "T: Serialize, M: Serialize")]
pub struct ListPage<T, M = ()> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<M>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub q: String,
    pub status: String,
}

/// Load `S` once and apply the search term. The summary sees every loaded
/// item, not only the ones matching the search.
pub(crate) async fn load_page<S, M>(
    state: &AppState,
    filter: S::Filter,
    search: &str,
    summarize: impl FnOnce(&[S::Item]) -> Option<M>,
) -> ListPage<S::Item, M>
where
    S: ListSource,
{
    let mut view = ListView::<S>::new(filter);
    view.load(state.backend.records.as_ref()).await;
    view.set_search(search);
    let summary = summarize(&view.items);
    let items = view.visible().into_iter().cloned().collect();
    ListPage { items, summary, notice: view.notice }
}

/// Submit `fields` through a fresh dialog, inside the actor's in-flight slot.
pub(crate) async fn submit_form<F: Form>(
    state: &AppState,
    actor: Option<&Identity>,
    fields: F,
) -> Result<Json<Submitted>, ApiError> {
    let mut dialog = FormDialog::with_fields(fields);
    let records = state.backend.records.as_ref();
    let policy = state.policy.as_ref();

    let result = match actor {
        Some(identity) => state
            .inflight
            .run(identity.id, F::KIND, state.config.remote_timeout, dialog.submit(actor, records, policy))
            .await
            .unwrap_or_else(|e| Err(SubmitError::Guard(e))),
        None => dialog.submit(None, records, policy).await,
    };

    result.map(Json).map_err(|err| {
        let mut api = ApiError::from(err);
        if let Some(notice) = dialog.notice.take() {
            api.message = notice.message;
        }
        api
    })
}

/// Open a dialog the way the page does before showing it.
async fn open_form<F: Form>(state: &AppState) -> FormDialog<F> {
    let mut dialog = FormDialog::<F>::default();
    dialog.open(state.backend.records.as_ref()).await;
    dialog
}

pub(crate) fn lead_filter(raw: &str) -> Result<Option<LeadStatus>, ApiError> {
    match raw.trim() {
        "" | "all" | "todos" => Ok(None),
        other => LeadStatus::parse(other)
            .map(Some)
            .ok_or_else(|| ApiError::bad_request(format!("status inválido: {other}"))),
    }
}

// =============================================================================
// LEADS
// =============================================================================

/// `GET /api/leads?status=&q=`
pub async fn list_leads(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListPage<Lead>>, ApiError> {
    let filter = lead_filter(&query.status)?;
    Ok(Json(load_page::<list::Leads, ()>(&state, filter, &query.q, |_| None).await))
}

/// `POST /api/leads`
pub async fn create_lead(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Json(fields): Json<NewLead>,
) -> Result<Json<Submitted>, ApiError> {
    submit_form(&state, user.identity(), fields).await
}

/// `PATCH /api/leads/{id}`
pub async fn edit_lead(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path(id): Path<Uuid>,
    Json(mut fields): Json<EditLead>,
) -> Result<Json<Submitted>, ApiError> {
    fields.id = id;
    submit_form(&state, user.identity(), fields).await
}

/// `GET /api/clients/options`
pub async fn client_options(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<ClientOption>>, ApiError> {
    state
        .backend
        .records
        .client_options()
        .await
        .map(Json)
        .map_err(|e| ApiError::from_code(&e))
}

// =============================================================================
// PROPOSALS
// =============================================================================

/// `GET /api/proposals?q=`
pub async fn list_proposals(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Json<ListPage<Proposal, ProposalSummary>> {
    Json(load_page::<list::Proposals, _>(&state, (), &query.q, |items| Some(summary::proposals(items))).await)
}

/// `GET /api/proposals/form`
pub async fn proposal_form(State(state): State<AppState>, _user: AuthUser) -> Json<FormDialog<NewProposal>> {
    Json(open_form(&state).await)
}

/// Fetch one proposal or answer 404.
async fn find_proposal(state: &AppState, id: Uuid) -> Result<Proposal, ApiError> {
    match state.backend.records.fetch_proposal(id).await {
        Ok(Some(proposal)) => Ok(proposal),
        Ok(None) => Err(ApiError::from_code(&BackendError::NotFound("proposal"))),
        Err(e) => {
            warn!(%id, error = %e, "records: proposal fetch failed");
            Err(ApiError::from_code(&e))
        }
    }
}

/// `GET /api/proposals/{id}`: read-only details.
pub async fn view_proposal(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProposalDetail>, ApiError> {
    find_proposal(&state, id).await.map(|p| Json(p.into()))
}

/// `GET /api/proposals/{id}/form`: edit dialog filled from the stored row.
pub async fn edit_proposal_form(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FormDialog<EditProposal>>, ApiError> {
    let proposal = find_proposal(&state, id).await?;
    let mut dialog = FormDialog::with_fields(EditProposal::from_record(&proposal));
    dialog.open(state.backend.records.as_ref()).await;
    Ok(Json(dialog))
}

/// `POST /api/proposals`
pub async fn create_proposal(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Json(fields): Json<NewProposal>,
) -> Result<Json<Submitted>, ApiError> {
    submit_form(&state, user.identity(), fields).await
}

/// `PATCH /api/proposals/{id}`
pub async fn edit_proposal(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path(id): Path<Uuid>,
    Json(mut fields): Json<EditProposal>,
) -> Result<Json<Submitted>, ApiError> {
    fields.id = id;
    submit_form(&state, user.identity(), fields).await
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

/// `GET /api/transactions?q=`
pub async fn list_transactions(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Json<ListPage<Transaction, FinanceSummary>> {
    let today = Utc::now().date_naive();
    Json(
        load_page::<list::Transactions, _>(&state, (), &query.q, |items| Some(summary::finance(items, today)))
            .await,
    )
}

/// `GET /api/transactions/form`
pub async fn transaction_form(State(state): State<AppState>, _user: AuthUser) -> Json<FormDialog<NewTransaction>> {
    Json(open_form(&state).await)
}

/// `POST /api/transactions`
pub async fn create_transaction(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Json(fields): Json<NewTransaction>,
) -> Result<Json<Submitted>, ApiError> {
    submit_form(&state, user.identity(), fields).await
}

// =============================================================================
// PROJECTS
// =============================================================================

/// `GET /api/projects?q=`
pub async fn list_projects(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Json<ListPage<Project, ProjectSummary>> {
    Json(load_page::<list::Projects, _>(&state, (), &query.q, |items| Some(summary::projects(items))).await)
}

/// `GET /api/projects/form`
pub async fn project_form(State(state): State<AppState>, _user: AuthUser) -> Json<FormDialog<NewProject>> {
    Json(open_form(&state).await)
}

/// `POST /api/projects`
pub async fn create_project(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Json(fields): Json<NewProject>,
) -> Result<Json<Submitted>, ApiError> {
    submit_form(&state, user.identity(), fields).await
}

#[cfg(test)]
#[path = "records_test.rs"]
mod tests;

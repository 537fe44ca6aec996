//! In-memory collaborators for tests.
//!
//! Every mutation publishes a `ChangeEvent` on the shared feed, standing in
//! for the Postgres triggers. Each store records the operations it served and
//! can be told to fail or stall a named operation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::auth::Session;
use super::{
    AuthProvider, Backend, BackendError, ChangeEvent, ChangeFeed, ChangeKind, Identity, ObjectStorage, RecordStore,
    SessionEvent, SignUp, Table,
};
use crate::model::{
    ClientOption, Lead, LeadStatus, LeadUpdate, NewLeadRow, NewProfileRow, NewProjectRow, NewProposalRow,
    NewTransactionRow, Project, Proposal, ProposalUpdate, Role, Settings, Transaction, UserProfile,
};

const STALL: Duration = Duration::from_secs(3600);

/// Call log plus failure and stall injection, shared by the memory stores.
#[derive(Default)]
struct Faults {
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
    stalled: Mutex<HashSet<&'static str>>,
}

impl Faults {
    async fn enter(&self, op: &'static str) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(op);
        let stall = self.stalled.lock().unwrap().contains(op);
        if stall {
            tokio::time::sleep(STALL).await;
        }
        if self.failing.lock().unwrap().contains(op) {
            return Err(BackendError::Rejected(format!("{op} failed")));
        }
        Ok(())
    }

    fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    fn total(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Default)]
struct Tables {
    leads: Vec<Lead>,
    proposals: Vec<Proposal>,
    transactions: Vec<Transaction>,
    projects: Vec<Project>,
    profiles: Vec<NewProfileRow>,
    roles: Vec<(Uuid, Role)>,
    settings: HashMap<Uuid, Settings>,
}

pub struct MemoryRecords {
    tables: Mutex<Tables>,
    feed: ChangeFeed,
    faults: Faults,
}

impl MemoryRecords {
    #[must_use]
    pub fn new(feed: ChangeFeed) -> Self {
        Self { tables: Mutex::new(Tables::default()), feed, faults: Faults::default() }
    }

    /// Make every later call to `op` fail with a rejection.
    pub fn fail_on(&self, op: &'static str) {
        self.faults.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.faults.failing.lock().unwrap().remove(op);
    }

    /// Make every later call to `op` hang for an hour.
    pub fn stall_on(&self, op: &'static str) {
        self.faults.stalled.lock().unwrap().insert(op);
    }

    #[must_use]
    pub fn calls(&self, op: &str) -> usize {
        self.faults.count(op)
    }

    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.faults.total()
    }

    #[must_use]
    pub fn leads(&self) -> Vec<Lead> {
        self.tables.lock().unwrap().leads.clone()
    }

    #[must_use]
    pub fn profiles(&self) -> Vec<NewProfileRow> {
        self.tables.lock().unwrap().profiles.clone()
    }

    #[must_use]
    pub fn stored_settings(&self, user_id: Uuid) -> Option<Settings> {
        self.tables.lock().unwrap().settings.get(&user_id).cloned()
    }

    /// Insert a lead directly, bypassing call logging and change events.
    pub fn seed_lead(&self, name: &str, status: LeadStatus) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().leads.insert(
            0,
            Lead {
                id,
                name: name.to_owned(),
                email: None,
                phone: None,
                status,
                source: None,
                potential_value: None,
                created_by: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn seed_profile(&self, id: Uuid, name: &str, email: &str, role: Role) {
        let mut tables = self.tables.lock().unwrap();
        tables.profiles.push(NewProfileRow { id, name: name.to_owned(), email: email.to_owned() });
        tables.roles.push((id, role));
    }

    pub fn seed_settings(&self, settings: Settings) {
        self.tables.lock().unwrap().settings.insert(settings.user_id, settings);
    }

    fn changed(&self, table: Table, kind: ChangeKind) {
        self.feed.publish(ChangeEvent { table, kind });
    }

    fn client_name(tables: &Tables, id: Uuid) -> Option<String> {
        tables.leads.iter().find(|l| l.id == id).map(|l| l.name.clone())
    }
}

#[async_trait]
impl RecordStore for MemoryRecords {
    async fn list_leads(&self, status: Option<LeadStatus>) -> Result<Vec<Lead>, BackendError> {
        self.faults.enter("list_leads").await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .leads
            .iter()
            .filter(|l| status.is_none_or(|s| l.status == s))
            .cloned()
            .collect())
    }

    async fn insert_lead(&self, row: NewLeadRow) -> Result<(), BackendError> {
        self.faults.enter("insert_lead").await?;
        self.tables.lock().unwrap().leads.insert(
            0,
            Lead {
                id: Uuid::new_v4(),
                name: row.name,
                email: row.email,
                phone: row.phone,
                status: row.status,
                source: row.source,
                potential_value: row.potential_value,
                created_by: Some(row.created_by),
                created_at: Utc::now(),
            },
        );
        self.changed(Table::Clients, ChangeKind::Insert);
        Ok(())
    }

    async fn update_lead(&self, id: Uuid, update: LeadUpdate) -> Result<(), BackendError> {
        self.faults.enter("update_lead").await?;
        {
            let mut tables = self.tables.lock().unwrap();
            let lead = tables
                .leads
                .iter_mut()
                .find(|l| l.id == id)
                .ok_or(BackendError::NotFound("lead"))?;
            lead.name = update.name;
            lead.email = update.email;
            lead.phone = update.phone;
            lead.source = update.source;
            lead.status = update.status;
            lead.potential_value = update.potential_value;
        }
        self.changed(Table::Clients, ChangeKind::Update);
        Ok(())
    }

    async fn client_options(&self) -> Result<Vec<ClientOption>, BackendError> {
        self.faults.enter("client_options").await?;
        let tables = self.tables.lock().unwrap();
        let mut options: Vec<ClientOption> = tables
            .leads
            .iter()
            .map(|l| ClientOption { id: l.id, name: l.name.clone() })
            .collect();
        options.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(options)
    }

    async fn list_proposals(&self) -> Result<Vec<Proposal>, BackendError> {
        self.faults.enter("list_proposals").await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .proposals
            .iter()
            .map(|p| Proposal { client_name: Self::client_name(&tables, p.client_id), ..p.clone() })
            .collect())
    }

    async fn fetch_proposal(&self, id: Uuid) -> Result<Option<Proposal>, BackendError> {
        self.faults.enter("fetch_proposal").await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .proposals
            .iter()
            .find(|p| p.id == id)
            .map(|p| Proposal { client_name: Self::client_name(&tables, p.client_id), ..p.clone() }))
    }

    async fn insert_proposal(&self, row: NewProposalRow) -> Result<(), BackendError> {
        self.faults.enter("insert_proposal").await?;
        self.tables.lock().unwrap().proposals.insert(
            0,
            Proposal {
                id: Uuid::new_v4(),
                client_id: row.client_id,
                client_name: None,
                value: row.value,
                status: row.status,
                description: Some(row.description),
                created_by: Some(row.created_by),
                created_at: Utc::now(),
            },
        );
        self.changed(Table::Proposals, ChangeKind::Insert);
        Ok(())
    }

    async fn update_proposal(&self, id: Uuid, update: ProposalUpdate) -> Result<(), BackendError> {
        self.faults.enter("update_proposal").await?;
        {
            let mut tables = self.tables.lock().unwrap();
            let proposal = tables
                .proposals
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or(BackendError::NotFound("proposal"))?;
            proposal.client_id = update.client_id;
            proposal.value = update.value;
            proposal.status = update.status;
            proposal.description = Some(update.description);
        }
        self.changed(Table::Proposals, ChangeKind::Update);
        Ok(())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, BackendError> {
        self.faults.enter("list_transactions").await?;
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Transaction> = tables
            .transactions
            .iter()
            .map(|t| Transaction {
                client_name: t.client_id.and_then(|id| Self::client_name(&tables, id)),
                ..t.clone()
            })
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    async fn insert_transaction(&self, row: NewTransactionRow) -> Result<(), BackendError> {
        self.faults.enter("insert_transaction").await?;
        self.tables.lock().unwrap().transactions.push(Transaction {
            id: Uuid::new_v4(),
            description: row.description,
            value: row.value,
            kind: row.kind,
            date: row.date,
            client_id: row.client_id,
            client_name: None,
            created_by: Some(row.created_by),
            created_at: Utc::now(),
        });
        self.changed(Table::Transactions, ChangeKind::Insert);
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, BackendError> {
        self.faults.enter("list_projects").await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .projects
            .iter()
            .map(|p| Project {
                client_name: Self::client_name(&tables, p.client_id),
                responsible_name: p
                    .responsible
                    .and_then(|id| tables.profiles.iter().find(|pf| pf.id == id))
                    .map(|pf| pf.name.clone()),
                ..p.clone()
            })
            .collect())
    }

    async fn insert_project(&self, row: NewProjectRow) -> Result<(), BackendError> {
        self.faults.enter("insert_project").await?;
        self.tables.lock().unwrap().projects.insert(
            0,
            Project {
                id: Uuid::new_v4(),
                name: row.name,
                client_id: row.client_id,
                client_name: None,
                status: row.status,
                progress: row.progress,
                responsible: Some(row.responsible),
                responsible_name: None,
                created_at: Utc::now(),
            },
        );
        self.changed(Table::Projects, ChangeKind::Insert);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, BackendError> {
        self.faults.enter("list_users").await?;
        let tables = self.tables.lock().unwrap();
        let mut users: Vec<UserProfile> = tables
            .profiles
            .iter()
            .map(|p| UserProfile {
                id: p.id,
                name: p.name.clone(),
                email: p.email.clone(),
                roles: tables
                    .roles
                    .iter()
                    .filter(|(id, _)| *id == p.id)
                    .map(|(_, role)| *role)
                    .collect(),
            })
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn insert_profile(&self, row: NewProfileRow) -> Result<(), BackendError> {
        self.faults.enter("insert_profile").await?;
        {
            let mut tables = self.tables.lock().unwrap();
            if tables.profiles.iter().any(|p| p.id == row.id) {
                return Err(BackendError::Rejected("duplicate profile".into()));
            }
            tables.profiles.push(row);
        }
        self.changed(Table::Profiles, ChangeKind::Insert);
        Ok(())
    }

    async fn delete_profile(&self, user_id: Uuid) -> Result<(), BackendError> {
        self.faults.enter("delete_profile").await?;
        self.tables.lock().unwrap().profiles.retain(|p| p.id != user_id);
        self.changed(Table::Profiles, ChangeKind::Delete);
        Ok(())
    }

    async fn roles_for(&self, user_id: Uuid) -> Result<Vec<Role>, BackendError> {
        self.faults.enter("roles_for").await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .roles
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, role)| *role)
            .collect())
    }

    async fn insert_role(&self, user_id: Uuid, role: Role) -> Result<(), BackendError> {
        self.faults.enter("insert_role").await?;
        self.tables.lock().unwrap().roles.push((user_id, role));
        self.changed(Table::UserRoles, ChangeKind::Insert);
        Ok(())
    }

    async fn update_role(&self, user_id: Uuid, role: Role) -> Result<(), BackendError> {
        self.faults.enter("update_role").await?;
        {
            let mut tables = self.tables.lock().unwrap();
            let before = tables.roles.len();
            tables.roles.retain(|(id, _)| *id != user_id);
            if tables.roles.len() == before {
                return Err(BackendError::NotFound("user role"));
            }
            tables.roles.push((user_id, role));
        }
        self.changed(Table::UserRoles, ChangeKind::Update);
        Ok(())
    }

    async fn fetch_settings(&self, user_id: Uuid) -> Result<Option<Settings>, BackendError> {
        self.faults.enter("fetch_settings").await?;
        Ok(self.tables.lock().unwrap().settings.get(&user_id).cloned())
    }

    async fn upsert_settings(&self, settings: &Settings) -> Result<(), BackendError> {
        self.faults.enter("upsert_settings").await?;
        self.tables
            .lock()
            .unwrap()
            .settings
            .insert(settings.user_id, settings.clone());
        self.changed(Table::Settings, ChangeKind::Update);
        Ok(())
    }
}

// =============================================================================
// AUTH
// =============================================================================

pub struct MemoryAuth {
    users: Mutex<HashMap<Uuid, (Identity, String)>>,
    sessions: Mutex<HashMap<String, Uuid>>,
    events: broadcast::Sender<SessionEvent>,
    faults: Faults,
}

impl MemoryAuth {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            users: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            events,
            faults: Faults::default(),
        }
    }

    pub fn fail_on(&self, op: &'static str) {
        self.faults.failing.lock().unwrap().insert(op);
    }

    pub fn stall_on(&self, op: &'static str) {
        self.faults.stalled.lock().unwrap().insert(op);
    }

    #[must_use]
    pub fn calls(&self, op: &str) -> usize {
        self.faults.count(op)
    }

    #[must_use]
    pub fn has_identity(&self, user_id: Uuid) -> bool {
        self.users.lock().unwrap().contains_key(&user_id)
    }

    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    /// Create an identity with an open session; returns it with the token.
    pub fn seed_session(&self, name: &str, email: &str) -> (Identity, String) {
        let identity = Identity { id: Uuid::new_v4(), email: email.to_owned(), name: name.to_owned() };
        let token = super::auth::generate_token();
        self.users
            .lock()
            .unwrap()
            .insert(identity.id, (identity.clone(), "secret".to_owned()));
        self.sessions.lock().unwrap().insert(token.clone(), identity.id);
        (identity, token)
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        self.faults.enter("sign_in").await?;
        let identity = self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|(identity, secret)| identity.email == email && secret == password)
            .map(|(identity, _)| identity.clone())
            .ok_or_else(|| BackendError::Rejected("Invalid login credentials".into()))?;
        let token = super::auth::generate_token();
        self.sessions.lock().unwrap().insert(token.clone(), identity.id);
        let _ = self.events.send(SessionEvent::SignedIn(identity.clone()));
        Ok(Session { token, identity })
    }

    async fn sign_up(&self, request: SignUp) -> Result<Identity, BackendError> {
        self.faults.enter("sign_up").await?;
        let mut users = self.users.lock().unwrap();
        if users.values().any(|(identity, _)| identity.email == request.email) {
            return Err(BackendError::Rejected("User already registered".into()));
        }
        let identity = Identity { id: Uuid::new_v4(), email: request.email, name: request.name };
        users.insert(identity.id, (identity.clone(), request.password));
        Ok(identity)
    }

    async fn current_identity(&self, token: &str) -> Result<Option<Identity>, BackendError> {
        self.faults.enter("current_identity").await?;
        let user_id = self.sessions.lock().unwrap().get(token).copied();
        Ok(user_id.and_then(|id| self.users.lock().unwrap().get(&id).map(|(identity, _)| identity.clone())))
    }

    async fn sign_out(&self, token: &str) -> Result<(), BackendError> {
        self.faults.enter("sign_out").await?;
        if let Some(user_id) = self.sessions.lock().unwrap().remove(token) {
            let _ = self.events.send(SessionEvent::SignedOut(user_id));
        }
        Ok(())
    }

    async fn delete_identity(&self, user_id: Uuid) -> Result<(), BackendError> {
        self.faults.enter("delete_identity").await?;
        self.users.lock().unwrap().remove(&user_id);
        self.sessions.lock().unwrap().retain(|_, id| *id != user_id);
        Ok(())
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// STORAGE
// =============================================================================

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    faults: Faults,
}

impl MemoryStorage {
    pub fn fail_on(&self, op: &'static str) {
        self.faults.failing.lock().unwrap().insert(op);
    }

    #[must_use]
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> Result<String, BackendError> {
        self.faults.enter("upload").await?;
        let key = format!("{bucket}/{path}");
        self.objects.lock().unwrap().insert(key.clone(), bytes);
        Ok(format!("http://localhost/storage/{key}"))
    }
}

// =============================================================================
// BUNDLE
// =============================================================================

/// A `Backend` wired to memory stores, with typed handles kept for asserts.
pub struct TestBackend {
    pub backend: Backend,
    pub records: Arc<MemoryRecords>,
    pub auth: Arc<MemoryAuth>,
    pub storage: Arc<MemoryStorage>,
}

#[must_use]
pub fn test_backend() -> TestBackend {
    let changes = ChangeFeed::new();
    let records = Arc::new(MemoryRecords::new(changes.clone()));
    let auth = Arc::new(MemoryAuth::new());
    let storage = Arc::new(MemoryStorage::default());
    TestBackend {
        backend: Backend {
            records: records.clone(),
            auth: auth.clone(),
            storage: storage.clone(),
            changes,
        },
        records,
        auth,
        storage,
    }
}

//! Record list views: one-shot loaded lists and live lists that refetch on
//! every change to their table.
//!
//! ARCHITECTURE
//! ============
//! `ListSource` describes one entity list: which tables it watches, how to
//! fetch it, and what a search matches. `ListView<S>` is a loaded list with
//! client-side search. `LiveList<S>` is a mounted list: a task that
//! subscribes to the change feed, loads once, and refetches (same filter) on
//! every relevant event, publishing snapshots on a `watch` channel.
//!
//! CONCURRENCY
//! ===========
//! Fetches for one mount run one at a time inside its task. Events that
//! arrive while a fetch is running are drained and folded into a single
//! follow-up fetch, so the last published snapshot always comes from the
//! latest successful fetch. A lagged receiver is treated as "something
//! changed" and refetches. Dropping the `LiveList` aborts the task, which
//! drops the feed receiver.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::notice::Notice;
use crate::backend::{BackendError, ChangeFeed, RecordStore, Table};
use crate::model::{Lead, LeadStatus, Project, Proposal, Transaction, UserProfile};

pub trait ListSource: Send + Sync + 'static {
    type Item: Clone + Serialize + Send + Sync + 'static;
    type Filter: Clone + Default + Send + Sync + 'static;

    const NAME: &'static str;
    /// Tables whose changes invalidate this list.
    const TABLES: &'static [Table];
    const LOAD_FAILED: &'static str;

    fn fetch<'a>(
        records: &'a dyn RecordStore,
        filter: &'a Self::Filter,
    ) -> BoxFuture<'a, Result<Vec<Self::Item>, BackendError>>;

    /// Whether `item` matches an already lowercased search term.
    fn matches(item: &Self::Item, needle: &str) -> bool;
}

fn contains_lower(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn opt_contains_lower(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| contains_lower(h, needle))
}

// =============================================================================
// SOURCES
// =============================================================================

pub struct Leads;

impl ListSource for Leads {
    type Item = Lead;
    type Filter = Option<LeadStatus>;

    const NAME: &'static str = "leads";
    const TABLES: &'static [Table] = &[Table::Clients];
    const LOAD_FAILED: &'static str = "Erro ao carregar leads";

    fn fetch<'a>(records: &'a dyn RecordStore, filter: &'a Self::Filter) -> BoxFuture<'a, Result<Vec<Lead>, BackendError>> {
        records.list_leads(*filter)
    }

    fn matches(item: &Lead, needle: &str) -> bool {
        contains_lower(&item.name, needle) || opt_contains_lower(item.email.as_deref(), needle)
    }
}

pub struct Proposals;

impl ListSource for Proposals {
    type Item = Proposal;
    type Filter = ();

    const NAME: &'static str = "proposals";
    const TABLES: &'static [Table] = &[Table::Proposals, Table::Clients];
    const LOAD_FAILED: &'static str = "Erro ao carregar propostas";

    fn fetch<'a>(records: &'a dyn RecordStore, _: &'a ()) -> BoxFuture<'a, Result<Vec<Proposal>, BackendError>> {
        records.list_proposals()
    }

    fn matches(item: &Proposal, needle: &str) -> bool {
        opt_contains_lower(item.client_name.as_deref(), needle)
    }
}

pub struct Transactions;

impl ListSource for Transactions {
    type Item = Transaction;
    type Filter = ();

    const NAME: &'static str = "transactions";
    const TABLES: &'static [Table] = &[Table::Transactions];
    const LOAD_FAILED: &'static str = "Erro ao carregar dados financeiros";

    fn fetch<'a>(records: &'a dyn RecordStore, _: &'a ()) -> BoxFuture<'a, Result<Vec<Transaction>, BackendError>> {
        records.list_transactions()
    }

    fn matches(item: &Transaction, needle: &str) -> bool {
        contains_lower(&item.description, needle) || opt_contains_lower(item.client_name.as_deref(), needle)
    }
}

pub struct Projects;

impl ListSource for Projects {
    type Item = Project;
    type Filter = ();

    const NAME: &'static str = "projects";
    const TABLES: &'static [Table] = &[Table::Projects];
    const LOAD_FAILED: &'static str = "Erro ao carregar projetos";

    fn fetch<'a>(records: &'a dyn RecordStore, _: &'a ()) -> BoxFuture<'a, Result<Vec<Project>, BackendError>> {
        records.list_projects()
    }

    fn matches(item: &Project, needle: &str) -> bool {
        contains_lower(&item.name, needle) || opt_contains_lower(item.client_name.as_deref(), needle)
    }
}

pub struct Users;

impl ListSource for Users {
    type Item = UserProfile;
    type Filter = ();

    const NAME: &'static str = "users";
    const TABLES: &'static [Table] = &[Table::Profiles, Table::UserRoles];
    const LOAD_FAILED: &'static str = "Erro ao carregar usuários";

    fn fetch<'a>(records: &'a dyn RecordStore, _: &'a ()) -> BoxFuture<'a, Result<Vec<UserProfile>, BackendError>> {
        records.list_users()
    }

    fn matches(item: &UserProfile, needle: &str) -> bool {
        contains_lower(&item.name, needle) || contains_lower(&item.email, needle)
    }
}

// =============================================================================
// LOADED VIEW
// =============================================================================

pub struct ListView<S: ListSource> {
    pub items: Vec<S::Item>,
    pub filter: S::Filter,
    pub search: String,
    pub loading: bool,
    pub error: Option<String>,
    pub notice: Option<Notice>,
}

impl<S: ListSource> Default for ListView<S> {
    fn default() -> Self {
        Self::new(S::Filter::default())
    }
}

impl<S: ListSource> ListView<S> {
    #[must_use]
    pub fn new(filter: S::Filter) -> Self {
        Self { items: Vec::new(), filter, search: String::new(), loading: false, error: None, notice: None }
    }

    /// One read with the current filter. On failure the previous items stay.
    pub async fn load(&mut self, records: &dyn RecordStore) {
        self.loading = true;
        match S::fetch(records, &self.filter).await {
            Ok(items) => {
                self.items = items;
                self.error = None;
                self.notice = None;
            }
            Err(e) => {
                warn!(list = S::NAME, error = %e, "list: load failed");
                self.error = Some(e.to_string());
                self.notice = Some(Notice::error(S::LOAD_FAILED));
            }
        }
        self.loading = false;
    }

    pub fn set_search(&mut self, term: &str) {
        term.trim().clone_into(&mut self.search);
    }

    /// Items matching the search term (case-insensitive); all when blank.
    #[must_use]
    pub fn visible(&self) -> Vec<&S::Item> {
        filter_items::<S>(&self.items, &self.search)
    }
}

pub(crate) fn filter_items<'a, S: ListSource>(items: &'a [S::Item], term: &str) -> Vec<&'a S::Item> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return items.iter().collect();
    }
    items.iter().filter(|item| S::matches(item, &needle)).collect()
}

// =============================================================================
// LIVE LIST
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(bound = "T: Serialize")]
pub struct Snapshot<T> {
    /// Bumped on every publish, failed refetches included.
    pub version: u64,
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct LiveList<S: ListSource> {
    snapshots: watch::Receiver<Snapshot<S::Item>>,
    task: JoinHandle<()>,
}

impl<S: ListSource> LiveList<S> {
    /// Subscribe to the change feed, load once, then keep refetching on
    /// change until dropped.
    pub async fn mount(records: Arc<dyn RecordStore>, feed: &ChangeFeed, filter: S::Filter) -> Self {
        let mut events = feed.subscribe();

        let mut current = Snapshot { version: 0, items: Vec::new(), error: None };
        refetch::<S>(records.as_ref(), &filter, &mut current).await;
        let (tx, snapshots) = watch::channel(current.clone());

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if S::TABLES.contains(&event.table) => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(list = S::NAME, skipped, "list: change feed lagged");
                    }
                    Err(RecvError::Closed) => break,
                }

                // Fold whatever else is already queued into this refetch.
                loop {
                    match events.try_recv() {
                        Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                        Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                    }
                }

                refetch::<S>(records.as_ref(), &filter, &mut current).await;
                tx.send_replace(current.clone());
            }
            debug!(list = S::NAME, "list: change feed closed");
        });

        Self { snapshots, task }
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot<S::Item> {
        self.snapshots.borrow().clone()
    }

    /// Wait for the next published snapshot. `None` once the list stopped.
    pub async fn changed(&mut self) -> Option<Snapshot<S::Item>> {
        self.snapshots.changed().await.ok()?;
        Some(self.snapshots.borrow_and_update().clone())
    }
}

impl<S: ListSource> Drop for LiveList<S> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn refetch<S: ListSource>(records: &dyn RecordStore, filter: &S::Filter, current: &mut Snapshot<S::Item>) {
    current.version += 1;
    match S::fetch(records, filter).await {
        Ok(items) => {
            debug!(list = S::NAME, count = items.len(), version = current.version, "list: refetched");
            current.items = items;
            current.error = None;
        }
        Err(e) => {
            warn!(list = S::NAME, error = %e, "list: refetch failed, keeping previous items");
            current.error = Some(S::LOAD_FAILED.to_owned());
        }
    }
}

#[cfg(test)]
#[path = "list_test.rs"]
mod tests;

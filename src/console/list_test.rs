use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use super::*;
use crate::backend::memory::{TestBackend, test_backend};
use crate::backend::{ChangeEvent, ChangeKind, Identity};
use crate::console::forms::{FormDialog, NewLead};
use crate::console::policy::RolePolicy;
use crate::model::{Role, TransactionKind};

fn clients_changed() -> ChangeEvent {
    ChangeEvent { table: Table::Clients, kind: ChangeKind::Insert }
}

async fn next<S: ListSource>(list: &mut LiveList<S>) -> Snapshot<S::Item> {
    tokio::time::timeout(Duration::from_secs(2), list.changed())
        .await
        .expect("no snapshot within timeout")
        .expect("list stopped")
}

// =============================================================================
// ListView
// =============================================================================

#[tokio::test]
async fn load_applies_status_filter() {
    let TestBackend { backend, records, .. } = test_backend();
    records.seed_lead("Ana", LeadStatus::New);
    records.seed_lead("Bruno", LeadStatus::Accepted);

    let mut view = ListView::<Leads>::new(Some(LeadStatus::Accepted));
    view.load(backend.records.as_ref()).await;

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].name, "Bruno");
    assert!(!view.loading);
}

#[tokio::test]
async fn failed_load_keeps_previous_items() {
    let TestBackend { backend, records, .. } = test_backend();
    records.seed_lead("Ana", LeadStatus::New);
    let mut view = ListView::<Leads>::default();
    view.load(backend.records.as_ref()).await;

    records.fail_on("list_leads");
    view.load(backend.records.as_ref()).await;

    assert_eq!(view.items.len(), 1);
    assert!(view.error.is_some());
    assert_eq!(view.notice.unwrap().message, "Erro ao carregar leads");
}

#[tokio::test]
async fn search_is_case_insensitive_on_name_or_email() {
    let TestBackend { backend, records, .. } = test_backend();
    records.seed_lead("Ana Souza", LeadStatus::New);
    records.seed_lead("Bruno Lima", LeadStatus::New);
    let mut view = ListView::<Leads>::default();
    view.load(backend.records.as_ref()).await;

    view.set_search("  SOUZA ");
    assert_eq!(view.visible().len(), 1);
    view.set_search("");
    assert_eq!(view.visible().len(), 2);
    view.set_search("zzz");
    assert!(view.visible().is_empty());
}

#[test]
fn sources_search_their_own_fields() {
    let proposal = Proposal {
        id: Uuid::new_v4(),
        client_id: Uuid::new_v4(),
        client_name: Some("Acme Ltda".into()),
        value: 1.0,
        status: crate::model::ProposalStatus::Sent,
        description: Some("Portal".into()),
        created_by: None,
        created_at: Utc::now(),
    };
    assert!(Proposals::matches(&proposal, "acme"));
    assert!(!Proposals::matches(&proposal, "portal"));

    let tx = Transaction {
        id: Uuid::new_v4(),
        description: "Licença anual".into(),
        value: 1.0,
        kind: TransactionKind::Outflow,
        date: Utc::now().date_naive(),
        client_id: None,
        client_name: None,
        created_by: None,
        created_at: Utc::now(),
    };
    assert!(Transactions::matches(&tx, "licença"));

    let user = UserProfile { id: Uuid::new_v4(), name: "Ana".into(), email: "ana@x.com".into(), roles: vec![Role::Admin] };
    assert!(Users::matches(&user, "x.com"));
}

// =============================================================================
// LiveList
// =============================================================================

#[tokio::test]
async fn mount_publishes_initial_snapshot() {
    let TestBackend { backend, records, .. } = test_backend();
    records.seed_lead("Ana", LeadStatus::New);

    let list = LiveList::<Leads>::mount(backend.records.clone(), &backend.changes, None).await;

    let snapshot = list.snapshot();
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.version, 1);
    assert_eq!(records.calls("list_leads"), 1);
}

#[tokio::test]
async fn successful_create_raises_count_by_one_after_refetch() {
    let TestBackend { backend, records, .. } = test_backend();
    records.seed_lead("Bruno", LeadStatus::New);
    let mut list = LiveList::<Leads>::mount(backend.records.clone(), &backend.changes, None).await;
    let before = list.snapshot().items.len();

    let me = Identity { id: Uuid::new_v4(), email: "ana@x.com".into(), name: "Ana".into() };
    FormDialog::with_fields(NewLead { name: "Ana Souza".into(), ..NewLead::default() })
        .submit(Some(&me), backend.records.as_ref(), &RolePolicy)
        .await
        .unwrap();

    let after = next(&mut list).await;
    assert_eq!(after.items.len(), before + 1);
    assert_eq!(after.items[0].name, "Ana Souza");
}

#[tokio::test]
async fn refetch_keeps_the_mount_filter() {
    let TestBackend { backend, records, .. } = test_backend();
    records.seed_lead("Aceito", LeadStatus::Accepted);
    let mut list = LiveList::<Leads>::mount(backend.records.clone(), &backend.changes, Some(LeadStatus::Accepted)).await;

    records.seed_lead("Novo", LeadStatus::New);
    backend.changes.publish(clients_changed());

    let snapshot = next(&mut list).await;
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].name, "Aceito");
}

#[tokio::test]
async fn queued_events_coalesce_into_one_refetch() {
    let TestBackend { backend, records, .. } = test_backend();
    let mut list = LiveList::<Leads>::mount(backend.records.clone(), &backend.changes, None).await;

    records.seed_lead("A", LeadStatus::New);
    records.seed_lead("B", LeadStatus::New);
    for _ in 0..5 {
        backend.changes.publish(clients_changed());
    }

    let snapshot = next(&mut list).await;
    assert_eq!(snapshot.items.len(), 2);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(records.calls("list_leads"), 2);
}

#[tokio::test]
async fn two_rapid_inserts_converge_to_latest_fetch() {
    let TestBackend { backend, records, .. } = test_backend();
    let mut list = LiveList::<Leads>::mount(backend.records.clone(), &backend.changes, None).await;
    let me = Uuid::new_v4();

    for name in ["Primeiro", "Segundo"] {
        backend
            .records
            .insert_lead(crate::model::NewLeadRow {
                name: name.into(),
                email: None,
                phone: None,
                source: None,
                potential_value: None,
                status: LeadStatus::New,
                created_by: me,
            })
            .await
            .unwrap();
    }

    let mut snapshot = next(&mut list).await;
    while snapshot.items.len() < 2 {
        snapshot = next(&mut list).await;
    }
    assert_eq!(snapshot.items, records.leads());
}

#[tokio::test]
async fn unrelated_tables_do_not_refetch() {
    let TestBackend { backend, records, .. } = test_backend();
    let mut list = LiveList::<Leads>::mount(backend.records.clone(), &backend.changes, None).await;

    backend.changes.publish(ChangeEvent { table: Table::Projects, kind: ChangeKind::Insert });
    backend.changes.publish(ChangeEvent { table: Table::Settings, kind: ChangeKind::Update });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(records.calls("list_leads"), 1);

    backend.changes.publish(ChangeEvent { table: Table::Clients, kind: ChangeKind::Delete });
    next(&mut list).await;
    assert_eq!(records.calls("list_leads"), 2);
}

#[tokio::test]
async fn proposals_refetch_when_client_names_change() {
    let TestBackend { backend, records, .. } = test_backend();
    let mut list = LiveList::<Proposals>::mount(backend.records.clone(), &backend.changes, ()).await;
    backend.changes.publish(clients_changed());
    next(&mut list).await;
    assert_eq!(records.calls("list_proposals"), 2);
}

#[tokio::test]
async fn failed_refetch_keeps_items_and_reports() {
    let TestBackend { backend, records, .. } = test_backend();
    records.seed_lead("Ana", LeadStatus::New);
    let mut list = LiveList::<Leads>::mount(backend.records.clone(), &backend.changes, None).await;

    records.fail_on("list_leads");
    backend.changes.publish(clients_changed());

    let snapshot = next(&mut list).await;
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.error.as_deref(), Some("Erro ao carregar leads"));

    records.recover("list_leads");
    backend.changes.publish(clients_changed());
    let snapshot = next(&mut list).await;
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn lagged_receiver_refetches() {
    let TestBackend { backend, records, .. } = test_backend();
    let mut list = LiveList::<Leads>::mount(backend.records.clone(), &backend.changes, None).await;

    records.seed_lead("Ana", LeadStatus::New);
    for _ in 0..300 {
        backend.changes.publish(ChangeEvent { table: Table::Projects, kind: ChangeKind::Update });
    }

    let snapshot = next(&mut list).await;
    assert_eq!(snapshot.items.len(), 1);
}

#[tokio::test]
async fn dropping_the_list_unsubscribes() {
    let TestBackend { backend, .. } = test_backend();
    let list = LiveList::<Leads>::mount(backend.records.clone(), &backend.changes, None).await;
    assert_eq!(backend.changes.subscriber_count(), 1);

    drop(list);
    for _ in 0..100 {
        if backend.changes.subscriber_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("feed receiver still alive after unmount");
}

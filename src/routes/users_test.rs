use super::*;
use crate::backend::Identity;
use crate::model::Role;
use crate::state::test_helpers::{TestApp, test_app_state};

fn acting(app: &TestApp, role: Role) -> (Identity, AuthUser) {
    let email = format!("{}@x.com", role.as_str());
    let (identity, token) = app.sign_in_as("Carla Dias", &email, role);
    (identity.clone(), AuthUser { identity, token })
}

fn new_user(role: &str) -> Json<NewUser> {
    Json(NewUser {
        name: "Diego Ramos".into(),
        email: "diego@x.com".into(),
        password: "segredo1".into(),
        role: role.into(),
    })
}

fn no_query() -> Query<ListQuery> {
    Query(ListQuery::default())
}

#[tokio::test]
async fn list_users_tells_admins_they_can_manage() {
    let app = test_app_state();
    let (_, admin) = acting(&app, Role::Admin);

    let Json(page) = list_users(State(app.state.clone()), admin, no_query()).await;

    assert!(page.can_manage);
    assert_eq!(page.page.items.len(), 1);
}

#[tokio::test]
async fn list_users_hides_management_from_staff() {
    let app = test_app_state();
    let (_, staff) = acting(&app, Role::Staff);

    let Json(page) = list_users(State(app.state.clone()), staff, no_query()).await;

    assert!(!page.can_manage);
}

#[tokio::test]
async fn admin_creates_user_with_chosen_role() {
    let app = test_app_state();
    let (_, admin) = acting(&app, Role::Admin);

    let (status, Json(provisioned)) = create_user(State(app.state.clone()), MaybeAuthUser(Some(admin)), new_user("admin"))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(provisioned.role, Role::Admin);
    assert_eq!(provisioned.identity.email, "diego@x.com");
    let roles = app.state.backend.records.roles_for(provisioned.identity.id).await.unwrap();
    assert_eq!(roles, vec![Role::Admin]);
}

#[tokio::test]
async fn staff_cannot_create_users() {
    let app = test_app_state();
    let (_, staff) = acting(&app, Role::Staff);

    let err = create_user(State(app.state.clone()), MaybeAuthUser(Some(staff)), new_user("funcionario"))
        .await
        .unwrap_err();

    assert_eq!(err.status, StatusCode::FORBIDDEN);
    assert_eq!(app.auth.calls("sign_up"), 0);
}

#[tokio::test]
async fn create_user_without_session_is_unauthorized() {
    let app = test_app_state();

    let err = create_user(State(app.state.clone()), MaybeAuthUser(None), new_user("funcionario"))
        .await
        .unwrap_err();

    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.auth.calls("sign_up"), 0);
}

#[tokio::test]
async fn create_user_while_one_is_in_flight_is_busy() {
    let app = test_app_state();
    let (identity, admin) = acting(&app, Role::Admin);
    let _held = app.state.inflight.try_begin(identity.id, CREATE_USER).unwrap();

    let err = create_user(State(app.state.clone()), MaybeAuthUser(Some(admin)), new_user("funcionario"))
        .await
        .unwrap_err();

    assert_eq!(err.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn failed_profile_insert_removes_the_new_identity() {
    let app = test_app_state();
    let (_, admin) = acting(&app, Role::Admin);
    app.records.fail_on("insert_profile");

    let err = create_user(State(app.state.clone()), MaybeAuthUser(Some(admin)), new_user("funcionario"))
        .await
        .unwrap_err();

    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.auth.calls("delete_identity"), 1);
    assert_eq!(app.auth.identity_count(), 1);
}

#[tokio::test]
async fn admin_changes_role() {
    let app = test_app_state();
    let (_, admin) = acting(&app, Role::Admin);
    let (target, _) = acting(&app, Role::Staff);
    let form = EditUserRole { user_id: Uuid::nil(), role: "admin".into() };

    let Json(submitted) = update_role(State(app.state.clone()), MaybeAuthUser(Some(admin)), Path(target.id), Json(form))
        .await
        .unwrap();

    assert_eq!(submitted.notice.message, "Função do usuário atualizada com sucesso!");
    let roles = app.state.backend.records.roles_for(target.id).await.unwrap();
    assert_eq!(roles, vec![Role::Admin]);
}

#[tokio::test]
async fn role_change_collapses_multiple_roles_into_one() {
    let app = test_app_state();
    let (_, admin) = acting(&app, Role::Admin);
    let (target, _) = acting(&app, Role::Staff);
    app.state.backend.records.insert_role(target.id, Role::Admin).await.unwrap();
    let form = EditUserRole { user_id: Uuid::nil(), role: "funcionario".into() };

    update_role(State(app.state.clone()), MaybeAuthUser(Some(admin)), Path(target.id), Json(form))
        .await
        .unwrap();

    let roles = app.state.backend.records.roles_for(target.id).await.unwrap();
    assert_eq!(roles, vec![Role::Staff]);
}

#[tokio::test]
async fn staff_role_change_is_forbidden_without_update() {
    let app = test_app_state();
    let (staff_identity, staff) = acting(&app, Role::Staff);
    let form = EditUserRole { user_id: Uuid::nil(), role: "admin".into() };

    let err = update_role(State(app.state.clone()), MaybeAuthUser(Some(staff)), Path(staff_identity.id), Json(form))
        .await
        .unwrap_err();

    assert_eq!(err.status, StatusCode::FORBIDDEN);
    assert_eq!(err.message, "Apenas administradores podem gerenciar usuários");
    assert_eq!(app.records.calls("update_role"), 0);
}

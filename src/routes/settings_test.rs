use axum::http::{HeaderValue, StatusCode};

use super::*;
use crate::model::{DEFAULT_PRIMARY_COLOR, Role};
use crate::state::test_helpers::{TestApp, test_app_state};

fn user(app: &TestApp) -> (uuid::Uuid, impl Fn() -> AuthUser) {
    let (identity, token) = app.sign_in_as("Ana", "ana@x.com", Role::Staff);
    let id = identity.id;
    (id, move || AuthUser { identity: identity.clone(), token: token.clone() })
}

fn png_headers(content_type: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
    headers
}

#[tokio::test]
async fn first_read_yields_defaults_and_theme() {
    let app = test_app_state();
    let (_, auth) = user(&app);

    let Json(view) = get_settings(State(app.state.clone()), auth()).await;

    assert_eq!(view.settings.primary_color, DEFAULT_PRIMARY_COLOR);
    assert!(view.settings.logo_url.is_none());
    assert_eq!(view.theme.primary, "216 100% 55%");
    assert!(view.notice.is_none());
}

#[tokio::test]
async fn color_change_persists_and_recomputes_theme() {
    let app = test_app_state();
    let (id, auth) = user(&app);

    let body = Json(ColorRequest { primary_color: "#000000".into() });
    let Json(view) = set_color(State(app.state.clone()), auth(), body).await.unwrap();

    assert_eq!(view.theme.primary, "0 0% 0%");
    assert_eq!(view.theme.primary_hover, "0 0% 0%");
    assert_eq!(app.records.stored_settings(id).unwrap().primary_color, "#000000");
}

#[tokio::test]
async fn invalid_color_is_rejected() {
    let app = test_app_state();
    let (_, auth) = user(&app);

    let body = Json(ColorRequest { primary_color: "azul".into() });
    let err = set_color(State(app.state.clone()), auth(), body).await.unwrap_err();

    assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.records.calls("upsert_settings"), 0);
}

#[tokio::test]
async fn failed_save_keeps_optimistic_value_with_notice() {
    let app = test_app_state();
    let (_, auth) = user(&app);
    app.records.fail_on("upsert_settings");

    let body = Json(ColorRequest { primary_color: "#ff0000".into() });
    let Json(view) = set_color(State(app.state.clone()), auth(), body).await.unwrap();

    assert_eq!(view.settings.primary_color, "#ff0000");
    assert_eq!(view.notice.map(|n| n.message), Some("Erro ao salvar configurações".to_owned()));

    let Json(again) = get_settings(State(app.state.clone()), auth()).await;
    assert_eq!(again.settings.primary_color, "#ff0000");
}

#[tokio::test]
async fn blank_logo_url_clears_the_logo() {
    let app = test_app_state();
    let (id, auth) = user(&app);

    let body = Json(LogoUrlRequest { logo_url: Some("https://cdn.example.com/a.png".into()) });
    set_logo_url(State(app.state.clone()), auth(), body).await;
    let body = Json(LogoUrlRequest { logo_url: Some("   ".into()) });
    let Json(view) = set_logo_url(State(app.state.clone()), auth(), body).await;

    assert!(view.settings.logo_url.is_none());
    assert!(app.records.stored_settings(id).unwrap().logo_url.is_none());
}

#[tokio::test]
async fn logo_upload_stores_object_and_links_it() {
    let app = test_app_state();
    let (id, auth) = user(&app);

    let Json(view) = upload_logo(
        State(app.state.clone()),
        auth(),
        png_headers("image/png"),
        Bytes::from_static(&[0x89, b'P', b'N', b'G']),
    )
    .await
    .unwrap();

    let keys = app.storage.keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with(&format!("branding/logos/{id}-")));
    let url = view.settings.logo_url.unwrap();
    assert!(url.ends_with(".png"));
}

#[tokio::test]
async fn non_image_upload_is_refused_before_storage() {
    let app = test_app_state();
    let (_, auth) = user(&app);

    let err = upload_logo(State(app.state.clone()), auth(), png_headers("text/plain"), Bytes::from_static(b"hi"))
        .await
        .unwrap_err();

    assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(app.storage.keys().is_empty());
}

#[tokio::test]
async fn svg_logo_is_refused_before_storage() {
    let app = test_app_state();
    let (id, auth) = user(&app);
    let svg = Bytes::from_static(b"<svg xmlns=\"http://www.w3.org/2000/svg\"><script>fetch('/api/users')</script></svg>");

    let err = upload_logo(State(app.state.clone()), auth(), png_headers("image/svg+xml"), svg)
        .await
        .unwrap_err();

    assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(app.storage.keys().is_empty());
    assert!(app.records.stored_settings(id).is_none());
}

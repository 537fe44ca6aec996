mod backend;
mod config;
mod console;
mod db;
mod error;
mod model;
mod routes;
mod state;

use std::sync::Arc;

use backend::auth::PgAuthProvider;
use backend::records::PgRecordStore;
use backend::storage::LocalBucket;
use backend::realtime::spawn_pg_listener;
use backend::{AuthProvider, Backend, ChangeFeed};

#[tokio::main]
async fn main() {
    // A missing .env file is fine; real deployments set the environment.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let changes = ChangeFeed::new();
    let auth = Arc::new(PgAuthProvider::new(pool.clone()));
    let backend = Backend {
        records: Arc::new(PgRecordStore::new(pool.clone())),
        auth: auth.clone(),
        storage: Arc::new(LocalBucket::new(config.storage_dir.clone(), &config.public_url)),
        changes: changes.clone(),
    };

    // Table changes from any client of the database fan out to live lists.
    let _realtime = spawn_pg_listener(pool, changes);

    let port = config.port;
    let state = state::AppState::new(backend, config);

    // Warm settings on sign-in, drop them on sign-out.
    let _settings = state.settings.spawn_session_listener(auth.session_events());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "barden-crm listening");
    axum::serve(listener, app).await.expect("server failed");
}

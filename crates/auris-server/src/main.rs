use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use auris_api::auth::{self, AppState, AppStateInner};
use auris_api::middleware::{optional_auth, require_auth};
use auris_api::{account, discovery, reactions, whispers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auris=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = auris_api::middleware::jwt_secret();
    let db_path = std::env::var("AURIS_DB_PATH").unwrap_or_else(|_| "auris.db".into());
    let host = std::env::var("AURIS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("AURIS_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = auris_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner { db, jwt_secret });

    // Routes
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/anonymous-session", post(auth::anonymous_session))
        .route("/api/auth/reset-session", post(auth::reset_session))
        .route("/api/whispers/nearby", get(whispers::nearby))
        .with_state(app_state.clone());

    // Anonymous callers welcome; a Bearer token adds account linkage.
    let optional_auth_routes = Router::new()
        .route("/api/whispers", post(whispers::create_whisper))
        .route("/api/whispers/mine", get(whispers::mine))
        .route("/api/whispers/discovered", get(whispers::discovered))
        .route("/api/whispers/{whisper_id}/discover", post(discovery::discover))
        .route("/api/whispers/{whisper_id}/react", post(reactions::react))
        .layer(middleware::from_fn_with_state(app_state.clone(), optional_auth))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/api/account/profile", get(account::profile))
        .route("/api/account/reset", post(account::reset_content))
        .route("/api/account", delete(account::delete_account))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(optional_auth_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Auris server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

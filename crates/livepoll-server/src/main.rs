use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use livepoll_api::auth::{AppState, AppStateInner};
use livepoll_api::{polls, users, votes};
use livepoll_gateway::broadcaster::UpdateBroadcaster;
use livepoll_gateway::connection;
use livepoll_gateway::registry::SubscriptionRegistry;

#[derive(Clone)]
struct ServerState {
    app: AppState,
    registry: SubscriptionRegistry,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livepoll=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("LIVEPOLL_DB_PATH").unwrap_or_else(|_| "livepoll.db".into());
    let host = std::env::var("LIVEPOLL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("LIVEPOLL_PORT")
        .unwrap_or_else(|_| "8000".into())
        .parse()?;

    // Init store
    let db = Arc::new(livepoll_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state: one registry per server process, injected everywhere
    let registry = SubscriptionRegistry::new();
    let broadcaster = UpdateBroadcaster::new(registry.clone());
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        broadcaster,
    });

    let state = ServerState {
        app: app_state.clone(),
        registry,
    };

    // Routes
    let api_routes = Router::new()
        .route("/api/users", post(users::create_user))
        .route("/api/users", get(users::list_users))
        .route("/api/users/{user_id}", get(users::get_user))
        .route("/api/polls", post(polls::create_poll))
        .route("/api/polls", get(polls::list_polls))
        .route("/api/polls/{poll_id}", get(polls::get_poll))
        .route("/api/votes", post(votes::cast_vote))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/ws/{poll_id}", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(api_routes)
        .merge(ws_route)
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Livepoll server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    Path(poll_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, poll_id, state.registry, state.app.db.clone())
    })
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

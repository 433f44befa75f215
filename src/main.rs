//! CrickBid - Live Cricket Auction Backend
//! Mission: Run tournament player drafts with real-time bidding
//!
//! One authoritative process owns the auction state machine; bidder and
//! viewer clients talk REST for mutations and WebSocket for live updates.

use anyhow::{Context, Result};
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    middleware,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use dotenv::dotenv;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crickbid_backend::{
    api,
    auction::{topics, AuctionEngine, AuctionStore, NotificationBus},
    auth::{api as auth_api, auth_middleware, AuthState, JwtHandler, UserStore},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("🏏 CrickBid Auction Engine Starting");

    // Authentication
    let auth_db_path = resolve_data_path(env::var("AUTH_DB_PATH").ok(), "crickbid_auth.db");
    let jwt_secret = env::var("JWT_SECRET")
        .unwrap_or_else(|_| "dev-secret-change-in-production-minimum-32-characters".to_string());

    let user_store = Arc::new(UserStore::new(&auth_db_path)?);
    let jwt_handler = Arc::new(JwtHandler::new(jwt_secret));
    let auth_state = AuthState::new(user_store.clone(), jwt_handler.clone());

    info!("🔐 Authentication initialized at: {}", auth_db_path);

    // Auction store + engine
    let db_path = resolve_data_path(env::var("DB_PATH").ok(), "crickbid_auction.db");
    let store = AuctionStore::new(&db_path)?;
    info!("📊 Auction database initialized at: {}", db_path);

    let bus_capacity = env::var("BUS_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(1000);
    let bus = NotificationBus::new(bus_capacity);
    let engine = AuctionEngine::new(store, bus.clone());

    let app_state = AppState { engine, bus };

    // Auth routes (separate router with auth state)
    let auth_router = Router::new()
        .route("/api/auth/login", post(auth_api::login))
        .with_state(auth_state.clone());

    let protected_auth_router = Router::new()
        .route("/api/auth/me", get(auth_api::get_current_user))
        .route(
            "/api/auth/users",
            post(auth_api::create_user).get(auth_api::list_users),
        )
        .route("/api/auth/users/:id", delete(auth_api::delete_user))
        .route_layer(middleware::from_fn_with_state(
            jwt_handler.clone(),
            auth_middleware,
        ))
        .with_state(auth_state);

    // Protected auction routes
    let protected_routes = Router::new()
        .route(
            "/api/tournaments/:tid/auction/current",
            get(api::get_current_auction),
        )
        .route(
            "/api/tournaments/:tid/auction/history",
            get(api::get_auction_history),
        )
        .route("/api/tournaments/:tid/teams", get(api::get_teams))
        .route(
            "/api/tournaments/:tid/participations",
            get(api::get_participations),
        )
        .route("/api/auction/start", post(api::post_start_auction))
        .route("/api/auction/bid", post(api::post_place_bid))
        .route("/api/auction/complete", post(api::post_complete_auction))
        .route("/api/auction/mark-unsold", post(api::post_mark_unsold))
        .route("/api/tournaments/:tid/reset", post(api::post_reset))
        .route(
            "/api/tournaments/:tid/revert-unsold",
            post(api::post_revert_unsold),
        )
        .route("/api/teams", post(api::post_create_team))
        .route("/api/players/register", post(api::post_register_player))
        .route(
            "/api/tournaments/:tid/players/:pid",
            delete(api::delete_participation),
        )
        .route("/ws", get(websocket_handler))
        .route_layer(middleware::from_fn_with_state(
            jwt_handler.clone(),
            auth_middleware,
        ))
        .with_state(app_state.clone());

    // Public routes
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(auth_router)
        .merge(protected_auth_router)
        .layer(CorsLayer::permissive());

    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crickbid_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn default_data_path(filename: &str) -> String {
    // Anchor defaults to the crate directory
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    base.join(filename).to_string_lossy().to_string()
}

fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return default_data_path(default_filename);
    };

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }

    // Treat relative paths as relative to the crate directory, not the
    // caller's cwd.
    base.join(p).to_string_lossy().to_string()
}

fn load_env() {
    // Standard dotenv search (cwd + parents), then the crate directory for
    // runs launched with --manifest-path from elsewhere.
    let _ = dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidates = [manifest_dir.join(".env"), manifest_dir.join("../.env")];

    for p in candidates {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }
}

#[derive(Debug, Deserialize)]
struct WsParams {
    tournament: String,
}

/// WebSocket handler for real-time auction streaming. Clients subscribe to a
/// single tournament; auth already ran in the middleware (token=... query).
async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.tournament))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, tournament_id: String) {
    let mut rx = state.bus.subscribe();
    let update_topic = topics::auction_update(&tournament_id);
    let result_topic = topics::auction_result(&tournament_id);

    // On connect, replay the live auction so late joiners aren't blank until
    // the next event.
    match state.engine.current_auction(&tournament_id).await {
        Ok(Some(auction)) => {
            let msg = serde_json::json!({
                "topic": update_topic,
                "payload": auction,
            });
            if socket.send(Message::Text(msg.to_string())).await.is_err() {
                return;
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Failed to load current auction for ws replay: {}", e),
    }

    loop {
        tokio::select! {
            // Forward this tournament's events to the client
            Ok(envelope) = rx.recv() => {
                if envelope.topic != update_topic && envelope.topic != result_topic {
                    continue;
                }
                let msg = serde_json::json!({
                    "topic": envelope.topic,
                    "payload": envelope.payload,
                });
                if socket.send(Message::Text(msg.to_string())).await.is_err() {
                    break;
                }
            }
            // Handle incoming messages from client
            Some(Ok(msg)) = socket.recv() => {
                match msg {
                    Message::Text(text) => {
                        if text == "ping" {
                            let _ = socket.send(Message::Text("pong".to_string())).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "🏏 CrickBid Operational"
}

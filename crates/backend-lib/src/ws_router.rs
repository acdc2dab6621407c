// ============================
// crates/backend-lib/src/ws_router.rs
// ============================
//! HTTP router and WebSocket connection handling.
use crate::auth::Principal;
use crate::error::AppError;
use crate::handlers::{append_location, latest_location};
use crate::metrics::{WS_ACTIVE, WS_CONNECTION, WS_DISCONNECTION};
use crate::middleware::{bearer_token, require_bearer};
use crate::storage::LocationStore;
use crate::websocket::WebSocketHandler;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query, State,
    },
    http::HeaderMap,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use triptrack_common::ServerToClient;

/// Query string accepted on `/ws`
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Create the application router
pub fn create_router<S: LocationStore + Clone + 'static>(state: Arc<AppState<S>>) -> Router {
    let locations = Router::new()
        .route("/locations", post(append_location::<S>))
        .route("/locations/{booking_id}", get(latest_location::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer::<S>,
        ));

    Router::new()
        .route("/ws", get(ws_handler::<S>))
        .route("/health", get(health))
        .merge(locations)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Handler for WebSocket upgrades
pub async fn ws_handler<S: LocationStore + Clone + 'static>(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    State(state): State<Arc<AppState<S>>>,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)
        .map(str::to_string)
        .or(params.token.filter(|t| !t.is_empty()));
    let principal = authenticate_upgrade(&state, token.as_deref()).await?;

    tracing::info!(%peer, user = principal.as_ref().map(|p| p.user_id.as_str()), "websocket upgrade");

    let relay = Arc::clone(&state.relay);
    Ok(ws
        .on_upgrade(move |socket| async move {
            let (mut handler, outbound) = WebSocketHandler::new(&relay, principal);
            handler.set_peer(peer);
            handle_socket(socket, handler, outbound).await;
        })
        .into_response())
}

/// Resolve the principal behind an upgrade request. Without
/// `relay.require_token` a missing or bad token yields an anonymous connection.
async fn authenticate_upgrade<S>(
    state: &AppState<S>,
    token: Option<&str>,
) -> Result<Option<Principal>, AppError> {
    let require_token = state.settings.relay.require_token;

    match token {
        Some(token) => match state.auth.verify(token).await {
            Ok(principal) => Ok(Some(principal)),
            Err(e) if require_token => Err(e),
            Err(e) => {
                tracing::warn!("accepting anonymous websocket after bad token: {e}");
                Ok(None)
            },
        },
        None if require_token => Err(AppError::Auth("no Bearer token".to_string())),
        None => Ok(None),
    }
}

async fn handle_socket(
    socket: WebSocket,
    mut handler: WebSocketHandler,
    mut outbound: mpsc::Receiver<ServerToClient>,
) {
    counter!(WS_CONNECTION).increment(1);
    gauge!(WS_ACTIVE).increment(1.0);

    let (mut sink, mut stream) = socket.split();
    let id = handler.id();

    // Forward relayed frames to the socket
    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("failed to encode frame for {id}: {e}");
                    continue;
                },
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handler.handle_text(text.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => {},
            Err(e) => {
                tracing::debug!("websocket {id} read error: {e}");
                break;
            },
        }
    }

    // Leaves every joined room
    drop(handler);
    send_task.abort();

    counter!(WS_DISCONNECTION).increment(1);
    gauge!(WS_ACTIVE).decrement(1.0);
    tracing::info!("websocket {id} closed");
}

//! HTTP / WebSocket gateway.
//!
//! One WebSocket per device session.  The token is checked *before* the
//! upgrade is accepted; a missing or invalid token closes the transport
//! silently (no error frame, nothing for a probe to learn).  Once
//! established, the session's identity is fixed: every inbound envelope is
//! dispatched as the authenticated user, sequentially and in arrival order.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use convo_shared::ClientEnvelope;
use convo_store::{StoreError, User};

use crate::error::Result;
use crate::registry::Session;
use crate::state::{AppState, SessionCtx};
use crate::{media, messaging, social};

pub fn build_router(state: AppState) -> Router {
    let media_dir = state.media.base_path().to_path_buf();

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .nest_service("/media", ServeDir::new(media_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the listener fails or the task is cancelled.
pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct WsParams {
    token: Option<String>,
}

async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    match authenticate(&state, params.token.as_deref()).await {
        Some(user) => ws.on_upgrade(move |socket| handle_socket(socket, state, user)),
        None => {
            info!("closing unauthenticated session");
            ws.on_upgrade(|mut socket| async move {
                let _ = socket.send(WsMessage::Close(None)).await;
            })
        }
    }
}

/// Resolve the presented token to a stored user, or nothing.
async fn authenticate(state: &AppState, token: Option<&str>) -> Option<User> {
    let token = token?;
    let username = state.auth.verify(token)?;

    let db = state.db.lock().await;
    match db.get_user_by_username(&username) {
        Ok(user) => Some(user),
        Err(StoreError::NotFound) => {
            // Valid signature over a username we have never seen; the login
            // service and this store have diverged.
            warn!(username = %username, "token verified but user not found");
            None
        }
        Err(e) => {
            error!(error = %e, "user lookup failed during authentication");
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, user: User) {
    let (mut sink, mut stream) = socket.split();
    let (session, mut rx) = Session::new();
    let session_id = session.id;
    let group = user.username.clone();

    state.registry.join(&group, session.clone());
    info!(user = %group, session = %session_id, "session connected");

    // Writer task: drains the session queue onto the wire, preserving the
    // FIFO order the router established.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let ctx = SessionCtx { user, session };
    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            WsMessage::Text(text) => {
                if let Err(e) = dispatch(&state, &ctx, &text).await {
                    // Operation failures are logged, never fatal to the
                    // session; no error frame goes out.
                    warn!(user = %group, session = %session_id, error = %e, "operation failed");
                }
            }
            WsMessage::Close(_) => break,
            // Ping/pong is handled by the transport layer.
            _ => {}
        }
    }

    state.registry.leave(&group, session_id);
    drop(ctx); // last queue handle; lets the writer drain and exit
    let _ = writer.await;
    info!(user = %group, session = %session_id, "session disconnected");
}

/// Parse one inbound text frame and route it to its engine.
///
/// Malformed or unrecognized frames are dropped with a debug log so an
/// older server tolerates newer clients.
async fn dispatch(state: &AppState, ctx: &SessionCtx, text: &str) -> Result<()> {
    let envelope: ClientEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(session = %ctx.session.id, error = %e, "ignoring unrecognized frame");
            return Ok(());
        }
    };

    debug!(user = %ctx.user.username, source = envelope.source(), "dispatching");

    match envelope {
        ClientEnvelope::Search { query } => social::search(state, ctx, &query).await,
        ClientEnvelope::Thumbnail { base64, filename } => {
            media::thumbnail(state, ctx, &base64, &filename).await
        }
        ClientEnvelope::RequestConnect { username } => {
            social::request_connect(state, ctx, &username).await
        }
        ClientEnvelope::RequestList => social::request_list(state, ctx).await,
        ClientEnvelope::RequestAccept { username } => {
            social::request_accept(state, ctx, &username).await
        }
        ClientEnvelope::FriendList => messaging::friend_list(state, ctx).await,
        ClientEnvelope::MessageSend {
            sender_id,
            connection_id,
            message,
            base64,
            filename,
        } => {
            if sender_id != ctx.user.id {
                // The session identity wins; the claimed id is never trusted.
                debug!(
                    claimed = sender_id,
                    actual = ctx.user.id,
                    "ignoring client-supplied sender id"
                );
            }
            let attachment = base64
                .as_deref()
                .map(|b64| (b64, filename.as_deref().unwrap_or("upload")));
            messaging::message_send(state, ctx, connection_id, &message, attachment).await
        }
        ClientEnvelope::MessageList {
            connection_id,
            page,
        } => messaging::message_list(state, ctx, connection_id, page).await,
        ClientEnvelope::MessageTyping { username } => {
            messaging::message_typing(state, ctx, &username).await
        }
    }
}

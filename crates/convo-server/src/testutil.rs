//! Shared fixtures for engine tests: an in-memory application state plus
//! helpers to seed users and attach fake sessions.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;

use convo_store::{Database, NewUser, User};

use crate::auth::AuthService;
use crate::config::ServerConfig;
use crate::media::MediaStore;
use crate::registry::{Session, SessionRegistry};
use crate::router::BroadcastRouter;
use crate::state::{AppState, SessionCtx};

/// Fully wired state over an in-memory database and a temp media dir.
/// Keep the returned `TempDir` alive for the duration of the test.
pub async fn test_state() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    let registry = Arc::new(SessionRegistry::new());
    let router = BroadcastRouter::new(Arc::clone(&registry));
    let config = ServerConfig::default();
    let media = MediaStore::new(
        dir.path().join("media"),
        config.public_base_url.clone(),
    )
    .await
    .unwrap();
    let auth = AuthService::new(config.auth_secret);

    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        registry,
        router,
        media: Arc::new(media),
        auth: Arc::new(auth),
        config: Arc::new(config),
    };
    (state, dir)
}

pub async fn seed_user(state: &AppState, username: &str) -> User {
    let db = state.db.lock().await;
    db.create_user(&NewUser {
        username: username.to_string(),
        first_name: String::new(),
        last_name: String::new(),
        email: format!("{username}@example.com"),
        password_hash: "x".to_string(),
    })
    .unwrap()
}

/// Attach a fake transport session for `user`: joins the registry under
/// the username and returns the context plus the outbound frame queue.
pub fn session_for(state: &AppState, user: &User) -> (SessionCtx, UnboundedReceiver<String>) {
    let (session, rx) = Session::new();
    state.registry.join(&user.username, session.clone());
    (
        SessionCtx {
            user: user.clone(),
            session,
        },
        rx,
    )
}

/// Pop one outbound frame and split it into `(source, data)`.
pub fn recv_json(rx: &mut UnboundedReceiver<String>) -> (String, serde_json::Value) {
    let frame = rx.try_recv().expect("expected an outbound frame");
    let mut value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    let source = value["source"].as_str().unwrap().to_string();
    (source, value["data"].take())
}

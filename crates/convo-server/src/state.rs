//! Shared application state handed to every routed operation.

use std::sync::Arc;

use tokio::sync::Mutex;

use convo_store::{Database, User};

use crate::auth::AuthService;
use crate::config::ServerConfig;
use crate::media::MediaStore;
use crate::registry::{Session, SessionRegistry};
use crate::router::BroadcastRouter;

/// Everything the engines need, constructed once in `main` (or per test).
#[derive(Clone)]
pub struct AppState {
    /// Entity store.  SQLite is single-writer; calls are short and the
    /// mutex keeps each store operation internally atomic.
    pub db: Arc<Mutex<Database>>,
    pub registry: Arc<SessionRegistry>,
    pub router: BroadcastRouter,
    pub media: Arc<MediaStore>,
    pub auth: Arc<AuthService>,
    pub config: Arc<ServerConfig>,
}

/// The authenticated identity and live session behind one transport.
///
/// Identity is established before the transport is accepted and is
/// immutable for the session's lifetime, so every routed operation acts as
/// an authenticated invocation by construction.
pub struct SessionCtx {
    pub user: User,
    pub session: Session,
}

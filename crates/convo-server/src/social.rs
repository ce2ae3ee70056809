//! Social graph engine: user search and the connection state machine
//! (request -> accept).

use tracing::{info, warn};

use convo_store::StoreError;

use crate::error::{Result, ServerError};
use crate::render;
use crate::state::{AppState, SessionCtx};

/// `search`: find users matching `query`, each annotated with the
/// caller-relative connection status.  The reply targets only the invoking
/// session, not the caller's whole group.
pub async fn search(state: &AppState, ctx: &SessionCtx, query: &str) -> Result<()> {
    let results = {
        let db = state.db.lock().await;
        let candidates = db.search_users(query, ctx.user.id)?;
        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let status = db.connection_status(ctx.user.id, candidate.id)?;
            results.push(render::search_result(&candidate, status));
        }
        results
    };

    state.router.send_to(&ctx.session, "search", &results);
    Ok(())
}

/// `request-connect`: get-or-create the directional connection
/// `(caller, target)` and show it to both sides.  An unknown target is a
/// silent no-op.
pub async fn request_connect(state: &AppState, ctx: &SessionCtx, username: &str) -> Result<()> {
    let (connection, target) = {
        let mut db = state.db.lock().await;
        let target = match db.get_user_by_username(username) {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                warn!(user = %ctx.user.username, target = %username, "request-connect to unknown user");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let connection = db.get_or_create_connection(ctx.user.id, target.id)?;
        (connection, target)
    };

    let payload = render::connection(&connection, &ctx.user, &target);

    // The caller's invoking device gets a direct reply; every live session
    // of the target sees the incoming request in real time.
    state
        .router
        .send_to(&ctx.session, "request-connect", &payload);
    state
        .router
        .send(&target.username, "request-connect", &payload);
    Ok(())
}

/// `request-list`: pending requests addressed to the caller, newest first.
/// Point-to-point reply.
pub async fn request_list(state: &AppState, ctx: &SessionCtx) -> Result<()> {
    let payloads = {
        let db = state.db.lock().await;
        db.pending_requests_for(ctx.user.id)?
            .iter()
            .map(|request| render::connection(&request.connection, &request.sender, &ctx.user))
            .collect::<Vec<_>>()
    };

    state.router.send_to(&ctx.session, "request-list", &payloads);
    Ok(())
}

/// `request-accept`: flip the pending connection from `username` to
/// accepted and notify both parties' groups.
///
/// Unlike `request-connect`, a missing precondition here is
/// caller-controlled, so it surfaces as an error (logged by the gateway;
/// no error envelope is sent).  A lost double-accept race stops quietly so
/// `friend-new` cannot fire twice.
pub async fn request_accept(state: &AppState, ctx: &SessionCtx, username: &str) -> Result<()> {
    let (connection, sender, receiver) = {
        let db = state.db.lock().await;
        let sender = db.get_user_by_username(username)?;
        let pending = db.find_pending(sender.id, ctx.user.id)?.ok_or_else(|| {
            ServerError::NotFound(format!("no pending request from '{username}'"))
        })?;

        if !db.accept_connection(pending.id)? {
            // Another session won the race and already fired the events.
            return Ok(());
        }
        db.get_connection_with_parties(pending.id)?
    };

    info!(
        sender = %sender.username,
        receiver = %receiver.username,
        connection = connection.id,
        "connection accepted"
    );

    // Both groups learn about the state change, including the caller's own
    // other devices.
    let payload = render::connection(&connection, &sender, &receiver);
    state.router.send(&sender.username, "request-accept", &payload);
    state
        .router
        .send(&receiver.username, "request-accept", &payload);

    // The friend entry is viewer-relative: each side sees the *other* party.
    state.router.send(
        &sender.username,
        "friend-new",
        &render::new_friend(&connection, &receiver),
    );
    state.router.send(
        &receiver.username,
        "friend-new",
        &render::new_friend(&connection, &sender),
    );
    Ok(())
}

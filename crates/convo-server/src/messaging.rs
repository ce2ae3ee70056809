//! Messaging engine: conversation overviews, message delivery, history
//! pagination and typing passthrough.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};

use convo_shared::types::TypingPayload;
use convo_store::StoreError;

use crate::error::Result;
use crate::render;
use crate::state::{AppState, SessionCtx};

/// `friend-list`: the caller's accepted conversations, most recently
/// active first.  Broadcast to the caller's whole group so every device
/// refreshes its sidebar.
pub async fn friend_list(state: &AppState, ctx: &SessionCtx) -> Result<()> {
    let payloads = {
        let db = state.db.lock().await;
        db.accepted_connections_for(ctx.user.id)?
            .iter()
            .map(render::friend_overview)
            .collect::<Vec<_>>()
    };

    state
        .router
        .send(&ctx.user.username, "friend-list", &payloads);
    Ok(())
}

/// `message-send`: persist a message (with an optional image attachment)
/// on an accepted connection, then fan the event out to both parties.
///
/// Each side receives its own rendering: the ownership flag and the
/// `friend` field are relative to the recipient, so a group is never sent
/// another viewer's shape.
pub async fn message_send(
    state: &AppState,
    ctx: &SessionCtx,
    connection_id: i64,
    content: &str,
    attachment: Option<(&str, &str)>,
) -> Result<()> {
    let (_, party_a, party_b) = {
        let db = state.db.lock().await;
        match db.get_connection_with_parties(connection_id) {
            Ok(parts) => parts,
            Err(StoreError::NotFound) => {
                warn!(
                    user = %ctx.user.username,
                    connection = connection_id,
                    "message-send to unknown connection"
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    };

    // Attachment processing happens outside the store lock.
    let image_url = match attachment {
        Some((base64_payload, filename)) => {
            let bytes = match BASE64.decode(base64_payload.trim()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(
                        user = %ctx.user.username,
                        filename = filename,
                        error = %e,
                        "message attachment is not valid base64"
                    );
                    return Ok(());
                }
            };
            debug!(
                user = %ctx.user.username,
                filename = filename,
                size = bytes.len(),
                "processing message attachment"
            );
            Some(
                state
                    .media
                    .put_message_image(&ctx.user.username, &bytes)
                    .await?,
            )
        }
        None => None,
    };

    let message = {
        let db = state.db.lock().await;
        db.insert_message(connection_id, ctx.user.id, content, image_url.as_deref())?
    };

    let (caller, partner) = if party_a.id == ctx.user.id {
        (&party_a, &party_b)
    } else {
        (&party_b, &party_a)
    };

    state.router.send(
        &caller.username,
        "message-send",
        &render::message_event(&message, caller, partner),
    );
    state.router.send(
        &partner.username,
        "message-send",
        &render::message_event(&message, partner, caller),
    );
    Ok(())
}

/// `message-list`: one page of history (newest first), rendered relative
/// to the caller, broadcast to the caller's group.
pub async fn message_list(
    state: &AppState,
    ctx: &SessionCtx,
    connection_id: i64,
    page: u32,
) -> Result<()> {
    let page_data = {
        let db = state.db.lock().await;
        db.messages_page(connection_id, page)?
    };

    let payload = render::message_page(connection_id, &page_data, &ctx.user);
    state
        .router
        .send(&ctx.user.username, "message-list", &payload);
    Ok(())
}

/// `message-typing`: forward a typing notice to the named user's group.
/// Pure passthrough; nothing is persisted and an offline target drops it.
pub async fn message_typing(state: &AppState, ctx: &SessionCtx, username: &str) -> Result<()> {
    state.router.send(
        username,
        "message-typing",
        &TypingPayload {
            username: ctx.user.username.clone(),
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::EMPTY_PREVIEW;
    use crate::testutil::{recv_json, seed_user, session_for, test_state};
    use convo_store::User;

    async fn befriend(state: &crate::state::AppState, a: &User, b: &User) -> i64 {
        let mut db = state.db.lock().await;
        let conn = db.get_or_create_connection(a.id, b.id).unwrap();
        db.accept_connection(conn.id).unwrap();
        conn.id
    }

    #[tokio::test]
    async fn message_send_renders_per_recipient() {
        let (state, _dir) = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let bob = seed_user(&state, "bob").await;
        let conn_id = befriend(&state, &alice, &bob).await;

        let (alice_ctx, mut alice_rx) = session_for(&state, &alice);
        let (_bob_ctx, mut bob_rx) = session_for(&state, &bob);

        message_send(&state, &alice_ctx, conn_id, "hello", None)
            .await
            .unwrap();

        let (source, data) = recv_json(&mut alice_rx);
        assert_eq!(source, "message-send");
        assert_eq!(data["message"]["content"], "hello");
        assert_eq!(data["message"]["isMyMessage"], true);
        assert_eq!(data["friend"]["username"], "bob");

        let (source, data) = recv_json(&mut bob_rx);
        assert_eq!(source, "message-send");
        assert_eq!(data["message"]["isMyMessage"], false);
        assert_eq!(data["friend"]["username"], "alice");
    }

    #[tokio::test]
    async fn message_send_reaches_all_devices_of_both_parties() {
        let (state, _dir) = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let bob = seed_user(&state, "bob").await;
        let conn_id = befriend(&state, &alice, &bob).await;

        let (alice_ctx, mut alice_rx1) = session_for(&state, &alice);
        let (_a2, mut alice_rx2) = session_for(&state, &alice);
        let (_b1, mut bob_rx1) = session_for(&state, &bob);
        let (_b2, mut bob_rx2) = session_for(&state, &bob);

        message_send(&state, &alice_ctx, conn_id, "hi all", None)
            .await
            .unwrap();

        for rx in [&mut alice_rx1, &mut alice_rx2, &mut bob_rx1, &mut bob_rx2] {
            let (source, _) = recv_json(rx);
            assert_eq!(source, "message-send");
        }
    }

    #[tokio::test]
    async fn message_send_to_unknown_connection_is_silent() {
        let (state, _dir) = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let (ctx, mut rx) = session_for(&state, &alice);

        message_send(&state, &ctx, 999, "into the void", None)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());

        let db = state.db.lock().await;
        assert_eq!(db.count_messages(999).unwrap(), 0);
    }

    #[tokio::test]
    async fn message_send_with_bad_attachment_is_dropped() {
        let (state, _dir) = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let bob = seed_user(&state, "bob").await;
        let conn_id = befriend(&state, &alice, &bob).await;
        let (ctx, mut rx) = session_for(&state, &alice);

        message_send(&state, &ctx, conn_id, "pic", Some(("%%%not-base64%%%", "p.png")))
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
        let db = state.db.lock().await;
        assert_eq!(db.count_messages(conn_id).unwrap(), 0);
    }

    #[tokio::test]
    async fn message_send_with_attachment_stores_image_url() {
        let (state, _dir) = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let bob = seed_user(&state, "bob").await;
        let conn_id = befriend(&state, &alice, &bob).await;
        let (ctx, mut rx) = session_for(&state, &alice);

        let png = {
            let img = image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 255]));
            let mut out = Vec::new();
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
                .unwrap();
            out
        };
        let b64 = BASE64.encode(&png);

        message_send(&state, &ctx, conn_id, "", Some((b64.as_str(), "blue.png")))
            .await
            .unwrap();

        let (_, data) = recv_json(&mut rx);
        let url = data["message"]["imageUrl"].as_str().unwrap();
        assert!(url.contains("/media/messages/alice/"));
    }

    #[tokio::test]
    async fn friend_list_orders_by_recent_activity() {
        let (state, _dir) = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let bob = seed_user(&state, "bob").await;
        let carol = seed_user(&state, "carol").await;
        let bob_conn = befriend(&state, &alice, &bob).await;
        let carol_conn = befriend(&state, &alice, &carol).await;

        {
            let db = state.db.lock().await;
            db.insert_message(carol_conn, carol.id, "older", None).unwrap();
            db.insert_message(bob_conn, bob.id, "newest", None).unwrap();
        }

        let (ctx, mut rx) = session_for(&state, &alice);
        friend_list(&state, &ctx).await.unwrap();

        let (source, data) = recv_json(&mut rx);
        assert_eq!(source, "friend-list");
        let friends = data.as_array().unwrap();
        assert_eq!(friends.len(), 2);
        assert_eq!(friends[0]["friend"]["username"], "bob");
        assert_eq!(friends[0]["preview"], "newest");
        assert_eq!(friends[1]["friend"]["username"], "carol");
        assert_eq!(friends[1]["preview"], "older");
    }

    #[tokio::test]
    async fn friend_list_uses_placeholder_for_empty_conversations() {
        let (state, _dir) = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let bob = seed_user(&state, "bob").await;
        befriend(&state, &alice, &bob).await;

        let (ctx, mut rx) = session_for(&state, &alice);
        friend_list(&state, &ctx).await.unwrap();

        let (_, data) = recv_json(&mut rx);
        assert_eq!(data[0]["preview"], EMPTY_PREVIEW);
    }

    #[tokio::test]
    async fn message_list_pages_and_is_viewer_relative() {
        let (state, _dir) = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let bob = seed_user(&state, "bob").await;
        let conn_id = befriend(&state, &alice, &bob).await;

        {
            let db = state.db.lock().await;
            for i in 0..12 {
                let sender = if i % 2 == 0 { alice.id } else { bob.id };
                db.insert_message(conn_id, sender, &format!("m{i}"), None)
                    .unwrap();
            }
        }

        let (ctx, mut rx) = session_for(&state, &alice);
        message_list(&state, &ctx, conn_id, 0).await.unwrap();

        let (source, data) = recv_json(&mut rx);
        assert_eq!(source, "message-list");
        assert_eq!(data["connectionId"], conn_id);
        assert_eq!(data["next"], 1);
        assert_eq!(data["me"]["username"], "alice");
        let messages = data["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 10);
        // Newest first: m11 was sent by bob.
        assert_eq!(messages[0]["content"], "m11");
        assert_eq!(messages[0]["isMyMessage"], false);
        assert_eq!(messages[1]["isMyMessage"], true);

        message_list(&state, &ctx, conn_id, 1).await.unwrap();
        let (_, data) = recv_json(&mut rx);
        assert_eq!(data["messages"].as_array().unwrap().len(), 2);
        assert_eq!(data["next"], 0);
    }

    #[tokio::test]
    async fn message_list_on_empty_connection_is_empty_terminal_page() {
        let (state, _dir) = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let bob = seed_user(&state, "bob").await;
        let conn_id = befriend(&state, &alice, &bob).await;

        let (ctx, mut rx) = session_for(&state, &alice);
        message_list(&state, &ctx, conn_id, 0).await.unwrap();

        let (_, data) = recv_json(&mut rx);
        assert!(data["messages"].as_array().unwrap().is_empty());
        assert_eq!(data["next"], 0);
    }

    #[tokio::test]
    async fn typing_notice_reaches_target_group_only() {
        let (state, _dir) = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let bob = seed_user(&state, "bob").await;

        let (alice_ctx, mut alice_rx) = session_for(&state, &alice);
        let (_bob, mut bob_rx) = session_for(&state, &bob);

        message_typing(&state, &alice_ctx, "bob").await.unwrap();

        let (source, data) = recv_json(&mut bob_rx);
        assert_eq!(source, "message-typing");
        assert_eq!(data["username"], "alice");
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn typing_notice_to_offline_user_is_dropped() {
        let (state, _dir) = test_state().await;
        let alice = seed_user(&state, "alice").await;
        let (ctx, _rx) = session_for(&state, &alice);

        // No live sessions for "bob"; must not error.
        message_typing(&state, &ctx, "bob").await.unwrap();
    }
}

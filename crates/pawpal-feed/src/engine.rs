//! Opening conversations and keeping their feeds current.

use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use pawpal_shared::constants::{FIELD_CREATED_AT, FIELD_PARTICIPANTS, MESSAGES_COLLECTION};
use pawpal_shared::{IdentityProvider, UserId};
use pawpal_store::{
    Direction, Document, DocumentStore, Query, SnapshotEvent, StoreError, Subscription,
};

use crate::error::FeedError;
use crate::handle::{close_view, CloseReason, FeedHandle, FeedStatus, FeedView};
use crate::message::Message;

/// Which messages a conversation feed shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedScope {
    /// Only messages between the current user and the counterpart.
    #[default]
    Pair,
    /// Every message the current user takes part in, with anyone.
    AllConversations,
}

impl FromStr for FeedScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pair" => Ok(Self::Pair),
            "all" => Ok(Self::AllConversations),
            other => Err(format!("unknown feed scope {other:?} (expected pair or all)")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedConfig {
    pub scope: FeedScope,
}

/// Opens conversation feeds against an injected store and identity provider.
#[derive(Clone)]
pub struct FeedEngine {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    config: FeedConfig,
}

impl FeedEngine {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_config(store, identity, FeedConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        config: FeedConfig,
    ) -> Self {
        Self {
            store,
            identity,
            config,
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Open a live, newest-first feed of the conversation between the
    /// signed-in user and `counterpart`.
    ///
    /// The handle starts open and empty; the first snapshot (the full
    /// history) arrives asynchronously.  Must be called inside a tokio runtime.
    pub async fn open_conversation(&self, counterpart: &UserId) -> Result<FeedHandle, FeedError> {
        let viewer = self
            .identity
            .current_user()
            .ok_or(FeedError::Unauthenticated)?
            .id;
        if &viewer == counterpart {
            return Err(FeedError::InvalidCounterpart(viewer));
        }

        let subscription = self.store.subscribe(conversation_query(&viewer)).await?;
        let cancel = subscription.cancel_handle();

        let (view_tx, view_rx) = watch::channel(FeedView::opened());
        let view_tx = Arc::new(view_tx);

        let pump = tokio::spawn(run_feed(
            subscription,
            view_tx.clone(),
            viewer.clone(),
            counterpart.clone(),
            self.config.scope,
        ));

        info!(viewer = %viewer, counterpart = %counterpart, scope = ?self.config.scope, "conversation opened");

        Ok(FeedHandle::new(
            viewer,
            counterpart.clone(),
            self.store.clone(),
            self.identity.clone(),
            view_tx,
            view_rx,
            cancel,
            pump,
        ))
    }
}

/// Every message `viewer` takes part in, newest first.
pub fn conversation_query(viewer: &UserId) -> Query {
    Query::new(MESSAGES_COLLECTION)
        .where_array_contains(FIELD_PARTICIPANTS, viewer.as_str())
        .order_by(FIELD_CREATED_AT, Direction::Descending)
}

/// Turn a snapshot into the visible list, keeping the store's order.
fn materialize(
    docs: &[Document],
    viewer: &UserId,
    counterpart: &UserId,
    scope: FeedScope,
) -> Vec<Message> {
    docs.iter()
        .filter_map(|doc| match Message::from_document(doc) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(doc = %doc.id, error = %e, "skipping malformed message");
                None
            }
        })
        .filter(|m| m.participants.contains(viewer))
        .filter(|m| scope == FeedScope::AllConversations || m.participants.contains(counterpart))
        .collect()
}

async fn run_feed(
    mut subscription: Subscription,
    view_tx: Arc<watch::Sender<FeedView>>,
    viewer: UserId,
    counterpart: UserId,
    scope: FeedScope,
) {
    while let Some(event) = subscription.next().await {
        match event {
            SnapshotEvent::Snapshot(docs) => {
                let messages = Arc::new(materialize(&docs, &viewer, &counterpart, scope));
                let count = messages.len();

                // Checked and applied under the channel's lock, so a
                // concurrent close() either wins entirely or not at all.
                let applied = view_tx.send_if_modified(|view| {
                    if view.status != FeedStatus::Open {
                        return false;
                    }
                    view.messages = messages;
                    view.revision += 1;
                    true
                });
                if !applied {
                    return;
                }
                debug!(viewer = %viewer, counterpart = %counterpart, count, "feed updated");
            }
            SnapshotEvent::Error(err) => {
                warn!(viewer = %viewer, counterpart = %counterpart, error = %err, "conversation subscription failed");
                close_view(&view_tx, CloseReason::SubscriptionFailed(Arc::new(err)));
                return;
            }
        }
    }

    if close_view(
        &view_tx,
        CloseReason::SubscriptionFailed(Arc::new(StoreError::SubscriptionClosed)),
    ) {
        warn!(viewer = %viewer, counterpart = %counterpart, "conversation subscription ended");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::handle::SendOutcome;
    use chrono::{TimeZone, Utc};
    use pawpal_shared::{DocumentId, StaticIdentity};
    use pawpal_store::{format_timestamp, DocumentData, MemoryStore, SqliteStore};
    use serde_json::{json, Value};

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn engine_for(store: &MemoryStore, user: &str) -> (FeedEngine, Arc<StaticIdentity>) {
        let identity = Arc::new(StaticIdentity::signed_in(uid(user)));
        let engine = FeedEngine::new(Arc::new(store.clone()), identity.clone());
        (engine, identity)
    }

    fn raw_message(id: &str, from: &str, to: &str, text: &str, secs: i64) -> Document {
        let ts = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        let fields = json!({
            "senderId": from,
            "receiverId": to,
            "participants": [from, to],
            "text": text,
            "createdAt": format_timestamp(ts),
        });
        match fields {
            Value::Object(fields) => Document::new(DocumentId::from(id), fields),
            _ => unreachable!(),
        }
    }

    async fn wait_for<F>(handle: &mut FeedHandle, pred: F) -> FeedView
    where
        F: Fn(&FeedView) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let view = handle.view();
                if pred(&view) {
                    return view;
                }
                if !handle.changed().await {
                    let view = handle.view();
                    assert!(pred(&view), "feed closed before the condition held");
                    return view;
                }
            }
        })
        .await
        .expect("timed out waiting for feed")
    }

    fn texts(view: &FeedView) -> Vec<&str> {
        view.messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_open_requires_signed_in_user() {
        let store = MemoryStore::new();
        let engine = FeedEngine::new(
            Arc::new(store.clone()),
            Arc::new(StaticIdentity::signed_out()),
        );
        let err = engine.open_conversation(&uid("bob")).await.unwrap_err();
        assert!(matches!(err, FeedError::Unauthenticated));
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_open_rejects_self_conversation() {
        let store = MemoryStore::new();
        let (engine, _) = engine_for(&store, "alice");
        let err = engine.open_conversation(&uid("alice")).await.unwrap_err();
        assert!(matches!(err, FeedError::InvalidCounterpart(_)));
    }

    #[tokio::test]
    async fn test_empty_history_is_an_empty_open_feed() {
        let store = MemoryStore::new();
        let (engine, _) = engine_for(&store, "alice");
        let mut handle = engine.open_conversation(&uid("nobody")).await.unwrap();

        let view = wait_for(&mut handle, |v| v.revision >= 1).await;
        assert_eq!(view.status, FeedStatus::Open);
        assert!(view.messages.is_empty());
    }

    #[tokio::test]
    async fn test_feed_is_newest_first() {
        let store = MemoryStore::new();
        store.put_raw("messages", raw_message("m1", "alice", "bob", "t1", 1));
        store.put_raw("messages", raw_message("m3", "bob", "alice", "t3", 3));
        store.put_raw("messages", raw_message("m2", "alice", "bob", "t2", 2));

        let (engine, _) = engine_for(&store, "alice");
        let mut handle = engine.open_conversation(&uid("bob")).await.unwrap();

        let view = wait_for(&mut handle, |v| v.messages.len() == 3).await;
        assert_eq!(texts(&view), vec!["t3", "t2", "t1"]);
    }

    #[tokio::test]
    async fn test_timestamp_ties_keep_store_order() {
        let store = MemoryStore::new();
        store.put_raw("messages", raw_message("a", "alice", "bob", "first", 5));
        store.put_raw("messages", raw_message("b", "bob", "alice", "second", 5));

        let expected: Vec<DocumentId> = store
            .query(&conversation_query(&uid("alice")))
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();

        let (engine, _) = engine_for(&store, "alice");
        let mut handle = engine.open_conversation(&uid("bob")).await.unwrap();
        let view = wait_for(&mut handle, |v| v.messages.len() == 2).await;

        let shown: Vec<DocumentId> = view.messages.iter().map(|m| m.id.clone()).collect();
        assert_eq!(shown, expected);
    }

    #[tokio::test]
    async fn test_conversation_over_sqlite_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        let alice_engine = FeedEngine::new(
            Arc::new(store.clone()),
            Arc::new(StaticIdentity::signed_in(uid("alice"))),
        );
        let bob_engine = FeedEngine::new(
            Arc::new(store.clone()),
            Arc::new(StaticIdentity::signed_in(uid("bob"))),
        );

        let mut alice = alice_engine.open_conversation(&uid("bob")).await.unwrap();
        let mut bob = bob_engine.open_conversation(&uid("alice")).await.unwrap();

        let _ = alice.send("first").await.unwrap();
        let _ = bob.send("second").await.unwrap();
        let _ = alice.send("third").await.unwrap();
        assert_eq!(bob.send("   ").await.unwrap(), SendOutcome::Skipped);

        for handle in [&mut alice, &mut bob] {
            let view = wait_for(handle, |v| v.messages.len() == 3).await;
            assert_eq!(texts(&view), vec!["third", "second", "first"]);
            assert_eq!(view.messages[1].sender_id, uid("bob"));
            assert_eq!(view.messages[1].receiver_id, uid("alice"));
            assert!(view.messages[0].created_at > view.messages[1].created_at);
        }

        alice.close();
        assert_eq!(store.subscriber_count(), 1);
        drop(bob);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_only_participant_messages_are_visible() {
        let store = MemoryStore::new();
        store.put_raw("messages", raw_message("m1", "alice", "bob", "to bob", 1));
        store.put_raw("messages", raw_message("m2", "carol", "alice", "from carol", 2));
        store.put_raw("messages", raw_message("m3", "bob", "carol", "not for alice", 3));

        let identity = Arc::new(StaticIdentity::signed_in(uid("alice")));
        let engine = FeedEngine::with_config(
            Arc::new(store.clone()),
            identity,
            FeedConfig {
                scope: FeedScope::AllConversations,
            },
        );
        let mut handle = engine.open_conversation(&uid("bob")).await.unwrap();

        let view = wait_for(&mut handle, |v| v.revision >= 1).await;
        assert_eq!(texts(&view), vec!["from carol", "to bob"]);
        assert!(view
            .messages
            .iter()
            .all(|m| m.participants.contains(&uid("alice"))));
    }

    #[tokio::test]
    async fn test_pair_scope_hides_other_conversations() {
        let store = MemoryStore::new();
        store.put_raw("messages", raw_message("m1", "alice", "bob", "to bob", 1));
        store.put_raw("messages", raw_message("m2", "carol", "alice", "from carol", 2));

        let (engine, _) = engine_for(&store, "alice");
        let mut handle = engine.open_conversation(&uid("bob")).await.unwrap();

        let view = wait_for(&mut handle, |v| v.revision >= 1).await;
        assert_eq!(texts(&view), vec!["to bob"]);
    }

    #[tokio::test]
    async fn test_blank_message_is_a_silent_no_op() {
        let store = MemoryStore::new();
        let (engine, _) = engine_for(&store, "alice");
        let mut handle = engine.open_conversation(&uid("bob")).await.unwrap();
        wait_for(&mut handle, |v| v.revision >= 1).await;

        assert_eq!(handle.send("  ").await.unwrap(), SendOutcome::Skipped);
        assert_eq!(handle.send("\n\t").await.unwrap(), SendOutcome::Skipped);

        tokio::task::yield_now().await;
        assert_eq!(store.len("messages"), 0);
        assert_eq!(handle.revision(), 1);
    }

    #[tokio::test]
    async fn test_message_reaches_both_feeds() {
        let store = MemoryStore::new();
        let (alice_engine, _) = engine_for(&store, "alice");
        let (bob_engine, _) = engine_for(&store, "bob");

        let mut alice = alice_engine.open_conversation(&uid("bob")).await.unwrap();
        let mut bob = bob_engine.open_conversation(&uid("alice")).await.unwrap();

        let outcome = alice.send("  Hello ").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Sent(_)));

        for handle in [&mut alice, &mut bob] {
            let view = wait_for(handle, |v| v.messages.len() == 1).await;
            let msg = &view.messages[0];
            assert_eq!(msg.text, "Hello");
            assert_eq!(msg.sender_id, uid("alice"));
            assert_eq!(msg.receiver_id, uid("bob"));
            assert!(msg.participants.contains(&uid("alice")));
            assert!(msg.participants.contains(&uid("bob")));
        }
    }

    #[tokio::test]
    async fn test_send_round_trips_through_participant_query() {
        let store = MemoryStore::new();
        let (engine, _) = engine_for(&store, "u1");
        let handle = engine.open_conversation(&uid("u2")).await.unwrap();

        let SendOutcome::Sent(id) = handle.send("hi").await.unwrap() else {
            panic!("message should have been sent");
        };

        let docs = store.query(&conversation_query(&uid("u1"))).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
        assert_eq!(docs[0].get("senderId"), Some(&json!("u1")));
        assert_eq!(docs[0].get("receiverId"), Some(&json!("u2")));
        assert_eq!(docs[0].get("text"), Some(&json!("hi")));
        assert!(docs[0].get("createdAt").is_some());
        assert_eq!(docs[0].fields.len(), 5);
    }

    #[tokio::test]
    async fn test_closed_handle_is_never_mutated() {
        let store = MemoryStore::new();
        let (engine, _) = engine_for(&store, "alice");
        let mut handle = engine.open_conversation(&uid("bob")).await.unwrap();
        wait_for(&mut handle, |v| v.revision >= 1).await;

        let before = handle.view();
        handle.close();
        assert_eq!(store.subscriber_count(), 0);

        store
            .insert(
                "messages",
                DocumentData::from_serializable(&json!({
                    "senderId": "bob",
                    "receiverId": "alice",
                    "participants": ["bob", "alice"],
                    "text": "too late",
                }))
                .unwrap()
                .server_timestamp("createdAt"),
            )
            .await
            .unwrap();
        tokio::task::yield_now().await;

        assert_eq!(handle.status(), FeedStatus::Closed);
        assert!(matches!(handle.close_reason(), Some(CloseReason::Requested)));
        assert_eq!(handle.revision(), before.revision);
        assert!(handle.messages().is_empty());
        assert!(!handle.changed().await || handle.messages().is_empty());
        assert!(!handle.changed().await);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_drop_cancels() {
        let store = MemoryStore::new();
        let (engine, _) = engine_for(&store, "alice");

        let handle = engine.open_conversation(&uid("bob")).await.unwrap();
        handle.close();
        handle.close();
        assert_eq!(store.subscriber_count(), 0);

        let handle = engine.open_conversation(&uid("bob")).await.unwrap();
        assert_eq!(store.subscriber_count(), 1);
        drop(handle);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_reopen_shows_full_history() {
        let store = MemoryStore::new();
        let (engine, _) = engine_for(&store, "alice");

        let mut first = engine.open_conversation(&uid("bob")).await.unwrap();
        for text in ["one", "two"] {
            let _ = first.send(text).await.unwrap();
        }
        wait_for(&mut first, |v| v.messages.len() == 2).await;
        first.close();

        let mut second = engine.open_conversation(&uid("bob")).await.unwrap();
        let _ = second.send("three").await.unwrap();

        let view = wait_for(&mut second, |v| v.messages.len() == 3).await;
        assert_eq!(texts(&view), vec!["three", "two", "one"]);
    }

    #[tokio::test]
    async fn test_subscription_error_closes_handle() {
        let store = MemoryStore::new();
        let (engine, _) = engine_for(&store, "alice");
        let mut handle = engine.open_conversation(&uid("bob")).await.unwrap();
        wait_for(&mut handle, |v| v.revision >= 1).await;

        store.fail_subscriptions("permission denied");
        let view = wait_for(&mut handle, |v| v.status == FeedStatus::Closed).await;

        match view.close_reason {
            Some(CloseReason::SubscriptionFailed(err)) => {
                assert!(matches!(*err, StoreError::Unavailable(_)));
            }
            other => panic!("unexpected close reason: {other:?}"),
        }
        tokio::time::timeout(Duration::from_secs(2), async {
            while handle.changed().await {}
        })
        .await
        .expect("changed() should settle once closed");
        assert!(matches!(handle.send("hi").await, Err(FeedError::Closed)));
    }

    #[tokio::test]
    async fn test_send_failure_is_reported() {
        let store = MemoryStore::new();
        let (engine, _) = engine_for(&store, "alice");
        let handle = engine.open_conversation(&uid("bob")).await.unwrap();

        store.fail_next_insert(StoreError::Unavailable("offline".into()));
        let err = handle.send("hello").await.unwrap_err();
        assert!(matches!(err, FeedError::Store(StoreError::Unavailable(_))));
        assert_eq!(store.len("messages"), 0);
    }

    #[tokio::test]
    async fn test_send_checks_identity_at_call_time() {
        let store = MemoryStore::new();
        let (engine, identity) = engine_for(&store, "alice");
        let handle = engine.open_conversation(&uid("bob")).await.unwrap();

        identity.sign_out();
        assert!(matches!(
            handle.send("hello").await,
            Err(FeedError::Unauthenticated)
        ));

        identity.sign_in(uid("mallory"));
        assert!(matches!(
            handle.send("hello").await,
            Err(FeedError::IdentityChanged { .. })
        ));
        assert_eq!(store.len("messages"), 0);
    }

    #[tokio::test]
    async fn test_malformed_documents_are_skipped() {
        let store = MemoryStore::new();
        store.put_raw("messages", raw_message("ok", "alice", "bob", "fine", 1));
        store.put_raw(
            "messages",
            Document::new(
                DocumentId::from("bad"),
                DocumentData::new()
                    .set("participants", json!(["alice", "bob"]))
                    .set("createdAt", "2024-01-01T00:00:00.000000000Z")
                    .resolve(Utc::now()),
            ),
        );

        let (engine, _) = engine_for(&store, "alice");
        let mut handle = engine.open_conversation(&uid("bob")).await.unwrap();
        let view = wait_for(&mut handle, |v| v.revision >= 1).await;
        assert_eq!(texts(&view), vec!["fine"]);
    }

    #[tokio::test]
    async fn test_non_canonical_timestamps_are_skipped() {
        let store = MemoryStore::new();
        store.put_raw("messages", raw_message("ok1", "alice", "bob", "one", 1));
        for (i, created_at) in ["2024-01-01T00:30", "2024-01-01T00:00:00.5Z", "soon"]
            .into_iter()
            .enumerate()
        {
            let mut doc = raw_message(&format!("odd{i}"), "bob", "alice", "odd", 0);
            doc.fields.insert("createdAt".into(), json!(created_at));
            store.put_raw("messages", doc);
        }
        store.put_raw("messages", raw_message("ok2", "bob", "alice", "two", 2));

        let (engine, _) = engine_for(&store, "alice");
        let mut handle = engine.open_conversation(&uid("bob")).await.unwrap();
        let view = wait_for(&mut handle, |v| v.revision >= 1).await;

        assert_eq!(view.messages.len(), 3);
        let mut shown = texts(&view);
        shown.retain(|t| *t != "odd");
        assert_eq!(shown, vec!["two", "one"]);
        assert_eq!(view.status, FeedStatus::Open);
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("pair".parse::<FeedScope>().unwrap(), FeedScope::Pair);
        assert_eq!(" ALL ".parse::<FeedScope>().unwrap(), FeedScope::AllConversations);
        assert!("group".parse::<FeedScope>().is_err());
    }
}

//! The caller-facing side of one open conversation.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use pawpal_shared::constants::MESSAGES_COLLECTION;
use pawpal_shared::{DocumentId, IdentityProvider, UserId};
use pawpal_store::{CancelHandle, DocumentStore, StoreError};

use crate::error::FeedError;
use crate::message::{Message, OutgoingMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone)]
pub enum CloseReason {
    /// The owner closed (or dropped) the handle.
    Requested,
    /// The live subscription failed or was ended by the store.
    SubscriptionFailed(Arc<StoreError>),
}

/// What a feed currently shows.
#[derive(Debug, Clone)]
pub struct FeedView {
    pub status: FeedStatus,
    /// Newest first, exactly in the order the store returned them.
    pub messages: Arc<Vec<Message>>,
    /// Number of snapshots applied so far.
    pub revision: u64,
    pub close_reason: Option<CloseReason>,
}

impl FeedView {
    pub(crate) fn opened() -> Self {
        Self {
            status: FeedStatus::Open,
            messages: Arc::new(Vec::new()),
            revision: 0,
            close_reason: None,
        }
    }
}

/// Result of [`FeedHandle::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum SendOutcome {
    /// A message document was created with this id.
    Sent(DocumentId),
    /// The text was blank after trimming; nothing was written.
    Skipped,
}

/// Move an open view to `Closed`.  Returns `false` if it was already closed.
pub(crate) fn close_view(view_tx: &watch::Sender<FeedView>, reason: CloseReason) -> bool {
    view_tx.send_if_modified(|view| {
        if view.status != FeedStatus::Open {
            return false;
        }
        view.status = FeedStatus::Closed;
        view.close_reason = Some(reason);
        true
    })
}

/// One open conversation between the signed-in user and a counterpart.
///
/// The feed is kept current by a background task fed from a live store
/// subscription.  Closing the handle (explicitly or by dropping it) cancels
/// that subscription; once `close` returns, no further snapshot can change
/// what the handle shows.
pub struct FeedHandle {
    viewer: UserId,
    counterpart: UserId,
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    view_tx: Arc<watch::Sender<FeedView>>,
    view_rx: watch::Receiver<FeedView>,
    cancel: CancelHandle,
    pump: JoinHandle<()>,
}

impl FeedHandle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        viewer: UserId,
        counterpart: UserId,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        view_tx: Arc<watch::Sender<FeedView>>,
        view_rx: watch::Receiver<FeedView>,
        cancel: CancelHandle,
        pump: JoinHandle<()>,
    ) -> Self {
        Self {
            viewer,
            counterpart,
            store,
            identity,
            view_tx,
            view_rx,
            cancel,
            pump,
        }
    }

    pub fn current_user(&self) -> &UserId {
        &self.viewer
    }

    pub fn counterpart(&self) -> &UserId {
        &self.counterpart
    }

    pub fn status(&self) -> FeedStatus {
        self.view_rx.borrow().status
    }

    pub fn is_open(&self) -> bool {
        self.status() == FeedStatus::Open
    }

    pub fn messages(&self) -> Arc<Vec<Message>> {
        self.view_rx.borrow().messages.clone()
    }

    pub fn revision(&self) -> u64 {
        self.view_rx.borrow().revision
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.view_rx.borrow().close_reason.clone()
    }

    pub fn view(&self) -> FeedView {
        self.view_rx.borrow().clone()
    }

    /// A receiver for observing the feed from another task.  It stops
    /// yielding changes once the handle is closed.
    pub fn watch(&self) -> watch::Receiver<FeedView> {
        self.view_tx.subscribe()
    }

    /// Wait until the view changes.  Returns `false` when the handle is closed
    /// and every change has already been observed.
    pub async fn changed(&mut self) -> bool {
        if self.view_rx.has_changed().unwrap_or(false) {
            let _ = self.view_rx.borrow_and_update();
            return true;
        }
        if !self.is_open() {
            return false;
        }
        self.view_rx.changed().await.is_ok()
    }

    /// Append a message to this conversation.
    ///
    /// Blank text is ignored.  The feed itself is not touched: the new message
    /// shows up once the store delivers it through the subscription.
    pub async fn send(&self, text: &str) -> Result<SendOutcome, FeedError> {
        let text = text.trim();
        if text.is_empty() {
            debug!(viewer = %self.viewer, "ignoring blank message");
            return Ok(SendOutcome::Skipped);
        }

        if !self.is_open() {
            return Err(FeedError::Closed);
        }

        let user = self
            .identity
            .current_user()
            .ok_or(FeedError::Unauthenticated)?;
        if user.id != self.viewer {
            return Err(FeedError::IdentityChanged {
                expected: self.viewer.clone(),
                actual: user.id,
            });
        }

        let outgoing = OutgoingMessage::new(self.viewer.clone(), self.counterpart.clone(), text);
        let id = self
            .store
            .insert(MESSAGES_COLLECTION, outgoing.into_document_data()?)
            .await?;

        info!(msg_id = %id, from = %self.viewer, to = %self.counterpart, "Message sent");
        Ok(SendOutcome::Sent(id))
    }

    /// Stop the live subscription.  Safe to call more than once.
    pub fn close(&self) {
        if close_view(&self.view_tx, CloseReason::Requested) {
            info!(viewer = %self.viewer, counterpart = %self.counterpart, "conversation closed");
        }
        self.cancel.cancel();
        self.pump.abort();
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHandle")
            .field("viewer", &self.viewer)
            .field("counterpart", &self.counterpart)
            .field("status", &self.status())
            .finish()
    }
}

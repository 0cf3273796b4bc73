//! Change notification bridge.
//!
//! The store pushes change events to one registered observer. The bridge owns
//! that single registration for its whole lifetime and fans each event out to
//! any number of subscribers. Every subscriber has its own bounded queue: an
//! event that does not fit is dropped for that subscriber only, so a slow
//! consumer never blocks the store. There is no replay; a subscriber sees
//! events published after it subscribed.

use futures_util::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::ChangesConfig;
use crate::error::SubscriptionError;
use crate::store::{ChangeObserver, MediaStore, ObserverToken};
use crate::types::ChangeEvent;

/// Registration state of a [`ChangeBridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Registered,
    Unregistered,
}

/// Owns the store observer registration and fans events out.
pub struct ChangeBridge {
    store: Arc<dyn MediaStore>,
    hub: Arc<SubscriberHub>,
    token: Mutex<Option<ObserverToken>>,
}

impl ChangeBridge {
    /// Register with the store. Fails if the store refuses the observer.
    pub fn register(
        store: Arc<dyn MediaStore>,
        config: &ChangesConfig,
    ) -> Result<Self, SubscriptionError> {
        let hub = Arc::new(SubscriberHub::new(config.subscriber_buffer));
        let token = store.register_change_observer(hub.clone())?;
        tracing::debug!("Change observer registered ({:?})", token);
        Ok(Self {
            store,
            hub,
            token: Mutex::new(Some(token)),
        })
    }

    /// Subscribe to change events published from now on.
    ///
    /// After [`unregister`](Self::unregister) the returned subscription is
    /// already finished.
    pub fn on_change(&self) -> ChangeSubscription {
        self.hub.subscribe()
    }

    pub fn state(&self) -> BridgeState {
        if self.lock_token().is_some() {
            BridgeState::Registered
        } else {
            BridgeState::Unregistered
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.hub.lock().subscribers.len()
    }

    /// Release the store registration and finish every subscription.
    /// Idempotent.
    pub fn unregister(&self) {
        let Some(token) = self.lock_token().take() else {
            return;
        };
        self.store.unregister_change_observer(token);
        self.hub.close();
        tracing::debug!("Change observer unregistered ({:?})", token);
    }

    fn lock_token(&self) -> MutexGuard<'_, Option<ObserverToken>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ChangeBridge {
    fn drop(&mut self) {
        self.unregister();
    }
}

struct HubState {
    open: bool,
    next_id: u64,
    subscribers: HashMap<u64, mpsc::Sender<ChangeEvent>>,
}

/// The observer registered with the store.
struct SubscriberHub {
    buffer: usize,
    state: Mutex<HubState>,
}

impl SubscriberHub {
    fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            state: Mutex::new(HubState {
                open: true,
                next_id: 0,
                subscribers: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe(self: &Arc<Self>) -> ChangeSubscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        if state.open {
            state.subscribers.insert(id, tx);
        }
        ChangeSubscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    fn publish(&self, event: ChangeEvent) {
        let mut state = self.lock();
        if !state.open {
            return;
        }
        state
            .subscribers
            .retain(|id, tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Change subscriber {} is full, dropping event", id);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
    }

    fn close(&self) {
        let mut state = self.lock();
        state.open = false;
        state.subscribers.clear();
    }

    fn remove(&self, id: u64) {
        self.lock().subscribers.remove(&id);
    }
}

impl ChangeObserver for SubscriberHub {
    fn library_did_change(&self, change: ChangeEvent) {
        self.publish(change);
    }
}

/// One subscriber's view of the change stream.
///
/// Ends when the bridge unregisters. Dropping it cancels only this
/// subscription.
pub struct ChangeSubscription {
    id: u64,
    rx: mpsc::Receiver<ChangeEvent>,
    hub: Weak<SubscriberHub>,
}

impl ChangeSubscription {
    /// Wait for the next event; `None` once the bridge has unregistered.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Take an already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for ChangeSubscription {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}

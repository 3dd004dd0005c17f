//! Reconciling push dispatcher.
//!
//! Keeps one open transport per active push subscription and converges it
//! towards the subscription's current state on every dispatch:
//!
//! ```text
//! ACCEPTED, not expired ── not active ──────────────────────▶ open
//!                        ── active, same configuration ─────▶ keep
//!                        ── active, changed or forced ──────▶ close + open
//! anything else ────────── active ──────────────────────────▶ close
//!                        ── not active ─────────────────────▶ nothing
//! ```
//!
//! Dispatches for one subscription are serialized, so concurrent calls
//! cannot open two transports for it. Dispatches for different
//! subscriptions never wait on each other's transport.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::DispatchError;
use crate::model::{Keyed, Subscription, SubscriptionStatus, epoch_millis};
use crate::ports::SubscriptionDispatcher;

/// The subscriber-owned transport a push subscription delivers to.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn open(&self, subscription: &Subscription) -> Result<(), DispatchError>;

    async fn close(&self, subscription: &Subscription);
}

type Turn = Arc<tokio::sync::Mutex<()>>;

pub struct ReconcilingDispatcher<T> {
    transport: T,
    /// Active subscriptions keyed by `{api_id}:{subscription_id}`.
    /// Never held across a transport call.
    active: Mutex<HashMap<String, Subscription>>,
    /// One turn per subscription key with a dispatch in progress.
    turns: Mutex<HashMap<String, Turn>>,
}

impl<T: PushTransport> ReconcilingDispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            active: Mutex::new(HashMap::new()),
            turns: Mutex::new(HashMap::new()),
        }
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    pub fn is_active(&self, subscription: &Subscription) -> bool {
        lock(&self.active).contains_key(&subscription.registry_key())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn turn(&self, key: &str) -> Turn {
        lock(&self.turns).entry(key.to_string()).or_default().clone()
    }

    /// Forget the turn of `key` once no other dispatch holds or waits on it.
    fn release(&self, key: &str, turn: Turn) {
        let mut turns = lock(&self.turns);
        // The map and `turn` are the only owners left.
        if Arc::strong_count(&turn) == 2 {
            turns.remove(key);
        }
    }

    async fn reconcile(&self, key: &str, subscription: &Subscription) -> Result<(), DispatchError> {
        let should_run = subscription.status == SubscriptionStatus::Accepted
            && !subscription.is_expired(epoch_millis());
        let current = lock(&self.active).get(key).cloned();

        match (current, should_run) {
            (Some(current), true)
                if current.configuration == subscription.configuration
                    && !subscription.force_dispatch =>
            {
                debug!(subscription_id = %subscription.id, api_id = %subscription.api_id, "push subscription unchanged");
            }
            (Some(current), true) => {
                self.transport.close(&current).await;
                lock(&self.active).remove(key);
                self.transport.open(subscription).await?;
                lock(&self.active).insert(key.to_string(), subscription.clone());
                info!(subscription_id = %subscription.id, api_id = %subscription.api_id, "push subscription reconnected");
            }
            (None, true) => {
                self.transport.open(subscription).await?;
                lock(&self.active).insert(key.to_string(), subscription.clone());
                info!(subscription_id = %subscription.id, api_id = %subscription.api_id, "push subscription connected");
            }
            (Some(current), false) => {
                self.transport.close(&current).await;
                lock(&self.active).remove(key);
                info!(
                    subscription_id = %subscription.id,
                    api_id = %subscription.api_id,
                    status = ?subscription.status,
                    "push subscription closed"
                );
            }
            (None, false) => {
                debug!(
                    subscription_id = %subscription.id,
                    status = ?subscription.status,
                    "push subscription not active, nothing to close"
                );
            }
        }
        Ok(())
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl<T: PushTransport> SubscriptionDispatcher for ReconcilingDispatcher<T> {
    async fn dispatch(&self, subscription: &Subscription) -> Result<(), DispatchError> {
        let key = subscription.registry_key();
        let turn = self.turn(&key);
        let result = {
            let _guard = turn.lock().await;
            self.reconcile(&key, subscription).await
        };
        self.release(&key, turn);
        result
    }
}

//! Push subscriptions collected during `deploy`, flushed by `after_deploy`.
//!
//! Appends and takes for the same API id go through one mutex, so an append
//! racing a take lands either in the flushed batch or in the next one,
//! never in both and never lost.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::Subscription;

#[derive(Debug, Default)]
pub struct PushSubscriptionBuffer {
    pending: Mutex<HashMap<String, Vec<Subscription>>>,
}

impl PushSubscriptionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a subscription under its API id.
    pub fn append(&self, subscription: Subscription) {
        self.lock()
            .entry(subscription.api_id.clone())
            .or_default()
            .push(subscription);
    }

    /// Remove and return everything buffered for `api_id`.
    pub fn take(&self, api_id: &str) -> Vec<Subscription> {
        self.lock().remove(api_id).unwrap_or_default()
    }

    /// Number of subscriptions buffered for `api_id`.
    pub fn len(&self, api_id: &str) -> usize {
        self.lock().get(api_id).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Subscription>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Subscription deployer.
//!
//! Push subscriptions of a whole API are buffered while the API is being
//! deployed and dispatched once it is live, in `after_deploy`. Dispatch runs
//! detached from the deployment pipeline: its failures end up in the
//! [`FailureOutbox`] and never reach the caller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use gatesync_state::SyncAction;

use super::{Deployer, distribute};
use crate::buffer::PushSubscriptionBuffer;
use crate::deployable::{DeployableKind, SubscriptionDeployable};
use crate::error::{SyncError, SyncResult};
use crate::model::Subscription;
use crate::outbox::FailureOutbox;
use crate::ports::{Distributor, SubscriptionDispatcher, SubscriptionRegistry};

#[derive(Clone)]
struct PushDispatch {
    dispatcher: Arc<dyn SubscriptionDispatcher>,
    outbox: FailureOutbox,
}

impl PushDispatch {
    async fn run(&self, subscription: &Subscription) {
        match self.dispatcher.dispatch(subscription).await {
            Ok(()) => {
                debug!(
                    subscription_id = %subscription.id,
                    api_id = %subscription.api_id,
                    status = ?subscription.status,
                    "push subscription dispatched"
                );
            }
            Err(e) => {
                warn!(
                    subscription_id = %subscription.id,
                    api_id = %subscription.api_id,
                    error = %e,
                    "push subscription dispatch failed"
                );
                self.outbox.report(subscription, &e.to_string()).await;
            }
        }
    }
}

pub struct SubscriptionDeployer {
    registry: Arc<dyn SubscriptionRegistry>,
    distributor: Arc<dyn Distributor>,
    push: PushDispatch,
    buffer: Arc<PushSubscriptionBuffer>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl SubscriptionDeployer {
    pub fn new(
        registry: Arc<dyn SubscriptionRegistry>,
        distributor: Arc<dyn Distributor>,
        dispatcher: Arc<dyn SubscriptionDispatcher>,
        outbox: FailureOutbox,
        buffer: Arc<PushSubscriptionBuffer>,
    ) -> Self {
        Self {
            registry,
            distributor,
            push: PushDispatch { dispatcher, outbox },
            buffer,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Reconcile the push transport of `subscription`.
    ///
    /// Never fails: a dispatch error is written to the failure outbox and
    /// this completes once that write was attempted.
    pub async fn dispatch(&self, subscription: &Subscription) {
        self.push.run(subscription).await;
    }

    /// [`dispatch`](Self::dispatch) on a detached task.
    pub fn dispatch_async(&self, subscription: Subscription) {
        let push = self.push.clone();
        let handle = tokio::spawn(async move { push.run(&subscription).await });
        let mut in_flight = self.lock_in_flight();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }

    /// Wait for every detached dispatch started so far.
    pub async fn drain(&self) {
        let handles = std::mem::take(&mut *self.lock_in_flight());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "push dispatch task did not complete");
            }
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push subscriptions waiting for `after_deploy` of `api_id`.
    pub fn buffered(&self, api_id: &str) -> usize {
        self.buffer.len(api_id)
    }

    fn flush(&self, api_id: &str) -> usize {
        let pending = self.buffer.take(api_id);
        let count = pending.len();
        for subscription in pending {
            self.dispatch_async(subscription);
        }
        count
    }
}

#[async_trait]
impl Deployer<SubscriptionDeployable> for SubscriptionDeployer {
    async fn deploy(&self, deployable: &SubscriptionDeployable) -> SyncResult<()> {
        match deployable {
            SubscriptionDeployable::ApiReactor(reactor) => {
                let mut registered = 0usize;
                for subscription in reactor
                    .subscriptions
                    .iter()
                    .filter(|s| reactor.subscribable_plans.contains(&s.plan_id))
                {
                    if subscription.is_push() {
                        self.buffer.append(subscription.clone());
                    }
                    match self.registry.register(subscription.clone()) {
                        Ok(()) => registered += 1,
                        Err(e) => warn!(
                            api_id = %reactor.api.id,
                            subscription_id = %subscription.id,
                            error = %e,
                            "subscription registration failed, skipping"
                        ),
                    }
                }
                debug!(api_id = %reactor.api.id, registered, "subscriptions deployed");
                Ok(())
            }
            SubscriptionDeployable::Single(single) => {
                let subscription = &single.subscription;
                self.registry
                    .register(subscription.clone())
                    .map_err(|source| {
                        error!(
                            api_id = %subscription.api_id,
                            subscription_id = %subscription.id,
                            error = %source,
                            "subscription registration failed"
                        );
                        SyncError::Deploy {
                            kind: DeployableKind::Subscription,
                            id: subscription.id.clone(),
                            source,
                        }
                    })?;
                if subscription.is_push() {
                    self.buffer.append(subscription.clone());
                }
                debug!(api_id = %subscription.api_id, subscription_id = %subscription.id, "subscription deployed");
                Ok(())
            }
        }
    }

    async fn after_deploy(&self, deployable: &SubscriptionDeployable) -> SyncResult<()> {
        let api_id = match deployable {
            SubscriptionDeployable::ApiReactor(reactor) => &reactor.api.id,
            SubscriptionDeployable::Single(single) => &single.subscription.api_id,
        };
        let dispatched = self.flush(api_id);
        if dispatched > 0 {
            info!(%api_id, dispatched, "push subscriptions dispatched");
        }
        distribute(self.distributor.as_ref(), deployable, SyncAction::Deploy).await
    }

    async fn undeploy(&self, deployable: &SubscriptionDeployable) -> SyncResult<()> {
        match deployable {
            SubscriptionDeployable::ApiReactor(reactor) => {
                if let Err(e) = self.registry.unregister_by_api(&reactor.api.id) {
                    warn!(api_id = %reactor.api.id, error = %e, "unable to unregister subscriptions of api");
                }
            }
            SubscriptionDeployable::Single(single) => {
                let subscription = &single.subscription;
                if let Err(e) = self.registry.unregister(subscription) {
                    warn!(
                        api_id = %subscription.api_id,
                        subscription_id = %subscription.id,
                        error = %e,
                        "unable to unregister subscription"
                    );
                }
                // The dispatcher tears the transport down from the subscription's status.
                if subscription.is_push() {
                    self.dispatch_async(subscription.clone());
                }
            }
        }
        Ok(())
    }

    async fn after_undeploy(&self, deployable: &SubscriptionDeployable) -> SyncResult<()> {
        match deployable {
            SubscriptionDeployable::ApiReactor(_) => Ok(()),
            SubscriptionDeployable::Single(_) => {
                distribute(self.distributor.as_ref(), deployable, SyncAction::Undeploy).await
            }
        }
    }
}

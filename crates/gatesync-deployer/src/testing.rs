//! Fixtures and fakes shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use gatesync_state::{
    ApiKeyRecord, Command, ReferenceType, Sort, StateError, StateResult, SubscriptionCriteria,
    SubscriptionRecord, SubscriptionStatus, SubscriptionType, SyncAction,
};

use crate::deployable::{ApiReactorDeployable, Deployable, DeploymentScope};
use crate::error::{DispatchError, DistributionError, RegistryError, RegistryResult};
use crate::model::*;
use crate::ports::*;

pub const ENV: &str = "DEFAULT";

// ── Fixtures ──────────────────────────────────────────────────────

pub fn subscription(id: &str, api_id: &str, plan_id: &str) -> Subscription {
    Subscription {
        id: id.to_string(),
        api_id: api_id.to_string(),
        plan_id: plan_id.to_string(),
        application_id: "app-1".to_string(),
        client_id: None,
        status: SubscriptionStatus::Accepted,
        subscription_type: SubscriptionType::Standard,
        environment_id: ENV.to_string(),
        reference_type: ReferenceType::Api,
        reference_id: api_id.to_string(),
        configuration: None,
        starting_at: None,
        ending_at: None,
        force_dispatch: false,
        updated_at: 1000,
    }
}

pub fn push_subscription(id: &str, api_id: &str, plan_id: &str) -> Subscription {
    Subscription {
        subscription_type: SubscriptionType::Push,
        ..subscription(id, api_id, plan_id)
    }
}

pub fn api_key(id: &str, api_id: &str, subscription_id: &str) -> ApiKey {
    ApiKey {
        id: id.to_string(),
        key: format!("{id}-value"),
        api_id: api_id.to_string(),
        plan_id: "plan-1".to_string(),
        application_id: "app-1".to_string(),
        subscription_id: subscription_id.to_string(),
        environment_id: ENV.to_string(),
        revoked: false,
        expire_at: None,
    }
}

pub fn api_reactor(
    id: &str,
    plans: &[&str],
    subscriptions: Vec<Subscription>,
    api_keys: Vec<ApiKey>,
) -> ApiReactorDeployable {
    ApiReactorDeployable {
        api: ReactableApi {
            id: id.to_string(),
            name: format!("{id} name"),
            environment_id: ENV.to_string(),
            plans: plans
                .iter()
                .map(|p| Plan {
                    id: p.to_string(),
                    name: p.to_string(),
                    security: "API_KEY".to_string(),
                })
                .collect(),
            deployed_at: 1000,
            definition: serde_json::Value::Null,
        },
        subscribable_plans: plans.iter().map(|p| p.to_string()).collect(),
        subscriptions,
        api_keys,
    }
}

pub fn dictionary(id: &str) -> Dictionary {
    Dictionary {
        id: id.to_string(),
        key: format!("{id}-key"),
        environment_id: ENV.to_string(),
        properties: BTreeMap::from([("region".to_string(), "eu".to_string())]),
    }
}

pub fn organization(id: &str) -> ReactableOrganization {
    ReactableOrganization {
        id: id.to_string(),
        name: format!("{id} name"),
        environment_ids: BTreeSet::from([ENV.to_string()]),
        flows: Vec::new(),
    }
}

pub fn api_product(id: &str, api_ids: &[&str]) -> ReactableApiProduct {
    ReactableApiProduct {
        id: id.to_string(),
        name: format!("{id} name"),
        environment_id: ENV.to_string(),
        api_ids: api_ids.iter().map(|a| a.to_string()).collect(),
        plans: Vec::new(),
    }
}

pub fn api_record(id: &str, api_id: &str, plan: &str, updated_at: u64) -> SubscriptionRecord {
    SubscriptionRecord {
        id: id.to_string(),
        reference_id: api_id.to_string(),
        reference_type: ReferenceType::Api,
        plan: plan.to_string(),
        application: "app-1".to_string(),
        client_id: None,
        status: SubscriptionStatus::Accepted,
        subscription_type: SubscriptionType::Standard,
        environment_id: ENV.to_string(),
        configuration: None,
        starting_at: None,
        ending_at: None,
        created_at: updated_at,
        updated_at,
    }
}

pub fn product_record(id: &str, product_id: &str, plan: &str, updated_at: u64) -> SubscriptionRecord {
    SubscriptionRecord {
        reference_type: ReferenceType::ApiProduct,
        ..api_record(id, product_id, plan, updated_at)
    }
}

pub fn api_key_record(id: &str, subscriptions: &[&str], revoked: bool) -> ApiKeyRecord {
    ApiKeyRecord {
        id: id.to_string(),
        key: format!("{id}-value"),
        subscriptions: subscriptions.iter().map(|s| s.to_string()).collect(),
        application: "app-1".to_string(),
        environment_id: ENV.to_string(),
        revoked,
        expire_at: None,
        created_at: 1000,
        updated_at: 1000,
    }
}

// ── Registries ────────────────────────────────────────────────────

/// Rejects everything.
pub struct FailingRegistry;

fn rejected() -> RegistryError {
    RegistryError::Rejected("registry is read-only".to_string())
}

impl<E> Registry<E> for FailingRegistry {
    fn register(&self, _entity: E) -> RegistryResult<()> {
        Err(rejected())
    }

    fn unregister(&self, _key: &str) -> RegistryResult<()> {
        Err(rejected())
    }

    fn get(&self, _key: &str) -> Option<E> {
        None
    }
}

impl SubscriptionRegistry for FailingRegistry {
    fn register(&self, _subscription: Subscription) -> RegistryResult<()> {
        Err(rejected())
    }

    fn unregister(&self, _subscription: &Subscription) -> RegistryResult<()> {
        Err(rejected())
    }

    fn unregister_by_api(&self, _api_id: &str) -> RegistryResult<()> {
        Err(rejected())
    }
}

impl ApiKeyRegistry for FailingRegistry {
    fn register(&self, _api_key: ApiKey) -> RegistryResult<()> {
        Err(rejected())
    }

    fn unregister(&self, _api_key: &ApiKey) -> RegistryResult<()> {
        Err(rejected())
    }

    fn unregister_by_api(&self, _api_id: &str) -> RegistryResult<()> {
        Err(rejected())
    }
}

/// Rejects one id and records the ids it accepted, in order.
pub struct FlakyRegistry {
    failing_id: String,
    registered: Mutex<Vec<String>>,
}

pub type FlakySubscriptionRegistry = FlakyRegistry;
pub type FlakyApiKeyRegistry = FlakyRegistry;

impl FlakyRegistry {
    pub fn failing_on(id: &str) -> Self {
        Self {
            failing_id: id.to_string(),
            registered: Mutex::new(Vec::new()),
        }
    }

    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().unwrap().clone()
    }

    fn accept(&self, id: &str) -> RegistryResult<()> {
        if id == self.failing_id {
            return Err(rejected());
        }
        self.registered.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

impl SubscriptionRegistry for FlakyRegistry {
    fn register(&self, subscription: Subscription) -> RegistryResult<()> {
        self.accept(&subscription.id)
    }

    fn unregister(&self, _subscription: &Subscription) -> RegistryResult<()> {
        Ok(())
    }

    fn unregister_by_api(&self, _api_id: &str) -> RegistryResult<()> {
        Ok(())
    }
}

impl ApiKeyRegistry for FlakyRegistry {
    fn register(&self, api_key: ApiKey) -> RegistryResult<()> {
        self.accept(&api_key.id)
    }

    fn unregister(&self, _api_key: &ApiKey) -> RegistryResult<()> {
        Ok(())
    }

    fn unregister_by_api(&self, _api_id: &str) -> RegistryResult<()> {
        Ok(())
    }
}

// ── Distribution ──────────────────────────────────────────────────

/// Records single-scope publications and counts skipped bulk ones.
#[derive(Default)]
pub struct RecordingDistributor {
    calls: Mutex<Vec<(String, SyncAction)>>,
    bulk_skipped: Mutex<usize>,
}

impl RecordingDistributor {
    pub fn calls(&self) -> Vec<(String, SyncAction)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn bulk_skipped(&self) -> usize {
        *self.bulk_skipped.lock().unwrap()
    }
}

#[async_trait]
impl Distributor for RecordingDistributor {
    async fn distribute_if_needed(
        &self,
        deployable: &dyn Deployable,
        action: SyncAction,
    ) -> Result<(), DistributionError> {
        match deployable.scope() {
            DeploymentScope::Bulk => *self.bulk_skipped.lock().unwrap() += 1,
            DeploymentScope::Single => self
                .calls
                .lock()
                .unwrap()
                .push((deployable.id().to_string(), action)),
        }
        Ok(())
    }
}

// ── Dispatch ──────────────────────────────────────────────────────

/// Forwards every dispatched subscription to a channel, or fails them all.
pub struct RecordingDispatcher {
    sent: Option<mpsc::UnboundedSender<Subscription>>,
    failure: Option<String>,
}

impl RecordingDispatcher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Subscription>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                sent: Some(tx),
                failure: None,
            },
            rx,
        )
    }

    pub fn failing(message: &str) -> Self {
        Self {
            sent: None,
            failure: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl SubscriptionDispatcher for RecordingDispatcher {
    async fn dispatch(&self, subscription: &Subscription) -> Result<(), DispatchError> {
        if let Some(message) = &self.failure {
            return Err(DispatchError::Transport(message.clone()));
        }
        if let Some(tx) = &self.sent {
            let _ = tx.send(subscription.clone());
        }
        Ok(())
    }
}

/// Next dispatched subscription; panics if none arrives within a second.
pub async fn recv_within(rx: &mut mpsc::UnboundedReceiver<Subscription>) -> Subscription {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no dispatch within 1s")
        .expect("dispatch channel closed")
}

/// Poll `condition` until it holds; panics after a second.
pub async fn wait_for(condition: impl Fn() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not met within 1s");
}

// ── Stores ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCommandStore {
    commands: Mutex<Vec<Command>>,
}

impl MemoryCommandStore {
    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }
}

impl CommandStore for MemoryCommandStore {
    fn create(&self, command: &Command) -> StateResult<()> {
        self.commands.lock().unwrap().push(command.clone());
        Ok(())
    }
}

pub struct FailingCommandStore;

impl CommandStore for FailingCommandStore {
    fn create(&self, command: &Command) -> StateResult<()> {
        Err(StateError::Storage(format!("disk full writing {}", command.id)))
    }
}

pub struct FailingSubscriptionStore;

impl SubscriptionStore for FailingSubscriptionStore {
    fn search(
        &self,
        _criteria: &SubscriptionCriteria,
        _sort: Sort,
    ) -> StateResult<Vec<SubscriptionRecord>> {
        Err(StateError::Storage("connection reset".to_string()))
    }
}

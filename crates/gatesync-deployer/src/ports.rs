//! Collaborator contracts consumed by the deployers.
//!
//! Registries are the gateway's live in-memory state and are synchronous.
//! Everything that may cross a network or a disk (dispatch, distribution)
//! is async. The repository ports are implemented by [`StateStore`].

use async_trait::async_trait;

use gatesync_state::{
    ApiKeyCriteria, ApiKeyRecord, Command, Sort, StateResult, StateStore, SubscriptionCriteria,
    SubscriptionRecord, SyncAction,
};

use crate::deployable::Deployable;
use crate::error::{DispatchError, DistributionError, LicenseError, RegistryResult};
use crate::model::{ApiKey, License, Subscription};

/// A live registry of one entity kind. `register` has upsert semantics.
pub trait Registry<E>: Send + Sync {
    fn register(&self, entity: E) -> RegistryResult<()>;

    fn unregister(&self, key: &str) -> RegistryResult<()>;

    fn get(&self, key: &str) -> Option<E>;
}

/// Live subscriptions, indexed per API.
pub trait SubscriptionRegistry: Send + Sync {
    fn register(&self, subscription: Subscription) -> RegistryResult<()>;

    fn unregister(&self, subscription: &Subscription) -> RegistryResult<()>;

    /// Drop every subscription of an API.
    fn unregister_by_api(&self, api_id: &str) -> RegistryResult<()>;
}

/// Live API keys, indexed per API.
pub trait ApiKeyRegistry: Send + Sync {
    fn register(&self, api_key: ApiKey) -> RegistryResult<()>;

    fn unregister(&self, api_key: &ApiKey) -> RegistryResult<()>;

    /// Drop every API key of an API.
    fn unregister_by_api(&self, api_id: &str) -> RegistryResult<()>;
}

/// Decodes license content into a [`License`].
pub trait LicenseFactory: Send + Sync {
    fn create(&self, organization_id: &str, content: Option<&str>) -> Result<License, LicenseError>;

    /// The built-in license applied when nothing better is available.
    fn oss(&self, organization_id: &str) -> License {
        License::oss(organization_id)
    }
}

/// Propagates incremental changes to the peer nodes of the cluster.
#[async_trait]
pub trait Distributor: Send + Sync {
    /// Publish `deployable` if it is eligible; bulk deployables complete immediately.
    async fn distribute_if_needed(
        &self,
        deployable: &dyn Deployable,
        action: SyncAction,
    ) -> Result<(), DistributionError>;
}

/// Push transport reconciliation.
///
/// Dispatch is state driven: given the subscription's current status the
/// implementation connects, reconnects or tears down the transport, so it
/// is safe to call redundantly.
#[async_trait]
pub trait SubscriptionDispatcher: Send + Sync {
    async fn dispatch(&self, subscription: &Subscription) -> Result<(), DispatchError>;
}

/// Persists outbox commands.
pub trait CommandStore: Send + Sync {
    fn create(&self, command: &Command) -> StateResult<()>;
}

/// Reads raw subscription records.
pub trait SubscriptionStore: Send + Sync {
    fn search(
        &self,
        criteria: &SubscriptionCriteria,
        sort: Sort,
    ) -> StateResult<Vec<SubscriptionRecord>>;
}

/// Reads raw API key records.
pub trait ApiKeyStore: Send + Sync {
    fn find_by_criteria(&self, criteria: &ApiKeyCriteria, sort: Sort)
    -> StateResult<Vec<ApiKeyRecord>>;
}

impl CommandStore for StateStore {
    fn create(&self, command: &Command) -> StateResult<()> {
        self.create_command(command)
    }
}

impl SubscriptionStore for StateStore {
    fn search(
        &self,
        criteria: &SubscriptionCriteria,
        sort: Sort,
    ) -> StateResult<Vec<SubscriptionRecord>> {
        self.search_subscriptions(criteria, sort)
    }
}

impl ApiKeyStore for StateStore {
    fn find_by_criteria(
        &self,
        criteria: &ApiKeyCriteria,
        sort: Sort,
    ) -> StateResult<Vec<ApiKeyRecord>> {
        self.find_api_keys(criteria, sort)
    }
}

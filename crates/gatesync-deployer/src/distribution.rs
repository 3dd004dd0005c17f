//! Cluster distribution of incremental changes.
//!
//! Only single-scope deployables are published. A bulk deployable (a whole
//! API with its subscriptions) reaches every node through the same
//! top-level synchronization, so publishing it would duplicate that work.

use async_trait::async_trait;
use tracing::debug;

use gatesync_state::{DistributedEvent, StateStore, SyncAction};

use crate::deployable::{Deployable, DeploymentScope};
use crate::error::DistributionError;
use crate::model::epoch_millis;
use crate::ports::Distributor;

/// Publishes distributed events to the shared state store.
#[derive(Clone)]
pub struct ClusterDistributor {
    state: StateStore,
    /// Whether this node publishes changes for its peers.
    enabled: bool,
}

impl ClusterDistributor {
    pub fn new(state: StateStore, enabled: bool) -> Self {
        Self { state, enabled }
    }
}

#[async_trait]
impl Distributor for ClusterDistributor {
    async fn distribute_if_needed(
        &self,
        deployable: &dyn Deployable,
        action: SyncAction,
    ) -> Result<(), DistributionError> {
        if deployable.scope() == DeploymentScope::Bulk {
            debug!(kind = %deployable.kind(), id = %deployable.id(), "bulk deployable, not distributed");
            return Ok(());
        }
        if !self.enabled {
            return Ok(());
        }

        let event = DistributedEvent {
            id: deployable.id().to_string(),
            kind: deployable.kind().to_string(),
            sync_action: action,
            payload: deployable.payload()?,
            updated_at: epoch_millis(),
        };
        self.state.put_distributed_event(&event)?;
        debug!(kind = %event.kind, id = %event.id, ?action, "deployable distributed");
        Ok(())
    }
}

/// Distributor for nodes that do not share changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDistributor;

#[async_trait]
impl Distributor for NoopDistributor {
    async fn distribute_if_needed(
        &self,
        _deployable: &dyn Deployable,
        _action: SyncAction,
    ) -> Result<(), DistributionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployable::{DictionaryDeployable, SubscriptionDeployable};
    use crate::testing;

    fn store() -> StateStore {
        StateStore::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn single_deployable_is_published() {
        let state = store();
        let distributor = ClusterDistributor::new(state.clone(), true);
        let deployable = DictionaryDeployable {
            dictionary: testing::dictionary("dict-1"),
        };

        distributor
            .distribute_if_needed(&deployable, SyncAction::Deploy)
            .await
            .unwrap();

        let events = state.list_distributed_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "dictionary");
        assert_eq!(events[0].id, "dict-1");
        assert_eq!(events[0].sync_action, SyncAction::Deploy);
        assert!(events[0].payload.contains("dict-1-key"));
    }

    #[tokio::test]
    async fn bulk_deployable_is_never_published() {
        let state = store();
        let distributor = ClusterDistributor::new(state.clone(), true);
        let reactor = testing::api_reactor("api-1", &["plan-1"], vec![], vec![]);

        distributor
            .distribute_if_needed(&reactor, SyncAction::Deploy)
            .await
            .unwrap();
        distributor
            .distribute_if_needed(&SubscriptionDeployable::from(reactor), SyncAction::Undeploy)
            .await
            .unwrap();

        assert!(state.list_distributed_events().unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_distribution_is_a_noop() {
        let state = store();
        let distributor = ClusterDistributor::new(state.clone(), false);
        let deployable =
            SubscriptionDeployable::from(testing::subscription("sub-1", "api-1", "plan-1"));

        distributor
            .distribute_if_needed(&deployable, SyncAction::Deploy)
            .await
            .unwrap();
        assert!(state.list_distributed_events().unwrap().is_empty());
    }
}

//! API deployer — registers whole API definitions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use gatesync_state::SyncAction;

use super::{Deployer, distribute};
use crate::deployable::{ApiReactorDeployable, Deployable, DeployableKind};
use crate::error::{SyncError, SyncResult};
use crate::model::ReactableApi;
use crate::ports::{Distributor, Registry};

pub struct ApiDeployer {
    registry: Arc<dyn Registry<ReactableApi>>,
    distributor: Arc<dyn Distributor>,
}

impl ApiDeployer {
    pub fn new(registry: Arc<dyn Registry<ReactableApi>>, distributor: Arc<dyn Distributor>) -> Self {
        Self {
            registry,
            distributor,
        }
    }
}

#[async_trait]
impl Deployer<ApiReactorDeployable> for ApiDeployer {
    async fn deploy(&self, deployable: &ApiReactorDeployable) -> SyncResult<()> {
        let api = &deployable.api;
        self.registry.register(api.clone()).map_err(|source| {
            error!(api_id = %api.id, error = %source, "api registration failed");
            SyncError::Deploy {
                kind: DeployableKind::Api,
                id: api.id.clone(),
                source,
            }
        })?;
        info!(
            api_id = %api.id,
            name = %api.name,
            plans = api.plans.len(),
            "api deployed"
        );
        Ok(())
    }

    async fn after_deploy(&self, deployable: &ApiReactorDeployable) -> SyncResult<()> {
        distribute(self.distributor.as_ref(), deployable, SyncAction::Deploy).await
    }

    async fn undeploy(&self, deployable: &ApiReactorDeployable) -> SyncResult<()> {
        self.registry.unregister(deployable.id()).map_err(|source| {
            error!(api_id = %deployable.id(), error = %source, "api unregistration failed");
            SyncError::Undeploy {
                kind: DeployableKind::Api,
                id: deployable.id().to_string(),
                source,
            }
        })?;
        info!(api_id = %deployable.id(), "api undeployed");
        Ok(())
    }

    async fn after_undeploy(&self, deployable: &ApiReactorDeployable) -> SyncResult<()> {
        distribute(self.distributor.as_ref(), deployable, SyncAction::Undeploy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRegistry;
    use crate::testing::{self, FailingRegistry, RecordingDistributor};

    #[tokio::test]
    async fn deploys_api_without_distributing_it() {
        let registry = Arc::new(InMemoryRegistry::<ReactableApi>::new());
        let distributor = Arc::new(RecordingDistributor::default());
        let deployer = ApiDeployer::new(registry.clone(), distributor.clone());
        let reactor = testing::api_reactor("api-1", &["plan-1"], vec![], vec![]);

        deployer.deploy(&reactor).await.unwrap();
        deployer.after_deploy(&reactor).await.unwrap();

        assert!(registry.contains("api-1"));
        // The distributor is consulted but bulk deployables are never published.
        assert!(distributor.calls().is_empty());
        assert_eq!(distributor.bulk_skipped(), 1);
    }

    #[tokio::test]
    async fn undeploy_removes_api() {
        let registry = Arc::new(InMemoryRegistry::<ReactableApi>::new());
        let deployer = ApiDeployer::new(registry.clone(), Arc::new(RecordingDistributor::default()));
        let reactor = testing::api_reactor("api-1", &["plan-1"], vec![], vec![]);

        deployer.deploy(&reactor).await.unwrap();
        deployer.undeploy(&reactor).await.unwrap();
        deployer.after_undeploy(&reactor).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn registration_failure_aborts() {
        let deployer = ApiDeployer::new(
            Arc::new(FailingRegistry),
            Arc::new(RecordingDistributor::default()),
        );
        let reactor = testing::api_reactor("api-1", &["plan-1"], vec![], vec![]);

        let err = deployer.deploy(&reactor).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Deploy { kind: DeployableKind::Api, ref id, .. } if id == "api-1"
        ));
    }
}

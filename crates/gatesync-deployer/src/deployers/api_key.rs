//! API key deployer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use gatesync_state::SyncAction;

use super::{Deployer, distribute};
use crate::deployable::{ApiKeyDeployable, DeployableKind};
use crate::error::{SyncError, SyncResult};
use crate::ports::{ApiKeyRegistry, Distributor};

pub struct ApiKeyDeployer {
    registry: Arc<dyn ApiKeyRegistry>,
    distributor: Arc<dyn Distributor>,
}

impl ApiKeyDeployer {
    pub fn new(registry: Arc<dyn ApiKeyRegistry>, distributor: Arc<dyn Distributor>) -> Self {
        Self {
            registry,
            distributor,
        }
    }
}

#[async_trait]
impl Deployer<ApiKeyDeployable> for ApiKeyDeployer {
    async fn deploy(&self, deployable: &ApiKeyDeployable) -> SyncResult<()> {
        match deployable {
            ApiKeyDeployable::ApiReactor(reactor) => {
                let mut registered = 0usize;
                for api_key in reactor
                    .api_keys
                    .iter()
                    .filter(|k| reactor.subscribable_plans.contains(&k.plan_id))
                {
                    match self.registry.register(api_key.clone()) {
                        Ok(()) => registered += 1,
                        Err(e) => warn!(
                            api_id = %reactor.api.id,
                            key_id = %api_key.id,
                            error = %e,
                            "api key registration failed, skipping"
                        ),
                    }
                }
                debug!(api_id = %reactor.api.id, registered, "api keys deployed");
                Ok(())
            }
            ApiKeyDeployable::Single(single) => {
                let api_key = &single.api_key;
                self.registry.register(api_key.clone()).map_err(|source| {
                    error!(api_id = %api_key.api_id, key_id = %api_key.id, error = %source, "api key registration failed");
                    SyncError::Deploy {
                        kind: DeployableKind::ApiKey,
                        id: api_key.id.clone(),
                        source,
                    }
                })?;
                debug!(api_id = %api_key.api_id, key_id = %api_key.id, "api key deployed");
                Ok(())
            }
        }
    }

    async fn after_deploy(&self, deployable: &ApiKeyDeployable) -> SyncResult<()> {
        distribute(self.distributor.as_ref(), deployable, SyncAction::Deploy).await
    }

    async fn undeploy(&self, deployable: &ApiKeyDeployable) -> SyncResult<()> {
        match deployable {
            ApiKeyDeployable::ApiReactor(reactor) => {
                if let Err(e) = self.registry.unregister_by_api(&reactor.api.id) {
                    warn!(api_id = %reactor.api.id, error = %e, "unable to unregister api keys of api");
                }
                Ok(())
            }
            ApiKeyDeployable::Single(single) => {
                let api_key = &single.api_key;
                if let Err(e) = self.registry.unregister(api_key) {
                    warn!(api_id = %api_key.api_id, key_id = %api_key.id, error = %e, "unable to unregister api key");
                }
                Ok(())
            }
        }
    }

    async fn after_undeploy(&self, deployable: &ApiKeyDeployable) -> SyncResult<()> {
        distribute(self.distributor.as_ref(), deployable, SyncAction::Undeploy).await
    }
}

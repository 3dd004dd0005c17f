//! Deployer for kinds that wrap exactly one registry entity.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use gatesync_state::SyncAction;

use super::{Deployer, distribute};
use crate::deployable::EntityDeployable;
use crate::error::{SyncError, SyncResult};
use crate::ports::{Distributor, Registry};

/// Registers the deployable's entity; any registry failure is fatal.
pub struct RegistryDeployer<D: EntityDeployable> {
    registry: Arc<dyn Registry<D::Entity>>,
    distributor: Arc<dyn Distributor>,
    _deployable: PhantomData<fn(D)>,
}

impl<D: EntityDeployable> RegistryDeployer<D> {
    pub fn new(registry: Arc<dyn Registry<D::Entity>>, distributor: Arc<dyn Distributor>) -> Self {
        Self {
            registry,
            distributor,
            _deployable: PhantomData,
        }
    }
}

#[async_trait]
impl<D: EntityDeployable> Deployer<D> for RegistryDeployer<D> {
    async fn deploy(&self, deployable: &D) -> SyncResult<()> {
        self.registry
            .register(deployable.entity().clone())
            .map_err(|source| {
                error!(kind = %deployable.kind(), id = %deployable.id(), error = %source, "deploy failed");
                SyncError::Deploy {
                    kind: deployable.kind(),
                    id: deployable.id().to_string(),
                    source,
                }
            })?;
        debug!(kind = %deployable.kind(), id = %deployable.id(), "deployed");
        Ok(())
    }

    async fn after_deploy(&self, deployable: &D) -> SyncResult<()> {
        distribute(self.distributor.as_ref(), deployable, SyncAction::Deploy).await
    }

    async fn undeploy(&self, deployable: &D) -> SyncResult<()> {
        self.registry
            .unregister(deployable.id())
            .map_err(|source| {
                error!(kind = %deployable.kind(), id = %deployable.id(), error = %source, "undeploy failed");
                SyncError::Undeploy {
                    kind: deployable.kind(),
                    id: deployable.id().to_string(),
                    source,
                }
            })?;
        debug!(kind = %deployable.kind(), id = %deployable.id(), "undeployed");
        Ok(())
    }

    async fn after_undeploy(&self, deployable: &D) -> SyncResult<()> {
        distribute(self.distributor.as_ref(), deployable, SyncAction::Undeploy).await
    }
}

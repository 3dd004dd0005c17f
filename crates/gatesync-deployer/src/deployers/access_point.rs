//! Access point deployer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use gatesync_state::SyncAction;

use super::{Deployer, distribute};
use crate::deployable::{AccessPointDeployable, DeployableKind};
use crate::error::{SyncError, SyncResult};
use crate::model::AccessPoint;
use crate::ports::{Distributor, Registry};

pub struct AccessPointDeployer {
    registry: Arc<dyn Registry<AccessPoint>>,
    distributor: Arc<dyn Distributor>,
}

impl AccessPointDeployer {
    pub fn new(registry: Arc<dyn Registry<AccessPoint>>, distributor: Arc<dyn Distributor>) -> Self {
        Self {
            registry,
            distributor,
        }
    }
}

#[async_trait]
impl Deployer<AccessPointDeployable> for AccessPointDeployer {
    /// Registers every access point of the environment; the first failure aborts.
    async fn deploy(&self, deployable: &AccessPointDeployable) -> SyncResult<()> {
        for access_point in &deployable.access_points {
            self.registry.register(access_point.clone()).map_err(|source| {
                error!(
                    environment_id = %deployable.environment_id,
                    access_point_id = %access_point.id,
                    host = %access_point.host,
                    error = %source,
                    "access point registration failed"
                );
                SyncError::Deploy {
                    kind: DeployableKind::AccessPoint,
                    id: access_point.id.clone(),
                    source,
                }
            })?;
        }
        info!(
            environment_id = %deployable.environment_id,
            count = deployable.access_points.len(),
            "access points deployed"
        );
        Ok(())
    }

    async fn after_deploy(&self, deployable: &AccessPointDeployable) -> SyncResult<()> {
        distribute(self.distributor.as_ref(), deployable, SyncAction::Deploy).await
    }

    async fn undeploy(&self, deployable: &AccessPointDeployable) -> SyncResult<()> {
        for access_point in &deployable.access_points {
            self.registry
                .unregister(&access_point.id)
                .map_err(|source| SyncError::Undeploy {
                    kind: DeployableKind::AccessPoint,
                    id: access_point.id.clone(),
                    source,
                })?;
        }
        info!(environment_id = %deployable.environment_id, "access points undeployed");
        Ok(())
    }

    async fn after_undeploy(&self, deployable: &AccessPointDeployable) -> SyncResult<()> {
        distribute(self.distributor.as_ref(), deployable, SyncAction::Undeploy).await
    }
}

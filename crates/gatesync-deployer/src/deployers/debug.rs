//! Debug deployer.
//!
//! A debug event is a one-shot diagnostic request: it is registered for
//! this node only, and there is nothing to undeploy or distribute.
//!
//! Events are keyed by id, so a replayed event replaces itself. The deployer
//! never removes an event: whoever consumes it from the registry evicts it
//! with [`Registry::unregister`] once the request has been replayed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use super::Deployer;
use crate::deployable::{DebugDeployable, DeployableKind};
use crate::error::{SyncError, SyncResult};
use crate::model::DebugEvent;
use crate::ports::Registry;

pub struct DebugDeployer {
    registry: Arc<dyn Registry<DebugEvent>>,
}

impl DebugDeployer {
    pub fn new(registry: Arc<dyn Registry<DebugEvent>>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Deployer<DebugDeployable> for DebugDeployer {
    async fn deploy(&self, deployable: &DebugDeployable) -> SyncResult<()> {
        let event = &deployable.event;
        self.registry.register(event.clone()).map_err(|source| {
            error!(event_id = %event.id, api_id = %event.api_id, error = %source, "debug event registration failed");
            SyncError::Deploy {
                kind: DeployableKind::Debug,
                id: event.id.clone(),
                source,
            }
        })?;
        debug!(event_id = %event.id, api_id = %event.api_id, "debug event deployed");
        Ok(())
    }

    async fn after_deploy(&self, _deployable: &DebugDeployable) -> SyncResult<()> {
        Ok(())
    }

    async fn undeploy(&self, _deployable: &DebugDeployable) -> SyncResult<()> {
        Ok(())
    }

    async fn after_undeploy(&self, _deployable: &DebugDeployable) -> SyncResult<()> {
        Ok(())
    }
}

//! Node metadata deployer. Local to this node, never distributed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use super::Deployer;
use crate::deployable::{DeployableKind, NodeMetadataDeployable};
use crate::error::{SyncError, SyncResult};
use crate::model::NodeMetadata;
use crate::ports::Registry;

pub struct NodeMetadataDeployer {
    registry: Arc<dyn Registry<NodeMetadata>>,
}

impl NodeMetadataDeployer {
    pub fn new(registry: Arc<dyn Registry<NodeMetadata>>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Deployer<NodeMetadataDeployable> for NodeMetadataDeployer {
    async fn deploy(&self, deployable: &NodeMetadataDeployable) -> SyncResult<()> {
        let metadata = &deployable.metadata;
        self.registry.register(metadata.clone()).map_err(|source| {
            error!(node_id = %metadata.node_id, error = %source, "node metadata registration failed");
            SyncError::Deploy {
                kind: DeployableKind::NodeMetadata,
                id: metadata.node_id.clone(),
                source,
            }
        })?;
        debug!(
            node_id = %metadata.node_id,
            organizations = metadata.organization_ids.len(),
            environments = metadata.environment_ids.len(),
            "node metadata deployed"
        );
        Ok(())
    }

    async fn after_deploy(&self, _deployable: &NodeMetadataDeployable) -> SyncResult<()> {
        Ok(())
    }

    async fn undeploy(&self, deployable: &NodeMetadataDeployable) -> SyncResult<()> {
        self.registry
            .unregister(&deployable.metadata.node_id)
            .map_err(|source| SyncError::Undeploy {
                kind: DeployableKind::NodeMetadata,
                id: deployable.metadata.node_id.clone(),
                source,
            })
    }

    async fn after_undeploy(&self, _deployable: &NodeMetadataDeployable) -> SyncResult<()> {
        Ok(())
    }
}

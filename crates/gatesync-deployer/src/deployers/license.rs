//! License deployer and the JSON license factory.
//!
//! An organization must always have a license registered. When the supplied
//! license cannot be built or registered, the OSS license is registered in
//! its place and the original error is still returned.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info, warn};

use gatesync_state::SyncAction;

use super::{Deployer, distribute};
use crate::deployable::{DeployableKind, LicenseDeployable};
use crate::error::{LicenseError, SyncError, SyncResult};
use crate::model::{License, epoch_millis};
use crate::ports::{Distributor, LicenseFactory, Registry};

pub struct LicenseDeployer {
    registry: Arc<dyn Registry<License>>,
    factory: Arc<dyn LicenseFactory>,
    distributor: Arc<dyn Distributor>,
}

impl LicenseDeployer {
    pub fn new(
        registry: Arc<dyn Registry<License>>,
        factory: Arc<dyn LicenseFactory>,
        distributor: Arc<dyn Distributor>,
    ) -> Self {
        Self {
            registry,
            factory,
            distributor,
        }
    }

    fn apply(&self, deployable: &LicenseDeployable) -> Result<License, LicenseError> {
        let license = self
            .factory
            .create(&deployable.organization_id, deployable.license.as_deref())?;
        self.registry.register(license.clone())?;
        Ok(license)
    }

    fn fall_back_to_oss(&self, organization_id: &str) {
        if let Err(e) = self.registry.register(self.factory.oss(organization_id)) {
            error!(%organization_id, error = %e, "unable to register oss license");
        }
    }
}

#[async_trait]
impl Deployer<LicenseDeployable> for LicenseDeployer {
    async fn deploy(&self, deployable: &LicenseDeployable) -> SyncResult<()> {
        let organization_id = &deployable.organization_id;
        match self.apply(deployable) {
            Ok(license) => {
                info!(%organization_id, tier = %license.tier, packs = license.packs.len(), "license deployed");
                Ok(())
            }
            Err(source) => {
                warn!(%organization_id, error = %source, "license rejected, falling back to oss");
                self.fall_back_to_oss(organization_id);
                Err(SyncError::License {
                    organization_id: organization_id.clone(),
                    source,
                })
            }
        }
    }

    async fn after_deploy(&self, deployable: &LicenseDeployable) -> SyncResult<()> {
        distribute(self.distributor.as_ref(), deployable, SyncAction::Deploy).await
    }

    async fn undeploy(&self, deployable: &LicenseDeployable) -> SyncResult<()> {
        self.registry
            .unregister(&deployable.organization_id)
            .map_err(|source| SyncError::Undeploy {
                kind: DeployableKind::License,
                id: deployable.organization_id.clone(),
                source,
            })?;
        info!(organization_id = %deployable.organization_id, "license undeployed");
        Ok(())
    }

    async fn after_undeploy(&self, deployable: &LicenseDeployable) -> SyncResult<()> {
        distribute(self.distributor.as_ref(), deployable, SyncAction::Undeploy).await
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LicenseContent {
    tier: String,
    #[serde(default)]
    packs: BTreeSet<String>,
    expires_at: Option<u64>,
}

/// Reads licenses encoded as `{"tier", "packs", "expiresAt"}`.
///
/// No content means the organization runs on the OSS license.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLicenseFactory;

impl LicenseFactory for JsonLicenseFactory {
    fn create(&self, organization_id: &str, content: Option<&str>) -> Result<License, LicenseError> {
        let Some(content) = content else {
            return Ok(License::oss(organization_id));
        };
        let parsed: LicenseContent =
            serde_json::from_str(content).map_err(|e| LicenseError::Invalid(e.to_string()))?;
        if parsed.tier.trim().is_empty() {
            return Err(LicenseError::Invalid("empty tier".to_string()));
        }
        if let Some(expires_at) = parsed.expires_at
            && expires_at <= epoch_millis()
        {
            return Err(LicenseError::Expired(expires_at));
        }
        Ok(License {
            organization_id: organization_id.to_string(),
            tier: parsed.tier,
            packs: parsed.packs,
            expires_at: parsed.expires_at,
        })
    }
}

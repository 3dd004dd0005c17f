//! The Deployer contract and one deployer per entity kind.
//!
//! A deployable goes through `deploy` → `after_deploy` when it is applied
//! and `undeploy` → `after_undeploy` when it is removed. There is no update
//! phase: registries register with upsert semantics, so an update is a
//! re-deploy.
//!
//! Failure policy differs per kind:
//!
//! - single-entity kinds (API, organization, dictionary, shared policy
//!   group, environment flow, access point, node metadata, API Product):
//!   a registry failure aborts the deployable with a [`SyncError`];
//! - collection kinds (subscriptions, API keys of a whole API): each item
//!   failure is logged and skipped;
//! - license: falls back to the OSS license, then reports the error.

mod access_point;
mod api;
mod api_key;
mod debug;
mod license;
mod node_metadata;
mod registry;
mod subscription;

use async_trait::async_trait;

use gatesync_state::SyncAction;

use crate::deployable::*;
use crate::error::{SyncError, SyncResult};
use crate::ports::Distributor;

pub use access_point::AccessPointDeployer;
pub use api::ApiDeployer;
pub use api_key::ApiKeyDeployer;
pub use debug::DebugDeployer;
pub use license::{JsonLicenseFactory, LicenseDeployer};
pub use node_metadata::NodeMetadataDeployer;
pub use registry::RegistryDeployer;
pub use subscription::SubscriptionDeployer;

pub type ApiProductDeployer = RegistryDeployer<ApiProductDeployable>;
pub type DictionaryDeployer = RegistryDeployer<DictionaryDeployable>;
pub type OrganizationDeployer = RegistryDeployer<OrganizationDeployable>;
pub type SharedPolicyGroupDeployer = RegistryDeployer<SharedPolicyGroupDeployable>;
pub type EnvironmentFlowDeployer = RegistryDeployer<EnvironmentFlowDeployable>;

/// Four-phase lifecycle applied to a deployable of type `T`.
#[async_trait]
pub trait Deployer<T: Deployable>: Send + Sync {
    /// Register the payload into its registry.
    async fn deploy(&self, deployable: &T) -> SyncResult<()>;

    /// Side effects that need the entity to be live (dispatch, distribution).
    async fn after_deploy(&self, deployable: &T) -> SyncResult<()>;

    /// Remove what `deploy` registered.
    async fn undeploy(&self, deployable: &T) -> SyncResult<()>;

    async fn after_undeploy(&self, deployable: &T) -> SyncResult<()>;
}

/// Ask the distributor to publish `deployable`, naming it in any error.
pub(crate) async fn distribute(
    distributor: &dyn Distributor,
    deployable: &dyn Deployable,
    action: SyncAction,
) -> SyncResult<()> {
    distributor
        .distribute_if_needed(deployable, action)
        .await
        .map_err(|source| SyncError::Distribution {
            kind: deployable.kind(),
            id: deployable.id().to_string(),
            source,
        })
}

//! Runs manifest entries through their deployers.

use gatesync_deployer::deployers::*;
use gatesync_deployer::{Deployable, DeployerFactory, SyncResult, pipeline};
use tracing::{info, warn};

use crate::manifest::{Action, AnyDeployable, ManifestEntry};

/// Outcome of applying a whole manifest.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub failed: usize,
}

/// One deployer per kind, built once so the subscription deployer's push
/// buffer and in-flight dispatches span the whole manifest.
pub struct Deployers {
    api: ApiDeployer,
    api_key: ApiKeyDeployer,
    api_product: ApiProductDeployer,
    dictionary: DictionaryDeployer,
    organization: OrganizationDeployer,
    shared_policy_group: SharedPolicyGroupDeployer,
    environment_flow: EnvironmentFlowDeployer,
    license: LicenseDeployer,
    node_metadata: NodeMetadataDeployer,
    access_point: AccessPointDeployer,
    debug: DebugDeployer,
    subscription: SubscriptionDeployer,
}

impl Deployers {
    pub fn new(factory: &DeployerFactory) -> Self {
        Self {
            api: factory.create_api_deployer(),
            api_key: factory.create_api_key_deployer(),
            api_product: factory.create_api_product_deployer(),
            dictionary: factory.create_dictionary_deployer(),
            organization: factory.create_organization_deployer(),
            shared_policy_group: factory.create_shared_policy_group_deployer(),
            environment_flow: factory.create_environment_flow_deployer(),
            license: factory.create_license_deployer(),
            node_metadata: factory.create_node_metadata_deployer(),
            access_point: factory.create_access_point_deployer(),
            debug: factory.create_debug_deployer(),
            subscription: factory.create_subscription_deployer(),
        }
    }

    pub async fn apply(&self, entry: &ManifestEntry) -> SyncResult<()> {
        let action = entry.action();
        match entry.deployable() {
            AnyDeployable::Api(d) => run(&self.api, action, d).await,
            AnyDeployable::ApiKey(d) => run(&self.api_key, action, d).await,
            AnyDeployable::ApiProduct(d) => run(&self.api_product, action, d).await,
            AnyDeployable::Dictionary(d) => run(&self.dictionary, action, d).await,
            AnyDeployable::Organization(d) => run(&self.organization, action, d).await,
            AnyDeployable::SharedPolicyGroup(d) => {
                run(&self.shared_policy_group, action, d).await
            }
            AnyDeployable::EnvironmentFlow(d) => run(&self.environment_flow, action, d).await,
            AnyDeployable::License(d) => run(&self.license, action, d).await,
            AnyDeployable::NodeMetadata(d) => run(&self.node_metadata, action, d).await,
            AnyDeployable::AccessPoint(d) => run(&self.access_point, action, d).await,
            AnyDeployable::Debug(d) => run(&self.debug, action, d).await,
            AnyDeployable::Subscription(d) => run(&self.subscription, action, d).await,
        }
    }

    /// Apply every entry in order. A failing entry does not stop the others.
    pub async fn apply_all(&self, entries: &[ManifestEntry]) -> ApplyReport {
        let mut report = ApplyReport::default();
        for entry in entries {
            let deployable = entry.deployable().as_deployable();
            match self.apply(entry).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!(
                        kind = %deployable.kind(),
                        id = %deployable.id(),
                        error = %e,
                        "manifest entry failed"
                    );
                    report.failed += 1;
                }
            }
        }
        self.subscription.drain().await;
        info!(applied = report.applied, failed = report.failed, "manifest applied");
        report
    }
}

async fn run<T, D>(deployer: &D, action: Action, deployable: &T) -> SyncResult<()>
where
    T: Deployable,
    D: Deployer<T>,
{
    match action {
        Action::Deploy => pipeline::deploy(deployer, deployable).await,
        Action::Undeploy => pipeline::undeploy(deployer, deployable).await,
    }
}

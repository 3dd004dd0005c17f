//! Builds every deployer from one set of registries and collaborators.

use std::sync::Arc;

use crate::buffer::PushSubscriptionBuffer;
use crate::deployers::*;
use crate::mapper::SubscriptionMapper;
use crate::memory::{InMemoryApiKeyRegistry, InMemoryRegistry, InMemorySubscriptionRegistry};
use crate::model::*;
use crate::outbox::FailureOutbox;
use crate::ports::*;
use crate::refresher::ApiProductSubscriptionRefresher;

/// The gateway registries the deployers write to.
#[derive(Clone)]
pub struct Registries {
    pub apis: Arc<dyn Registry<ReactableApi>>,
    pub api_products: Arc<dyn Registry<ReactableApiProduct>>,
    pub subscriptions: Arc<dyn SubscriptionRegistry>,
    pub api_keys: Arc<dyn ApiKeyRegistry>,
    pub dictionaries: Arc<dyn Registry<Dictionary>>,
    pub organizations: Arc<dyn Registry<ReactableOrganization>>,
    pub shared_policy_groups: Arc<dyn Registry<SharedPolicyGroup>>,
    pub environment_flows: Arc<dyn Registry<EnvironmentFlow>>,
    pub licenses: Arc<dyn Registry<License>>,
    pub node_metadata: Arc<dyn Registry<NodeMetadata>>,
    pub access_points: Arc<dyn Registry<AccessPoint>>,
    pub debug_events: Arc<dyn Registry<DebugEvent>>,
}

impl Registries {
    /// Fresh, empty in-memory registries.
    pub fn in_memory() -> Self {
        Self {
            apis: Arc::new(InMemoryRegistry::<ReactableApi>::new()),
            api_products: Arc::new(InMemoryRegistry::<ReactableApiProduct>::new()),
            subscriptions: Arc::new(InMemorySubscriptionRegistry::new()),
            api_keys: Arc::new(InMemoryApiKeyRegistry::new()),
            dictionaries: Arc::new(InMemoryRegistry::<Dictionary>::new()),
            organizations: Arc::new(InMemoryRegistry::<ReactableOrganization>::new()),
            shared_policy_groups: Arc::new(InMemoryRegistry::<SharedPolicyGroup>::new()),
            environment_flows: Arc::new(InMemoryRegistry::<EnvironmentFlow>::new()),
            licenses: Arc::new(InMemoryRegistry::<License>::new()),
            node_metadata: Arc::new(InMemoryRegistry::<NodeMetadata>::new()),
            access_points: Arc::new(InMemoryRegistry::<AccessPoint>::new()),
            debug_events: Arc::new(InMemoryRegistry::<DebugEvent>::new()),
        }
    }
}

/// Everything besides registries that deployers talk to.
#[derive(Clone)]
pub struct SyncCollaborators {
    pub distributor: Arc<dyn Distributor>,
    pub dispatcher: Arc<dyn SubscriptionDispatcher>,
    pub command_store: Arc<dyn CommandStore>,
    pub subscription_store: Arc<dyn SubscriptionStore>,
    pub api_key_store: Arc<dyn ApiKeyStore>,
    pub license_factory: Arc<dyn LicenseFactory>,
    /// Sender id of outbox commands.
    pub node_id: String,
}

pub struct DeployerFactory {
    registries: Registries,
    collaborators: SyncCollaborators,
    push_buffer: Arc<PushSubscriptionBuffer>,
}

impl DeployerFactory {
    pub fn new(registries: Registries, collaborators: SyncCollaborators) -> Self {
        Self {
            registries,
            collaborators,
            push_buffer: Arc::new(PushSubscriptionBuffer::new()),
        }
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn create_api_deployer(&self) -> ApiDeployer {
        ApiDeployer::new(self.registries.apis.clone(), self.distributor())
    }

    pub fn create_api_product_deployer(&self) -> ApiProductDeployer {
        ApiProductDeployer::new(self.registries.api_products.clone(), self.distributor())
    }

    pub fn create_api_key_deployer(&self) -> ApiKeyDeployer {
        ApiKeyDeployer::new(self.registries.api_keys.clone(), self.distributor())
    }

    /// Subscription deployers of one factory share their push buffer.
    pub fn create_subscription_deployer(&self) -> SubscriptionDeployer {
        SubscriptionDeployer::new(
            self.registries.subscriptions.clone(),
            self.distributor(),
            self.collaborators.dispatcher.clone(),
            FailureOutbox::new(
                self.collaborators.command_store.clone(),
                self.collaborators.node_id.clone(),
            ),
            self.push_buffer.clone(),
        )
    }

    pub fn create_dictionary_deployer(&self) -> DictionaryDeployer {
        DictionaryDeployer::new(self.registries.dictionaries.clone(), self.distributor())
    }

    pub fn create_organization_deployer(&self) -> OrganizationDeployer {
        OrganizationDeployer::new(self.registries.organizations.clone(), self.distributor())
    }

    pub fn create_shared_policy_group_deployer(&self) -> SharedPolicyGroupDeployer {
        SharedPolicyGroupDeployer::new(
            self.registries.shared_policy_groups.clone(),
            self.distributor(),
        )
    }

    pub fn create_environment_flow_deployer(&self) -> EnvironmentFlowDeployer {
        EnvironmentFlowDeployer::new(self.registries.environment_flows.clone(), self.distributor())
    }

    pub fn create_license_deployer(&self) -> LicenseDeployer {
        LicenseDeployer::new(
            self.registries.licenses.clone(),
            self.collaborators.license_factory.clone(),
            self.distributor(),
        )
    }

    pub fn create_node_metadata_deployer(&self) -> NodeMetadataDeployer {
        NodeMetadataDeployer::new(self.registries.node_metadata.clone())
    }

    pub fn create_access_point_deployer(&self) -> AccessPointDeployer {
        AccessPointDeployer::new(self.registries.access_points.clone(), self.distributor())
    }

    pub fn create_debug_deployer(&self) -> DebugDeployer {
        DebugDeployer::new(self.registries.debug_events.clone())
    }

    pub fn create_api_product_subscription_refresher(&self) -> ApiProductSubscriptionRefresher {
        ApiProductSubscriptionRefresher::new(
            self.collaborators.subscription_store.clone(),
            self.collaborators.api_key_store.clone(),
            self.registries.subscriptions.clone(),
            self.registries.api_keys.clone(),
            SubscriptionMapper::new(self.registries.api_products.clone()),
        )
    }

    fn distributor(&self) -> Arc<dyn Distributor> {
        self.collaborators.distributor.clone()
    }
}

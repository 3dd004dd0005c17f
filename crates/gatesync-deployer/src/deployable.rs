//! Deployables — immutable descriptions of what to apply.
//!
//! Every deployer input is a concrete type here. Inputs that can arrive
//! either as a whole API (bulk, "replace everything owned by this id") or as
//! one incremental item are sum types with one variant per scope, so every
//! phase matches on them exhaustively.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::*;

/// Entity kind a deployable carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployableKind {
    Api,
    ApiKey,
    ApiProduct,
    Dictionary,
    Organization,
    SharedPolicyGroup,
    EnvironmentFlow,
    License,
    NodeMetadata,
    AccessPoint,
    Debug,
    Subscription,
}

impl DeployableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployableKind::Api => "api",
            DeployableKind::ApiKey => "api_key",
            DeployableKind::ApiProduct => "api_product",
            DeployableKind::Dictionary => "dictionary",
            DeployableKind::Organization => "organization",
            DeployableKind::SharedPolicyGroup => "shared_policy_group",
            DeployableKind::EnvironmentFlow => "environment_flow",
            DeployableKind::License => "license",
            DeployableKind::NodeMetadata => "node_metadata",
            DeployableKind::AccessPoint => "access_point",
            DeployableKind::Debug => "debug",
            DeployableKind::Subscription => "subscription",
        }
    }
}

impl fmt::Display for DeployableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment scope of a deployable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentScope {
    /// A whole entity with all its sub-objects. Reaches every node through
    /// the top-level synchronization, never distributed.
    Bulk,
    /// One incremental item scoped to an already-deployed parent.
    Single,
}

/// Common view over every deployable.
pub trait Deployable: Send + Sync {
    /// Stable identifier of the deployed entity.
    fn id(&self) -> &str;

    fn kind(&self) -> DeployableKind;

    fn scope(&self) -> DeploymentScope;

    /// Environments this deployable applies to.
    fn environments(&self) -> BTreeSet<String>;

    /// JSON form sent to peer nodes on distribution.
    fn payload(&self) -> serde_json::Result<String>;
}

fn environments_of<'a>(ids: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
    ids.into_iter().cloned().collect()
}

// ── API reactor (bulk) ────────────────────────────────────────────

/// A whole API with every subscription and API key currently attached to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiReactorDeployable {
    pub api: ReactableApi,
    /// Plans subscriptions and keys may belong to. Items on other plans are ignored.
    pub subscribable_plans: BTreeSet<String>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

impl Deployable for ApiReactorDeployable {
    fn id(&self) -> &str {
        &self.api.id
    }

    fn kind(&self) -> DeployableKind {
        DeployableKind::Api
    }

    fn scope(&self) -> DeploymentScope {
        DeploymentScope::Bulk
    }

    fn environments(&self) -> BTreeSet<String> {
        environments_of([&self.api.environment_id])
    }

    fn payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ── Subscriptions ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SingleSubscriptionDeployable {
    pub subscription: Subscription,
}

/// Input of the subscription deployer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum SubscriptionDeployable {
    ApiReactor(ApiReactorDeployable),
    Single(SingleSubscriptionDeployable),
}

impl From<ApiReactorDeployable> for SubscriptionDeployable {
    fn from(deployable: ApiReactorDeployable) -> Self {
        SubscriptionDeployable::ApiReactor(deployable)
    }
}

impl From<Subscription> for SubscriptionDeployable {
    fn from(subscription: Subscription) -> Self {
        SubscriptionDeployable::Single(SingleSubscriptionDeployable { subscription })
    }
}

impl Deployable for SubscriptionDeployable {
    fn id(&self) -> &str {
        match self {
            SubscriptionDeployable::ApiReactor(d) => d.id(),
            SubscriptionDeployable::Single(d) => &d.subscription.id,
        }
    }

    fn kind(&self) -> DeployableKind {
        DeployableKind::Subscription
    }

    fn scope(&self) -> DeploymentScope {
        match self {
            SubscriptionDeployable::ApiReactor(_) => DeploymentScope::Bulk,
            SubscriptionDeployable::Single(_) => DeploymentScope::Single,
        }
    }

    fn environments(&self) -> BTreeSet<String> {
        match self {
            SubscriptionDeployable::ApiReactor(d) => d.environments(),
            SubscriptionDeployable::Single(d) => {
                environments_of([&d.subscription.environment_id])
            }
        }
    }

    fn payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ── API keys ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SingleApiKeyDeployable {
    pub api_key: ApiKey,
}

/// Input of the API key deployer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ApiKeyDeployable {
    ApiReactor(ApiReactorDeployable),
    Single(SingleApiKeyDeployable),
}

impl From<ApiReactorDeployable> for ApiKeyDeployable {
    fn from(deployable: ApiReactorDeployable) -> Self {
        ApiKeyDeployable::ApiReactor(deployable)
    }
}

impl From<ApiKey> for ApiKeyDeployable {
    fn from(api_key: ApiKey) -> Self {
        ApiKeyDeployable::Single(SingleApiKeyDeployable { api_key })
    }
}

impl Deployable for ApiKeyDeployable {
    fn id(&self) -> &str {
        match self {
            ApiKeyDeployable::ApiReactor(d) => d.id(),
            ApiKeyDeployable::Single(d) => &d.api_key.id,
        }
    }

    fn kind(&self) -> DeployableKind {
        DeployableKind::ApiKey
    }

    fn scope(&self) -> DeploymentScope {
        match self {
            ApiKeyDeployable::ApiReactor(_) => DeploymentScope::Bulk,
            ApiKeyDeployable::Single(_) => DeploymentScope::Single,
        }
    }

    fn environments(&self) -> BTreeSet<String> {
        match self {
            ApiKeyDeployable::ApiReactor(d) => d.environments(),
            ApiKeyDeployable::Single(d) => environments_of([&d.api_key.environment_id]),
        }
    }

    fn payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ── Single-entity deployables ─────────────────────────────────────

/// Deployables wrapping exactly one registry entity.
pub trait EntityDeployable: Deployable + Clone + 'static {
    type Entity: Keyed + Clone + Send + Sync + 'static;

    fn entity(&self) -> &Self::Entity;
}

macro_rules! entity_deployable {
    (
        $(#[$meta:meta])*
        $name:ident { $field:ident: $entity:ty }, $kind:ident, |$this:ident| $envs:expr
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
        pub struct $name {
            pub $field: $entity,
        }

        impl Deployable for $name {
            fn id(&self) -> &str {
                &self.$field.id
            }

            fn kind(&self) -> DeployableKind {
                DeployableKind::$kind
            }

            fn scope(&self) -> DeploymentScope {
                DeploymentScope::Single
            }

            fn environments(&self) -> BTreeSet<String> {
                let $this = &self.$field;
                environments_of($envs)
            }

            fn payload(&self) -> serde_json::Result<String> {
                serde_json::to_string(self)
            }
        }

        impl EntityDeployable for $name {
            type Entity = $entity;

            fn entity(&self) -> &$entity {
                &self.$field
            }
        }
    };
}

entity_deployable!(
    /// An API Product and its backing APIs.
    ApiProductDeployable { api_product: ReactableApiProduct },
    ApiProduct,
    |p| [&p.environment_id]
);

entity_deployable!(
    DictionaryDeployable { dictionary: Dictionary },
    Dictionary,
    |d| [&d.environment_id]
);

entity_deployable!(
    OrganizationDeployable { organization: ReactableOrganization },
    Organization,
    |o| &o.environment_ids
);

entity_deployable!(
    SharedPolicyGroupDeployable { shared_policy_group: SharedPolicyGroup },
    SharedPolicyGroup,
    |g| [&g.environment_id]
);

entity_deployable!(
    EnvironmentFlowDeployable { environment_flow: EnvironmentFlow },
    EnvironmentFlow,
    |f| [&f.environment_id]
);

entity_deployable!(
    /// A one-shot debug request. Never undeployed, never distributed.
    DebugDeployable { event: DebugEvent },
    Debug,
    |e| [&e.environment_id]
);

// ── License ───────────────────────────────────────────────────────

/// License content to apply for an organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LicenseDeployable {
    pub organization_id: String,
    /// Encoded license. `None` means the organization has no license.
    pub license: Option<String>,
}

impl Deployable for LicenseDeployable {
    fn id(&self) -> &str {
        &self.organization_id
    }

    fn kind(&self) -> DeployableKind {
        DeployableKind::License
    }

    fn scope(&self) -> DeploymentScope {
        DeploymentScope::Single
    }

    fn environments(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ── Node metadata ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeMetadataDeployable {
    pub metadata: NodeMetadata,
}

impl Deployable for NodeMetadataDeployable {
    fn id(&self) -> &str {
        &self.metadata.node_id
    }

    fn kind(&self) -> DeployableKind {
        DeployableKind::NodeMetadata
    }

    fn scope(&self) -> DeploymentScope {
        DeploymentScope::Single
    }

    fn environments(&self) -> BTreeSet<String> {
        self.metadata.environment_ids.clone()
    }

    fn payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ── Access points ─────────────────────────────────────────────────

/// Every access point of one environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessPointDeployable {
    pub environment_id: String,
    pub access_points: Vec<AccessPoint>,
}

impl Deployable for AccessPointDeployable {
    fn id(&self) -> &str {
        &self.environment_id
    }

    fn kind(&self) -> DeployableKind {
        DeployableKind::AccessPoint
    }

    fn scope(&self) -> DeploymentScope {
        DeploymentScope::Single
    }

    fn environments(&self) -> BTreeSet<String> {
        environments_of([&self.environment_id])
    }

    fn payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

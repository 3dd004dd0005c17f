//! JSON input files: deployable manifests and control-plane record dumps.
//!
//! A manifest is an array of entries such as
//!
//! ```json
//! [
//!   {"action": "deploy", "kind": "dictionary", "dictionary": {...}},
//!   {"action": "undeploy", "kind": "subscription", "scope": "single", "subscription": {...}}
//! ]
//! ```

use std::path::Path;

use serde::Deserialize;

use gatesync_deployer::deployable::*;
use gatesync_state::{ApiKeyRecord, SubscriptionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Deploy,
    Undeploy,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManifestEntry {
    Deploy(AnyDeployable),
    Undeploy(AnyDeployable),
}

impl ManifestEntry {
    pub fn action(&self) -> Action {
        match self {
            ManifestEntry::Deploy(_) => Action::Deploy,
            ManifestEntry::Undeploy(_) => Action::Undeploy,
        }
    }

    pub fn deployable(&self) -> &AnyDeployable {
        match self {
            ManifestEntry::Deploy(d) | ManifestEntry::Undeploy(d) => d,
        }
    }
}

/// One deployable of any kind.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnyDeployable {
    Api(ApiReactorDeployable),
    ApiKey(ApiKeyDeployable),
    ApiProduct(ApiProductDeployable),
    Dictionary(DictionaryDeployable),
    Organization(OrganizationDeployable),
    SharedPolicyGroup(SharedPolicyGroupDeployable),
    EnvironmentFlow(EnvironmentFlowDeployable),
    License(LicenseDeployable),
    NodeMetadata(NodeMetadataDeployable),
    AccessPoint(AccessPointDeployable),
    Debug(DebugDeployable),
    Subscription(SubscriptionDeployable),
}

impl AnyDeployable {
    pub fn as_deployable(&self) -> &dyn Deployable {
        match self {
            AnyDeployable::Api(d) => d,
            AnyDeployable::ApiKey(d) => d,
            AnyDeployable::ApiProduct(d) => d,
            AnyDeployable::Dictionary(d) => d,
            AnyDeployable::Organization(d) => d,
            AnyDeployable::SharedPolicyGroup(d) => d,
            AnyDeployable::EnvironmentFlow(d) => d,
            AnyDeployable::License(d) => d,
            AnyDeployable::NodeMetadata(d) => d,
            AnyDeployable::AccessPoint(d) => d,
            AnyDeployable::Debug(d) => d,
            AnyDeployable::Subscription(d) => d,
        }
    }
}

pub fn read_manifest(path: &Path) -> anyhow::Result<Vec<ManifestEntry>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Raw control-plane records to load into the store.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Records {
    pub subscriptions: Vec<SubscriptionRecord>,
    pub api_keys: Vec<ApiKeyRecord>,
}

impl Records {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

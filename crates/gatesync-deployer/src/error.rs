//! Deployer error types.

use thiserror::Error;

use gatesync_state::StateError;

use crate::deployable::DeployableKind;

/// Errors surfaced by a deployer phase or by the product refresher.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("an error occurred when trying to deploy {kind} [{id}]")]
    Deploy {
        kind: DeployableKind,
        id: String,
        #[source]
        source: RegistryError,
    },

    #[error("an error occurred when trying to undeploy {kind} [{id}]")]
    Undeploy {
        kind: DeployableKind,
        id: String,
        #[source]
        source: RegistryError,
    },

    #[error("unable to apply license for organization [{organization_id}], OSS license applied instead")]
    License {
        organization_id: String,
        #[source]
        source: LicenseError,
    },

    #[error("unable to distribute {kind} [{id}] to the cluster")]
    Distribution {
        kind: DeployableKind,
        id: String,
        #[source]
        source: DistributionError,
    },

    #[error("unable to synchronize subscriptions for plans {plans:?}")]
    SubscriptionSync {
        plans: Vec<String>,
        #[source]
        source: StateError,
    },

    #[error("unable to synchronize api keys for {subscriptions} subscriptions")]
    ApiKeySync {
        subscriptions: usize,
        #[source]
        source: StateError,
    },
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Errors returned by a gateway registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registration rejected: {0}")]
    Rejected(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned by the push dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("push transport error: {0}")]
    Transport(String),

    #[error("invalid push configuration: {0}")]
    Configuration(String),
}

/// Errors building or registering a license.
#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("invalid license: {0}")]
    Invalid(String),

    #[error("license expired at {0}")]
    Expired(u64),

    #[error("license registration failed: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors publishing a change to the rest of the cluster.
#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("payload serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

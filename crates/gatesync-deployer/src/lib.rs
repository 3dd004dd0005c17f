//! gatesync-deployer — applies resolved gateway configuration to the live
//! registries.
//!
//! Every configuration object (API, subscription, API key, dictionary,
//! license, ...) arrives as a [`Deployable`] and goes through the four
//! phases of its [`Deployer`]. Incremental changes are then handed to a
//! [`Distributor`] so peer nodes can apply them too.
//!
//! # Architecture
//!
//! ```text
//! DeployerFactory
//!   ├── Registries (one per entity kind, ports::Registry)
//!   ├── SubscriptionDeployer
//!   │     ├── PushSubscriptionBuffer (deploy → after_deploy)
//!   │     ├── SubscriptionDispatcher (detached, state driven)
//!   │     └── FailureOutbox (CommandStore, blocking pool)
//!   ├── ApiProductSubscriptionRefresher
//!   │     └── SubscriptionStore + ApiKeyStore → mappers → registries
//!   └── Distributor (single-scope deployables only)
//! ```

pub mod buffer;
pub mod deployable;
pub mod deployers;
pub mod dispatcher;
pub mod distribution;
pub mod error;
pub mod factory;
pub mod mapper;
pub mod memory;
pub mod model;
pub mod outbox;
pub mod pipeline;
pub mod ports;
pub mod refresher;

#[cfg(test)]
pub(crate) mod testing;

pub use deployable::{Deployable, DeployableKind, DeploymentScope};
pub use deployers::Deployer;
pub use dispatcher::{PushTransport, ReconcilingDispatcher};
pub use distribution::{ClusterDistributor, NoopDistributor};
pub use error::{
    DispatchError, DistributionError, LicenseError, RegistryError, RegistryResult, SyncError,
    SyncResult,
};
pub use factory::{DeployerFactory, Registries, SyncCollaborators};
pub use ports::Distributor;
pub use refresher::{ApiProductSubscriptionRefresher, RefreshSummary};

//! Gateway-side domain types.
//!
//! These are the "reactable" forms of configuration entities: what the
//! live registries hold once an entity has been adapted for traffic
//! handling. Subscriptions and API keys here are always scoped to exactly
//! one API, even when the control-plane record belongs to an API Product.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use gatesync_state::{ReferenceType, SubscriptionStatus, SubscriptionType};

/// Entities that live in a registry under a stable key.
pub trait Keyed {
    fn registry_key(&self) -> String;
}

// ── APIs and products ─────────────────────────────────────────────

/// A plan of an API or API Product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: String,
    pub name: String,
    /// Security type, e.g. `API_KEY`, `JWT`, `KEY_LESS`, `PUSH`.
    pub security: String,
}

/// An API ready to be served by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactableApi {
    pub id: String,
    pub name: String,
    pub environment_id: String,
    pub plans: Vec<Plan>,
    /// Unix millis of the deployment that produced this definition.
    pub deployed_at: u64,
    /// Opaque API definition.
    #[serde(default)]
    pub definition: serde_json::Value,
}

/// A bundle of plans shared across several backing APIs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactableApiProduct {
    pub id: String,
    pub name: String,
    pub environment_id: String,
    pub api_ids: BTreeSet<String>,
    pub plans: Vec<Plan>,
}

// ── Standalone entities ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dictionary {
    pub id: String,
    pub key: String,
    pub environment_id: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactableOrganization {
    pub id: String,
    pub name: String,
    pub environment_ids: BTreeSet<String>,
    /// Organization-level flows, opaque to the synchronizer.
    #[serde(default)]
    pub flows: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SharedPolicyGroup {
    pub id: String,
    pub name: String,
    pub environment_id: String,
    /// Execution phase, e.g. `REQUEST` or `PUBLISH`.
    pub phase: String,
    #[serde(default)]
    pub policies: Vec<serde_json::Value>,
    pub deployed_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentFlow {
    pub id: String,
    pub name: String,
    pub environment_id: String,
    pub phase: String,
    #[serde(default)]
    pub definition: serde_json::Value,
}

/// License tier and packs granted to an organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct License {
    pub organization_id: String,
    pub tier: String,
    pub packs: BTreeSet<String>,
    /// Unix millis. `None` never expires.
    pub expires_at: Option<u64>,
}

impl License {
    pub const OSS_TIER: &'static str = "oss";

    /// The built-in license every organization falls back to.
    pub fn oss(organization_id: &str) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            tier: Self::OSS_TIER.to_string(),
            packs: BTreeSet::new(),
            expires_at: None,
        }
    }

    pub fn is_oss(&self) -> bool {
        self.tier == Self::OSS_TIER
    }
}

/// Metadata describing the gateway node itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeMetadata {
    pub node_id: String,
    pub installation_id: String,
    pub organization_ids: BTreeSet<String>,
    pub environment_ids: BTreeSet<String>,
}

/// Host the gateway answers on for an environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessPoint {
    pub id: String,
    pub environment_id: String,
    pub host: String,
    /// What the host exposes, e.g. `GATEWAY` or `TCP_GATEWAY`.
    pub target: String,
    pub secured: bool,
}

/// One-shot debug request replayed against an API definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebugEvent {
    pub id: String,
    pub api_id: String,
    pub environment_id: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

// ── Subscriptions and API keys ────────────────────────────────────

/// A subscription bound to a single API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: String,
    pub api_id: String,
    pub plan_id: String,
    pub application_id: String,
    pub client_id: Option<String>,
    pub status: SubscriptionStatus,
    pub subscription_type: SubscriptionType,
    pub environment_id: String,
    pub reference_type: ReferenceType,
    /// API id or API Product id the control plane recorded.
    pub reference_id: String,
    /// Opaque push configuration.
    pub configuration: Option<String>,
    pub starting_at: Option<u64>,
    pub ending_at: Option<u64>,
    /// Re-run dispatch reconciliation even when nothing changed.
    #[serde(default)]
    pub force_dispatch: bool,
    pub updated_at: u64,
}

impl Subscription {
    pub fn is_push(&self) -> bool {
        self.subscription_type == SubscriptionType::Push
    }

    /// Whether the subscription's end date has passed at `now` (unix millis).
    pub fn is_expired(&self, now: u64) -> bool {
        self.ending_at.is_some_and(|ending_at| ending_at <= now)
    }
}

/// An API key bound to one subscription of one API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKey {
    pub id: String,
    pub key: String,
    pub api_id: String,
    pub plan_id: String,
    pub application_id: String,
    pub subscription_id: String,
    pub environment_id: String,
    pub revoked: bool,
    pub expire_at: Option<u64>,
}

// ── Registry keys ─────────────────────────────────────────────────

macro_rules! keyed_by_field {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(
            impl Keyed for $ty {
                fn registry_key(&self) -> String {
                    self.$field.clone()
                }
            }
        )*
    };
}

keyed_by_field! {
    ReactableApi => id,
    ReactableApiProduct => id,
    Dictionary => id,
    ReactableOrganization => id,
    SharedPolicyGroup => id,
    EnvironmentFlow => id,
    License => organization_id,
    NodeMetadata => node_id,
    AccessPoint => id,
    DebugEvent => id,
}

impl Keyed for Subscription {
    fn registry_key(&self) -> String {
        format!("{}:{}", self.api_id, self.id)
    }
}

impl Keyed for ApiKey {
    fn registry_key(&self) -> String {
        format!("{}:{}", self.api_id, self.key)
    }
}

/// Current Unix epoch in milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

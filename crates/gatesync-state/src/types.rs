//! Record types for the gatesync state store.
//!
//! These are the raw, control-plane shaped records: a subscription here
//! still points at an API *or* an API Product, and an API key still lists
//! every subscription it serves. The deployer crate maps them into the
//! gateway-side domain types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Unique identifier for a subscription.
pub type SubscriptionId = String;

/// Unique identifier for a node in the gateway cluster.
pub type NodeId = String;

// ── Subscription ──────────────────────────────────────────────────

/// Lifecycle status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Pending,
    Accepted,
    Paused,
    Closed,
    Rejected,
}

impl SubscriptionStatus {
    /// Statuses mirrored into the gateway. Rejected subscriptions never are.
    pub const SYNCABLE: [SubscriptionStatus; 4] = [
        SubscriptionStatus::Accepted,
        SubscriptionStatus::Closed,
        SubscriptionStatus::Paused,
        SubscriptionStatus::Pending,
    ];
}

/// Delivery model of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionType {
    #[default]
    Standard,
    /// The gateway actively pushes messages to a subscriber-owned transport.
    Push,
}

/// What a subscription's `reference_id` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    #[default]
    Api,
    ApiProduct,
}

/// Raw subscription record as written by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionRecord {
    pub id: SubscriptionId,
    /// API id or API Product id, depending on `reference_type`.
    pub reference_id: String,
    pub reference_type: ReferenceType,
    pub plan: String,
    pub application: String,
    pub client_id: Option<String>,
    pub status: SubscriptionStatus,
    pub subscription_type: SubscriptionType,
    pub environment_id: String,
    /// Opaque JSON configuration (push entrypoint settings).
    pub configuration: Option<String>,
    /// Unix millis.
    pub starting_at: Option<u64>,
    /// Unix millis.
    pub ending_at: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
}

// ── API key ───────────────────────────────────────────────────────

/// Raw API key record. A shared key serves several subscriptions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKeyRecord {
    pub id: String,
    pub key: String,
    pub subscriptions: BTreeSet<SubscriptionId>,
    pub application: String,
    pub environment_id: String,
    pub revoked: bool,
    pub expire_at: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
}

// ── Command (outbox) ──────────────────────────────────────────────

/// Recipient class of an outbox command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandRecipient {
    ManagementApis,
}

/// Tags describing what a command carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandTag {
    SubscriptionFailure,
}

/// Outbox entry written by a gateway node for the management plane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: String,
    /// Sender node id.
    pub from: NodeId,
    pub to: CommandRecipient,
    pub tags: Vec<CommandTag>,
    pub created_at: u64,
    pub updated_at: u64,
    pub environment_id: String,
    /// Opaque JSON payload.
    pub content: String,
}

// ── Distributed event ─────────────────────────────────────────────

/// Direction of a synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncAction {
    Deploy,
    Undeploy,
}

/// Incremental change published for the other nodes of the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributedEvent {
    pub id: String,
    /// Deployable kind, e.g. `subscription` or `dictionary`.
    pub kind: String,
    pub sync_action: SyncAction,
    /// JSON payload of the deployable.
    pub payload: String,
    pub updated_at: u64,
}

// ── Search criteria ───────────────────────────────────────────────

/// Order of a sorted search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// Sort on the record's last update time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sort {
    pub order: Order,
}

impl Sort {
    /// Oldest first.
    pub fn updated_at_asc() -> Self {
        Self { order: Order::Asc }
    }
}

/// Filter for subscription searches. Empty sets do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionCriteria {
    pub plans: BTreeSet<String>,
    pub environments: BTreeSet<String>,
    pub statuses: BTreeSet<SubscriptionStatus>,
    pub reference_type: Option<ReferenceType>,
}

impl SubscriptionCriteria {
    pub fn matches(&self, record: &SubscriptionRecord) -> bool {
        (self.plans.is_empty() || self.plans.contains(&record.plan))
            && (self.environments.is_empty() || self.environments.contains(&record.environment_id))
            && (self.statuses.is_empty() || self.statuses.contains(&record.status))
            && self
                .reference_type
                .is_none_or(|reference_type| reference_type == record.reference_type)
    }
}

/// Filter for API key lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiKeyCriteria {
    /// Keys serving any of these subscriptions. Empty does not filter.
    pub subscriptions: BTreeSet<SubscriptionId>,
    pub environments: BTreeSet<String>,
    pub include_revoked: bool,
}

impl ApiKeyCriteria {
    pub fn matches(&self, record: &ApiKeyRecord) -> bool {
        (self.include_revoked || !record.revoked)
            && (self.environments.is_empty() || self.environments.contains(&record.environment_id))
            && (self.subscriptions.is_empty()
                || record
                    .subscriptions
                    .iter()
                    .any(|id| self.subscriptions.contains(id)))
    }
}

impl DistributedEvent {
    /// Build the composite key for the distributed events table.
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(plan: &str, status: SubscriptionStatus) -> SubscriptionRecord {
        SubscriptionRecord {
            id: "sub-1".to_string(),
            reference_id: "api-1".to_string(),
            reference_type: ReferenceType::Api,
            plan: plan.to_string(),
            application: "app-1".to_string(),
            client_id: None,
            status,
            subscription_type: SubscriptionType::Standard,
            environment_id: "DEFAULT".to_string(),
            configuration: None,
            starting_at: None,
            ending_at: None,
            created_at: 1000,
            updated_at: 1000,
        }
    }

    #[test]
    fn empty_criteria_matches_everything() {
        let criteria = SubscriptionCriteria::default();
        assert!(criteria.matches(&record("plan-1", SubscriptionStatus::Rejected)));
    }

    #[test]
    fn syncable_statuses_exclude_rejected() {
        let criteria = SubscriptionCriteria {
            statuses: SubscriptionStatus::SYNCABLE.into_iter().collect(),
            ..Default::default()
        };
        assert!(criteria.matches(&record("plan-1", SubscriptionStatus::Paused)));
        assert!(!criteria.matches(&record("plan-1", SubscriptionStatus::Rejected)));
    }

    #[test]
    fn reference_type_filter() {
        let criteria = SubscriptionCriteria {
            reference_type: Some(ReferenceType::ApiProduct),
            ..Default::default()
        };
        assert!(!criteria.matches(&record("plan-1", SubscriptionStatus::Accepted)));
    }

    #[test]
    fn status_serializes_in_upper_case() {
        let json = serde_json::to_string(&SubscriptionStatus::Accepted).unwrap();
        assert_eq!(json, "\"ACCEPTED\"");
        let json = serde_json::to_string(&ReferenceType::ApiProduct).unwrap();
        assert_eq!(json, "\"API_PRODUCT\"");
    }

    #[test]
    fn command_uses_camel_case_fields() {
        let command = Command {
            id: "cmd-1".to_string(),
            from: "node-1".to_string(),
            to: CommandRecipient::ManagementApis,
            tags: vec![CommandTag::SubscriptionFailure],
            created_at: 1,
            updated_at: 1,
            environment_id: "DEFAULT".to_string(),
            content: "{}".to_string(),
        };
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["environmentId"], "DEFAULT");
        assert_eq!(value["to"], "MANAGEMENT_APIS");
        assert_eq!(value["tags"][0], "SUBSCRIPTION_FAILURE");
    }

    #[test]
    fn api_key_criteria_matches_any_owning_subscription() {
        let key = ApiKeyRecord {
            id: "key-1".to_string(),
            key: "secret".to_string(),
            subscriptions: ["sub-1".to_string(), "sub-2".to_string()].into(),
            application: "app-1".to_string(),
            environment_id: "DEFAULT".to_string(),
            revoked: true,
            expire_at: None,
            created_at: 1,
            updated_at: 1,
        };
        let mut criteria = ApiKeyCriteria {
            subscriptions: ["sub-2".to_string()].into(),
            ..Default::default()
        };
        assert!(!criteria.matches(&key));
        criteria.include_revoked = true;
        assert!(criteria.matches(&key));
    }
}

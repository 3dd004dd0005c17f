//! Failure outbox — reports push dispatch failures to the management plane.
//!
//! A failure becomes one [`Command`] tagged `SUBSCRIPTION_FAILURE`. The
//! write runs on the blocking I/O pool and is best effort: a failed write
//! is logged and dropped, never retried and never re-raised.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use gatesync_state::{Command, CommandRecipient, CommandTag};

use crate::model::{Subscription, epoch_millis};
use crate::ports::CommandStore;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionFailure<'a> {
    subscription_id: &'a str,
    failure_cause: &'a str,
}

#[derive(Clone)]
pub struct FailureOutbox {
    store: Arc<dyn CommandStore>,
    node_id: String,
}

impl FailureOutbox {
    pub fn new(store: Arc<dyn CommandStore>, node_id: impl Into<String>) -> Self {
        Self {
            store,
            node_id: node_id.into(),
        }
    }

    /// Build the outbox entry for a failed dispatch.
    pub fn build_command(&self, subscription: &Subscription, cause: &str) -> Command {
        let now = epoch_millis();
        Command {
            id: uuid::Uuid::new_v4().to_string(),
            from: self.node_id.clone(),
            to: CommandRecipient::ManagementApis,
            tags: vec![CommandTag::SubscriptionFailure],
            created_at: now,
            updated_at: now,
            environment_id: subscription.environment_id.clone(),
            content: failure_content(&subscription.id, cause),
        }
    }

    /// Record a dispatch failure. Completes once the write has been attempted.
    pub async fn report(&self, subscription: &Subscription, cause: &str) {
        let command = self.build_command(subscription, cause);
        let store = self.store.clone();
        let command_id = command.id.clone();
        let subscription_id = subscription.id.clone();

        let written = tokio::task::spawn_blocking(move || store.create(&command)).await;
        match written {
            Ok(Ok(())) => {
                debug!(%command_id, %subscription_id, "subscription failure command created");
            }
            Ok(Err(e)) => {
                error!(
                    %command_id,
                    %subscription_id,
                    error = %e,
                    "unable to create subscription failure command"
                );
            }
            Err(e) => {
                error!(%subscription_id, error = %e, "subscription failure command write aborted");
            }
        }
    }
}

/// JSON body `{subscriptionId, failureCause}`.
fn failure_content(subscription_id: &str, cause: &str) -> String {
    let failure = SubscriptionFailure {
        subscription_id,
        failure_cause: cause,
    };
    serde_json::to_string(&failure).unwrap_or_else(|e| {
        warn!(%subscription_id, error = %e, "failure content serialization failed, building it by hand");
        fallback_content(subscription_id, cause)
    })
}

fn fallback_content(subscription_id: &str, cause: &str) -> String {
    let mut content = Map::new();
    content.insert(
        "subscriptionId".to_string(),
        Value::String(subscription_id.to_string()),
    );
    content.insert("failureCause".to_string(), Value::String(cause.to_string()));
    Value::Object(content).to_string()
}

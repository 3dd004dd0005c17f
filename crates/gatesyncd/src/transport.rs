//! Push transport that only logs connections.
//!
//! Stands in for a real webhook / broker connector: it accepts a
//! subscription when its configuration is absent or valid JSON.

use async_trait::async_trait;
use tracing::info;

use gatesync_deployer::DispatchError;
use gatesync_deployer::PushTransport;
use gatesync_deployer::model::Subscription;

#[derive(Debug, Default)]
pub struct LoggingTransport;

#[async_trait]
impl PushTransport for LoggingTransport {
    async fn open(&self, subscription: &Subscription) -> Result<(), DispatchError> {
        if let Some(configuration) = &subscription.configuration {
            serde_json::from_str::<serde_json::Value>(configuration)
                .map_err(|e| DispatchError::Configuration(e.to_string()))?;
        }
        info!(
            subscription_id = %subscription.id,
            api_id = %subscription.api_id,
            "push transport opened"
        );
        Ok(())
    }

    async fn close(&self, subscription: &Subscription) {
        info!(
            subscription_id = %subscription.id,
            api_id = %subscription.api_id,
            "push transport closed"
        );
    }
}

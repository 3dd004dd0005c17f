//! Raw record → gateway domain mapping.
//!
//! A plain-API subscription record maps to one [`Subscription`]. An API
//! Product record is exploded into one subscription per backing API of the
//! product, all sharing the record's id.

use std::sync::Arc;

use tracing::warn;

use gatesync_state::{ApiKeyRecord, ReferenceType, SubscriptionRecord};

use crate::model::{ApiKey, ReactableApiProduct, Subscription};
use crate::ports::Registry;

#[derive(Clone)]
pub struct SubscriptionMapper {
    api_products: Arc<dyn Registry<ReactableApiProduct>>,
}

impl SubscriptionMapper {
    pub fn new(api_products: Arc<dyn Registry<ReactableApiProduct>>) -> Self {
        Self { api_products }
    }

    /// Map a record to one subscription per API it grants access to.
    ///
    /// An API Product that is not deployed on this gateway yields nothing.
    pub fn to_gateway_subscriptions(&self, record: &SubscriptionRecord) -> Vec<Subscription> {
        match record.reference_type {
            ReferenceType::Api => vec![self.to_gateway_subscription(record, &record.reference_id)],
            ReferenceType::ApiProduct => match self.api_products.get(&record.reference_id) {
                Some(product) => product
                    .api_ids
                    .iter()
                    .map(|api_id| self.to_gateway_subscription(record, api_id))
                    .collect(),
                None => {
                    warn!(
                        subscription_id = %record.id,
                        api_product_id = %record.reference_id,
                        "api product not deployed, subscription ignored"
                    );
                    Vec::new()
                }
            },
        }
    }

    /// Map a record to the subscription it produces on one API.
    pub fn to_gateway_subscription(&self, record: &SubscriptionRecord, api_id: &str) -> Subscription {
        Subscription {
            id: record.id.clone(),
            api_id: api_id.to_string(),
            plan_id: record.plan.clone(),
            application_id: record.application.clone(),
            client_id: record.client_id.clone(),
            status: record.status,
            subscription_type: record.subscription_type,
            environment_id: record.environment_id.clone(),
            reference_type: record.reference_type,
            reference_id: record.reference_id.clone(),
            configuration: record.configuration.clone(),
            starting_at: record.starting_at,
            ending_at: record.ending_at,
            force_dispatch: false,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiKeyMapper;

impl ApiKeyMapper {
    /// Bind a raw key to one of the subscriptions it serves.
    pub fn to_gateway_api_key(&self, record: &ApiKeyRecord, subscription: &Subscription) -> ApiKey {
        ApiKey {
            id: record.id.clone(),
            key: record.key.clone(),
            api_id: subscription.api_id.clone(),
            plan_id: subscription.plan_id.clone(),
            application_id: record.application.clone(),
            subscription_id: subscription.id.clone(),
            environment_id: record.environment_id.clone(),
            revoked: record.revoked,
            expire_at: record.expire_at,
        }
    }
}

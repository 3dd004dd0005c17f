//! API Product subscription refresh.
//!
//! One subscription to an API Product grants access to every API of the
//! product, so it is registered once per backing API. When the product
//! changes, [`refresh`](ApiProductSubscriptionRefresher::refresh) re-registers
//! against the current set of APIs and
//! [`unregister_removed_apis`](ApiProductSubscriptionRefresher::unregister_removed_apis)
//! drops exactly the registrations of the APIs that left the product. APIs
//! still in the product are never touched by a removal.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use gatesync_state::{
    ApiKeyCriteria, ApiKeyRecord, ReferenceType, Sort, SubscriptionCriteria, SubscriptionRecord,
    SubscriptionStatus,
};

use crate::error::{SyncError, SyncResult};
use crate::mapper::{ApiKeyMapper, SubscriptionMapper};
use crate::model::Subscription;
use crate::ports::{ApiKeyRegistry, ApiKeyStore, SubscriptionRegistry, SubscriptionStore};

/// Registrations touched by a refresh or a removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub subscriptions: usize,
    pub api_keys: usize,
}

pub struct ApiProductSubscriptionRefresher {
    subscription_store: Arc<dyn SubscriptionStore>,
    api_key_store: Arc<dyn ApiKeyStore>,
    subscriptions: Arc<dyn SubscriptionRegistry>,
    api_keys: Arc<dyn ApiKeyRegistry>,
    subscription_mapper: SubscriptionMapper,
    api_key_mapper: ApiKeyMapper,
}

impl ApiProductSubscriptionRefresher {
    pub fn new(
        subscription_store: Arc<dyn SubscriptionStore>,
        api_key_store: Arc<dyn ApiKeyStore>,
        subscriptions: Arc<dyn SubscriptionRegistry>,
        api_keys: Arc<dyn ApiKeyRegistry>,
        subscription_mapper: SubscriptionMapper,
    ) -> Self {
        Self {
            subscription_store,
            api_key_store,
            subscriptions,
            api_keys,
            subscription_mapper,
            api_key_mapper: ApiKeyMapper,
        }
    }

    /// Re-register every subscription of `subscribable_plans` against the
    /// current backing APIs, then the API keys serving them.
    ///
    /// Records are replayed oldest first and flagged `force_dispatch` so
    /// push transports reconcile even when the record itself did not change.
    pub async fn refresh(
        &self,
        subscribable_plans: &BTreeSet<String>,
        environments: &BTreeSet<String>,
    ) -> SyncResult<RefreshSummary> {
        if subscribable_plans.is_empty() {
            debug!("no subscribable plans, nothing to refresh");
            return Ok(RefreshSummary::default());
        }

        let records = self.search(subscribable_plans, environments, None)?;
        let mut registered = Vec::new();
        for record in &records {
            for mut subscription in self.subscription_mapper.to_gateway_subscriptions(record) {
                subscription.force_dispatch = true;
                match self.subscriptions.register(subscription.clone()) {
                    Ok(()) => registered.push(subscription),
                    Err(e) => warn!(
                        subscription_id = %subscription.id,
                        api_id = %subscription.api_id,
                        error = %e,
                        "unable to register subscription"
                    ),
                }
            }
        }

        let mut api_keys = 0usize;
        for record in self.find_api_keys(&registered, environments)? {
            for subscription in owning(&registered, &record) {
                let api_key = self.api_key_mapper.to_gateway_api_key(&record, subscription);
                match self.api_keys.register(api_key) {
                    Ok(()) => api_keys += 1,
                    Err(e) => warn!(
                        key_id = %record.id,
                        subscription_id = %subscription.id,
                        api_id = %subscription.api_id,
                        error = %e,
                        "unable to register api key"
                    ),
                }
            }
        }

        let summary = RefreshSummary {
            subscriptions: registered.len(),
            api_keys,
        };
        info!(
            plans = subscribable_plans.len(),
            records = records.len(),
            subscriptions = summary.subscriptions,
            api_keys = summary.api_keys,
            "api product subscriptions refreshed"
        );
        Ok(summary)
    }

    /// Drop the registrations that API Product subscriptions of
    /// `subscribable_plans` hold on `removed_api_ids`.
    pub async fn unregister_removed_apis(
        &self,
        removed_api_ids: &BTreeSet<String>,
        subscribable_plans: &BTreeSet<String>,
        environments: &BTreeSet<String>,
    ) -> SyncResult<RefreshSummary> {
        if removed_api_ids.is_empty() || subscribable_plans.is_empty() {
            debug!("no removed api or no subscribable plan, nothing to unregister");
            return Ok(RefreshSummary::default());
        }

        let records = self.search(
            subscribable_plans,
            environments,
            Some(ReferenceType::ApiProduct),
        )?;
        let removed: Vec<Subscription> = records
            .iter()
            .flat_map(|record| {
                removed_api_ids
                    .iter()
                    .map(|api_id| self.subscription_mapper.to_gateway_subscription(record, api_id))
            })
            .collect();

        let mut subscriptions = 0usize;
        for subscription in &removed {
            match self.subscriptions.unregister(subscription) {
                Ok(()) => subscriptions += 1,
                Err(e) => warn!(
                    subscription_id = %subscription.id,
                    api_id = %subscription.api_id,
                    error = %e,
                    "unable to unregister subscription"
                ),
            }
        }

        let mut api_keys = 0usize;
        for record in self.find_api_keys(&removed, environments)? {
            for subscription in owning(&removed, &record) {
                let api_key = self.api_key_mapper.to_gateway_api_key(&record, subscription);
                if !removed_api_ids.contains(&api_key.api_id) {
                    continue;
                }
                match self.api_keys.unregister(&api_key) {
                    Ok(()) => api_keys += 1,
                    Err(e) => warn!(
                        key_id = %record.id,
                        api_id = %api_key.api_id,
                        error = %e,
                        "unable to unregister api key"
                    ),
                }
            }
        }

        info!(
            removed_apis = removed_api_ids.len(),
            subscriptions, api_keys, "api product subscriptions unregistered from removed apis"
        );
        Ok(RefreshSummary {
            subscriptions,
            api_keys,
        })
    }

    fn search(
        &self,
        plans: &BTreeSet<String>,
        environments: &BTreeSet<String>,
        reference_type: Option<ReferenceType>,
    ) -> SyncResult<Vec<SubscriptionRecord>> {
        let criteria = SubscriptionCriteria {
            plans: plans.clone(),
            environments: environments.clone(),
            statuses: SubscriptionStatus::SYNCABLE.into_iter().collect(),
            reference_type,
        };
        self.subscription_store
            .search(&criteria, Sort::updated_at_asc())
            .map_err(|source| SyncError::SubscriptionSync {
                plans: plans.iter().cloned().collect(),
                source,
            })
    }

    /// Keys serving any of `subscriptions`, revoked ones included.
    fn find_api_keys(
        &self,
        subscriptions: &[Subscription],
        environments: &BTreeSet<String>,
    ) -> SyncResult<Vec<ApiKeyRecord>> {
        // An empty subscription set would match every key.
        if subscriptions.is_empty() {
            return Ok(Vec::new());
        }
        let criteria = ApiKeyCriteria {
            subscriptions: subscriptions.iter().map(|s| s.id.clone()).collect(),
            environments: environments.clone(),
            include_revoked: true,
        };
        self.api_key_store
            .find_by_criteria(&criteria, Sort::updated_at_asc())
            .map_err(|source| SyncError::ApiKeySync {
                subscriptions: criteria.subscriptions.len(),
                source,
            })
    }
}

/// The subscriptions `record` serves.
fn owning<'a>(
    subscriptions: &'a [Subscription],
    record: &'a ApiKeyRecord,
) -> impl Iterator<Item = &'a Subscription> {
    subscriptions
        .iter()
        .filter(|s| record.subscriptions.contains(&s.id))
}

#[cfg(test)]
mod tests {
    use gatesync_state::StateStore;

    use super::*;
    use crate::memory::InMemoryRegistry;
    use crate::model::{ApiKey, ReactableApiProduct};
    use crate::ports::Registry;
    use crate::testing::{self, FailingSubscriptionStore, FlakySubscriptionRegistry};

    struct Fixture {
        store: StateStore,
        subscriptions: Arc<InMemoryRegistry<Subscription>>,
        api_keys: Arc<InMemoryRegistry<ApiKey>>,
        refresher: ApiProductSubscriptionRefresher,
    }

    fn fixture(product_apis: &[&str]) -> Fixture {
        let store = StateStore::open_in_memory().unwrap();
        let products = Arc::new(InMemoryRegistry::<ReactableApiProduct>::new());
        Registry::register(
            products.as_ref(),
            testing::api_product("product-1", product_apis),
        )
        .unwrap();
        let subscriptions = Arc::new(InMemoryRegistry::<Subscription>::new());
        let api_keys = Arc::new(InMemoryRegistry::<ApiKey>::new());
        let refresher = ApiProductSubscriptionRefresher::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            subscriptions.clone(),
            api_keys.clone(),
            SubscriptionMapper::new(products),
        );
        Fixture {
            store,
            subscriptions,
            api_keys,
            refresher,
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_plans_is_a_noop() {
        let f = fixture(&["api-a"]);
        f.store
            .put_subscription(&testing::product_record("sub-1", "product-1", "plan-1", 1000))
            .unwrap();

        let summary = f.refresher.refresh(&set(&[]), &set(&["DEFAULT"])).await.unwrap();
        assert_eq!(summary, RefreshSummary::default());
        assert!(f.subscriptions.is_empty());
    }

    #[tokio::test]
    async fn refresh_explodes_over_every_backing_api() {
        let f = fixture(&["api-a", "api-b"]);
        f.store
            .put_subscription(&testing::product_record("sub-1", "product-1", "plan-1", 1000))
            .unwrap();
        f.store
            .put_api_key(&testing::api_key_record("key-1", &["sub-1"], false))
            .unwrap();

        let summary = f
            .refresher
            .refresh(&set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap();

        assert_eq!(summary.subscriptions, 2);
        assert_eq!(summary.api_keys, 2);
        let registered = f.subscriptions.lookup("api-a:sub-1").unwrap();
        assert!(registered.force_dispatch);
        assert!(f.subscriptions.contains("api-b:sub-1"));
        assert!(f.api_keys.contains("api-a:key-1-value"));
        assert!(f.api_keys.contains("api-b:key-1-value"));
    }

    #[tokio::test]
    async fn refresh_skips_rejected_and_mirrors_revoked_keys() {
        let f = fixture(&["api-a"]);
        let mut rejected = testing::product_record("sub-2", "product-1", "plan-1", 1000);
        rejected.status = SubscriptionStatus::Rejected;
        f.store.put_subscription(&rejected).unwrap();
        f.store
            .put_subscription(&testing::product_record("sub-1", "product-1", "plan-1", 1000))
            .unwrap();
        f.store
            .put_api_key(&testing::api_key_record("key-1", &["sub-1"], true))
            .unwrap();

        f.refresher
            .refresh(&set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap();

        assert!(!f.subscriptions.contains("api-a:sub-2"));
        assert!(f.api_keys.lookup("api-a:key-1-value").unwrap().revoked);
    }

    #[tokio::test]
    async fn refresh_replays_oldest_first() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_subscription(&testing::api_record("sub-new", "api-a", "plan-1", 2000))
            .unwrap();
        store
            .put_subscription(&testing::api_record("sub-old", "api-a", "plan-1", 1000))
            .unwrap();
        let registry = Arc::new(FlakySubscriptionRegistry::failing_on("none"));
        let refresher = ApiProductSubscriptionRefresher::new(
            Arc::new(store.clone()),
            Arc::new(store),
            registry.clone(),
            Arc::new(InMemoryRegistry::<ApiKey>::new()),
            SubscriptionMapper::new(Arc::new(InMemoryRegistry::<ReactableApiProduct>::new())),
        );

        refresher
            .refresh(&set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap();

        assert_eq!(registry.registered(), vec!["sub-old", "sub-new"]);
    }

    #[tokio::test]
    async fn removal_only_touches_removed_apis() {
        let f = fixture(&["api-a", "api-b", "api-c"]);
        f.store
            .put_subscription(&testing::product_record("sub-1", "product-1", "plan-1", 1000))
            .unwrap();
        f.store
            .put_api_key(&testing::api_key_record("key-1", &["sub-1"], false))
            .unwrap();
        f.refresher
            .refresh(&set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap();
        assert_eq!(f.subscriptions.len(), 3);

        let summary = f
            .refresher
            .unregister_removed_apis(&set(&["api-b"]), &set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap();

        assert_eq!(summary.subscriptions, 1);
        assert_eq!(summary.api_keys, 1);
        assert!(f.subscriptions.contains("api-a:sub-1"));
        assert!(!f.subscriptions.contains("api-b:sub-1"));
        assert!(f.subscriptions.contains("api-c:sub-1"));
        assert!(f.api_keys.contains("api-a:key-1-value"));
        assert!(!f.api_keys.contains("api-b:key-1-value"));
        assert!(f.api_keys.contains("api-c:key-1-value"));
    }

    fn shared_key_fixture() -> Fixture {
        let f = fixture(&["api-a", "api-b"]);
        f.store
            .put_subscription(&testing::product_record("sub-1", "product-1", "plan-1", 1000))
            .unwrap();
        f.store
            .put_subscription(&testing::product_record("sub-2", "product-1", "plan-1", 2000))
            .unwrap();
        f.store
            .put_api_key(&testing::api_key_record("key-1", &["sub-1", "sub-2"], false))
            .unwrap();
        f
    }

    #[tokio::test]
    async fn shared_key_is_registered_per_owner_and_api() {
        let f = shared_key_fixture();

        let summary = f
            .refresher
            .refresh(&set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap();

        assert_eq!(summary.subscriptions, 4);
        assert_eq!(summary.api_keys, 4);
        // One live entry per API; the newest owner is replayed last.
        assert_eq!(f.api_keys.len(), 2);
        for api in ["api-a", "api-b"] {
            let key = f.api_keys.lookup(&format!("{api}:key-1-value")).unwrap();
            assert_eq!(key.subscription_id, "sub-2");
        }
    }

    #[tokio::test]
    async fn removal_drops_shared_key_only_on_removed_api() {
        let f = shared_key_fixture();
        f.refresher
            .refresh(&set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap();

        let summary = f
            .refresher
            .unregister_removed_apis(&set(&["api-b"]), &set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap();

        assert_eq!(summary, RefreshSummary { subscriptions: 2, api_keys: 2 });
        assert!(f.subscriptions.contains("api-a:sub-1"));
        assert!(f.subscriptions.contains("api-a:sub-2"));
        assert!(!f.subscriptions.contains("api-b:sub-1"));
        assert!(!f.subscriptions.contains("api-b:sub-2"));
        assert!(f.api_keys.contains("api-a:key-1-value"));
        assert!(!f.api_keys.contains("api-b:key-1-value"));
    }

    #[tokio::test]
    async fn removal_ignores_plain_api_subscriptions() {
        let f = fixture(&["api-a"]);
        f.store
            .put_subscription(&testing::api_record("sub-1", "api-b", "plan-1", 1000))
            .unwrap();
        f.refresher
            .refresh(&set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap();

        f.refresher
            .unregister_removed_apis(&set(&["api-b"]), &set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap();

        assert!(f.subscriptions.contains("api-b:sub-1"));
    }

    #[tokio::test]
    async fn removal_with_empty_input_is_a_noop() {
        let f = fixture(&["api-a"]);
        let summary = f
            .refresher
            .unregister_removed_apis(&set(&[]), &set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap();
        assert_eq!(summary, RefreshSummary::default());
    }

    #[tokio::test]
    async fn query_failure_is_fatal() {
        let store = StateStore::open_in_memory().unwrap();
        let refresher = ApiProductSubscriptionRefresher::new(
            Arc::new(FailingSubscriptionStore),
            Arc::new(store),
            Arc::new(InMemoryRegistry::<Subscription>::new()),
            Arc::new(InMemoryRegistry::<ApiKey>::new()),
            SubscriptionMapper::new(Arc::new(InMemoryRegistry::<ReactableApiProduct>::new())),
        );

        let err = refresher
            .refresh(&set(&["plan-1"]), &set(&["DEFAULT"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SubscriptionSync { ref plans, .. } if plans == &["plan-1"]));
    }
}

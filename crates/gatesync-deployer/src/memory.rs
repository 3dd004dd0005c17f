//! In-process registries.
//!
//! A keyed map per entity kind, safe for concurrent register/unregister of
//! different keys. The gatesyncd binary runs on these; an embedding gateway
//! supplies its own registries through the [`ports`](crate::ports) traits.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::error::RegistryResult;
use crate::model::{ApiKey, Keyed, Subscription};
use crate::ports::{ApiKeyRegistry, Registry, SubscriptionRegistry};

pub type InMemorySubscriptionRegistry = InMemoryRegistry<Subscription>;

pub type InMemoryApiKeyRegistry = InMemoryRegistry<ApiKey>;

/// Keyed in-memory registry.
#[derive(Debug)]
pub struct InMemoryRegistry<E> {
    entries: RwLock<HashMap<String, E>>,
}

impl<E> Default for InMemoryRegistry<E> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<E: Keyed + Clone> InMemoryRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &str) -> Option<E> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn insert(&self, entity: E) {
        let key = entity.registry_key();
        debug!(%key, "registered");
        self.write().insert(key, entity);
    }

    fn remove(&self, key: &str) {
        let existed = self.write().remove(key).is_some();
        debug!(%key, existed, "unregistered");
    }

    fn retain(&self, keep: impl Fn(&E) -> bool) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, e| keep(e));
        before - entries.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, E>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, E>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Keyed + Clone + Send + Sync> Registry<E> for InMemoryRegistry<E> {
    fn register(&self, entity: E) -> RegistryResult<()> {
        self.insert(entity);
        Ok(())
    }

    fn unregister(&self, key: &str) -> RegistryResult<()> {
        self.remove(key);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<E> {
        self.lookup(key)
    }
}

impl SubscriptionRegistry for InMemoryRegistry<Subscription> {
    fn register(&self, subscription: Subscription) -> RegistryResult<()> {
        self.insert(subscription);
        Ok(())
    }

    fn unregister(&self, subscription: &Subscription) -> RegistryResult<()> {
        self.remove(&subscription.registry_key());
        Ok(())
    }

    fn unregister_by_api(&self, api_id: &str) -> RegistryResult<()> {
        let removed = self.retain(|s| s.api_id != api_id);
        debug!(%api_id, removed, "subscriptions unregistered for api");
        Ok(())
    }
}

impl ApiKeyRegistry for InMemoryRegistry<ApiKey> {
    fn register(&self, api_key: ApiKey) -> RegistryResult<()> {
        self.insert(api_key);
        Ok(())
    }

    fn unregister(&self, api_key: &ApiKey) -> RegistryResult<()> {
        self.remove(&api_key.registry_key());
        Ok(())
    }

    fn unregister_by_api(&self, api_id: &str) -> RegistryResult<()> {
        let removed = self.retain(|k| k.api_id != api_id);
        debug!(%api_id, removed, "api keys unregistered for api");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dictionary;
    use crate::testing;

    #[test]
    fn register_is_upsert() {
        let registry: InMemoryRegistry<Dictionary> = InMemoryRegistry::new();
        let mut dictionary = testing::dictionary("dict-1");
        Registry::register(&registry, dictionary.clone()).unwrap();
        dictionary.key = "renamed".to_string();
        Registry::register(&registry, dictionary).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("dict-1").unwrap().key, "renamed");
    }

    #[test]
    fn unregister_missing_is_ok() {
        let registry: InMemoryRegistry<Dictionary> = InMemoryRegistry::new();
        assert!(Registry::unregister(&registry, "missing").is_ok());
        assert!(registry.is_empty());
    }

    #[test]
    fn subscriptions_unregister_by_api() {
        let registry: InMemoryRegistry<Subscription> = InMemoryRegistry::new();
        SubscriptionRegistry::register(&registry, testing::subscription("sub-1", "api-1", "p")).unwrap();
        SubscriptionRegistry::register(&registry, testing::subscription("sub-1", "api-2", "p")).unwrap();
        SubscriptionRegistry::register(&registry, testing::subscription("sub-2", "api-1", "p")).unwrap();
        assert_eq!(registry.len(), 3);

        SubscriptionRegistry::unregister_by_api(&registry, "api-1").unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("api-2:sub-1"));
    }

    #[test]
    fn api_keys_are_scoped_by_api() {
        let registry = InMemoryApiKeyRegistry::new();
        let key = testing::api_key("key-1", "api-1", "sub-1");
        ApiKeyRegistry::register(&registry, key.clone()).unwrap();
        assert!(registry.contains("api-1:key-1-value"));

        ApiKeyRegistry::unregister(&registry, &key).unwrap();
        assert!(registry.is_empty());
    }
}

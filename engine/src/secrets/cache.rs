use crate::secrets::string::SecretString;
use crate::secrets::SecretManager;
use sdk::errors::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Memoizes secret lookups so request paths never touch the keychain.
///
/// Misses are cached too: a key absent at startup stays absent until
/// [`SecretCache::invalidate`] is called.
#[derive(Clone)]
pub struct SecretCache {
    manager: Arc<SecretManager>,
    cache: Arc<RwLock<HashMap<String, Option<SecretString>>>>,
}

impl SecretCache {
    pub fn new(manager: Arc<SecretManager>) -> Self {
        Self {
            manager,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Looks a secret up, consulting the memory cache first
    pub fn lookup(&self, key: &str) -> Result<Option<SecretString>, EngineError> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = cache.get(key) {
                return Ok(entry.clone());
            }
        }

        let found = self.manager.lookup(key)?.map(SecretString::new);

        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(key.to_string(), found.clone());
        }

        Ok(found)
    }

    /// Like [`SecretCache::lookup`] but a missing key is an error
    pub fn require(&self, key: &str) -> Result<SecretString, EngineError> {
        self.lookup(key)?
            .ok_or_else(|| EngineError::SecretMissing(key.to_string()))
    }

    /// Drops a cached entry so the next lookup hits the sources again
    pub fn invalidate(&self, key: &str) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.remove(key);
    }

    /// Which of `keys` currently resolve to a value
    pub fn presence(&self, keys: &[&str]) -> Vec<(String, bool)> {
        keys.iter()
            .map(|key| {
                let present = matches!(self.lookup(key), Ok(Some(_)));
                (key.to_string(), present)
            })
            .collect()
    }

    /// The manager backing this cache
    pub fn manager(&self) -> &SecretManager {
        &self.manager
    }
}

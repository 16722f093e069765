//! Per-sender session storage
//!
//! Drafts and management sessions live in [`SessionStore`]s keyed by sender
//! identity. The in-memory implementation is ephemeral: a restart forgets
//! every conversation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed storage for one kind of per-sender state
#[async_trait]
pub trait SessionStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, sender: &str) -> Option<V>;

    async fn put(&self, sender: &str, value: V);

    /// Remove and return the value for `sender`
    async fn delete(&self, sender: &str) -> Option<V>;

    /// Every stored entry, for the admin surface
    async fn entries(&self) -> Vec<(String, V)>;

    async fn len(&self) -> usize {
        self.entries().await.len()
    }
}

/// Process-local [`SessionStore`]
pub struct InMemorySessionStore<V> {
    inner: Arc<Mutex<HashMap<String, V>>>,
}

impl<V> Default for InMemorySessionStore<V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V> InMemorySessionStore<V> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<V> SessionStore<V> for InMemorySessionStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, sender: &str) -> Option<V> {
        self.inner.lock().await.get(sender).cloned()
    }

    async fn put(&self, sender: &str, value: V) {
        self.inner.lock().await.insert(sender.to_string(), value);
    }

    async fn delete(&self, sender: &str) -> Option<V> {
        self.inner.lock().await.remove(sender)
    }

    async fn entries(&self) -> Vec<(String, V)> {
        let mut entries: Vec<(String, V)> = self
            .inner
            .lock()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Entries above this count trigger pruning of idle locks
const PRUNE_THRESHOLD: usize = 1024;

/// Serializes all handling for one sender.
///
/// A second message from the same sender waits until the first one has
/// finished its read-compute-write cycle on the session stores.
#[derive(Clone, Default)]
pub struct SenderLocks {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SenderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `sender`'s state
    pub async fn acquire(&self, sender: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() > PRUNE_THRESHOLD {
                // Only this map holds a reference to idle locks
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks
                .entry(sender.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store: InMemorySessionStore<u32> = InMemorySessionStore::new();
        assert_eq!(store.get("a").await, None);
        store.put("a", 1).await;
        store.put("a", 2).await;
        store.put("b", 3).await;
        assert_eq!(store.get("a").await, Some(2));
        assert_eq!(store.len().await, 2);
        assert_eq!(store.delete("a").await, Some(2));
        assert_eq!(store.entries().await, vec![("b".to_string(), 3)]);
    }

    #[tokio::test]
    async fn test_sender_locks_serialize_same_sender() {
        let locks = SenderLocks::new();
        let guard = locks.acquire("923001234567").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("923001234567").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // A different sender is not blocked
        let other = tokio::time::timeout(Duration::from_millis(200), locks.acquire("1111")).await;
        assert!(other.is_ok());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}

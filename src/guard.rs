//! Idempotency guard: collapses duplicate concurrent requests for the same
//! logical transition into a single effective state change.
//!
//! The guard keys on the transition identity and serializes concurrent
//! attempts on that key, so exactly one attempt performs the store mutation
//! and the rest observe the resulting state (reporting `created = false` /
//! `removed = false`). This is per-process mutual exclusion, not a
//! distributed lock; the storage layer's unique constraints remain the
//! backstop across processes.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Identity of one logical state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKey {
    Follow { follower_id: Uuid, followee_id: Uuid },
    Unfollow { follower_id: Uuid, followee_id: Uuid },
    Like { post_id: Uuid, account_id: Uuid },
    Unlike { post_id: Uuid, account_id: Uuid },
}

#[derive(Clone, Default)]
pub struct IdempotencyGuard {
    locks: Arc<DashMap<TransitionKey, Arc<Mutex<()>>>>,
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` while holding the per-key lock, then drop the key's entry
    /// once no other task holds a handle to it.
    pub async fn serialize<F, T>(&self, key: TransitionKey, op: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let lock = {
            let entry = self
                .locks
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())));
            entry.value().clone()
        };

        let result = {
            let _held = lock.lock().await;
            op.await
        };

        // Two handles left (the map's and ours) means no one is waiting.
        // remove_if re-checks under the shard lock, so a late arrival that
        // cloned in between keeps the entry alive.
        if Arc::strong_count(&lock) == 2 {
            self.locks.remove_if(&key, |_, v| Arc::strong_count(v) == 2);
        }

        result
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_key_attempts_are_mutually_exclusive() {
        let guard = IdempotencyGuard::new();
        let key = TransitionKey::Like {
            post_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
        };
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let guard = guard.clone();
            let inside = inside.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                guard
                    .serialize(key, async {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entries_are_cleaned_up_when_uncontended() {
        let guard = IdempotencyGuard::new();
        let key = TransitionKey::Follow {
            follower_id: Uuid::new_v4(),
            followee_id: Uuid::new_v4(),
        };
        guard.serialize(key, async {}).await;
        assert_eq!(guard.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_serialize() {
        let guard = IdempotencyGuard::new();
        let a = TransitionKey::Like {
            post_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
        };
        let b = TransitionKey::Like {
            post_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
        };
        let (x, y) = tokio::join!(guard.serialize(a, async { 1 }), guard.serialize(b, async { 2 }));
        assert_eq!((x, y), (1, 2));
    }
}

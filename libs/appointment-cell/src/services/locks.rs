// libs/appointment-cell/src/services/locks.rs
//
// Per-provider scheduling locks. Held across check-then-write so two bookings
// for the same provider cannot both pass the conflict check.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

const PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct ProviderLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

/// Releases every held provider lock on drop.
pub struct ProviderGuard {
    provider_ids: Vec<i64>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ProviderGuard {
    pub fn provider_ids(&self) -> &[i64] {
        &self.provider_ids
    }
}

impl ProviderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the given providers in ascending id order, so overlapping
    /// multi-provider acquisitions cannot deadlock.
    pub async fn acquire(&self, provider_ids: &[i64]) -> ProviderGuard {
        let ordered: Vec<i64> = provider_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();

        let mut guards = Vec::with_capacity(ordered.len());
        for &provider_id in &ordered {
            let lock = self.lock_for(provider_id).await;
            guards.push(lock.lock_owned().await);
        }
        debug!("Acquired scheduling locks for providers {:?}", ordered);

        ProviderGuard {
            provider_ids: ordered,
            _guards: guards,
        }
    }

    async fn lock_for(&self, provider_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        if locks.len() >= PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(locks.entry(provider_id).or_default())
    }
}

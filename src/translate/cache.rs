use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OnceCell, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::Result;
use crate::language::LanguagePair;
use super::{TranslationBackend, TranslationHandle};

struct Slot {
    handle: OnceCell<Arc<dyn TranslationHandle>>,
    inference: Arc<Mutex<()>>,
    last_used: AtomicU64,
}

impl Slot {
    fn new(tick: u64) -> Self {
        Self {
            handle: OnceCell::new(),
            inference: Arc::new(Mutex::new(())),
            last_used: AtomicU64::new(tick),
        }
    }
}

/// Exclusive use of a loaded handle; the pair's inference lock is held until drop
pub struct LeasedHandle {
    handle: Arc<dyn TranslationHandle>,
    _guard: OwnedMutexGuard<()>,
}

impl LeasedHandle {
    pub fn handle(&self) -> &dyn TranslationHandle {
        self.handle.as_ref()
    }
}

/// Shared, bounded cache of translation handles keyed by ordered language pair.
///
/// Each pair is loaded at most once while it stays cached, even when several
/// jobs ask for it at the same time. Past `capacity` the least recently used
/// pair is dropped; leases already handed out keep their handle alive.
pub struct ModelCache {
    backend: Arc<dyn TranslationBackend>,
    capacity: usize,
    slots: Mutex<HashMap<LanguagePair, Arc<Slot>>>,
    clock: AtomicU64,
}

impl ModelCache {
    pub fn new(backend: Arc<dyn TranslationBackend>, capacity: usize) -> Self {
        Self {
            backend,
            capacity: capacity.max(1),
            slots: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    #[cfg(test)]
    async fn contains(&self, pair: &LanguagePair) -> bool {
        self.slots.lock().await.contains_key(pair)
    }

    /// Load (first use) and lock the handle for `pair`
    pub async fn acquire(&self, pair: &LanguagePair) -> Result<LeasedHandle> {
        let slot = self.slot(pair).await;

        let loaded = slot
            .handle
            .get_or_try_init(|| async {
                info!("Loading translation engine for {}", pair);
                self.backend.load(pair).await
            })
            .await;

        let handle = match loaded {
            Ok(handle) => handle.clone(),
            Err(e) => {
                self.forget(pair, &slot).await;
                return Err(e);
            }
        };

        let guard = slot.inference.clone().lock_owned().await;
        Ok(LeasedHandle { handle, _guard: guard })
    }

    /// Release every cached handle
    pub async fn clear(&self) {
        let mut slots = self.slots.lock().await;
        let released = slots.len();
        slots.clear();
        info!("Released {} cached translation engine(s)", released);
    }

    async fn slot(&self, pair: &LanguagePair) -> Arc<Slot> {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let mut slots = self.slots.lock().await;

        if let Some(slot) = slots.get(pair) {
            slot.last_used.store(tick, Ordering::SeqCst);
            return slot.clone();
        }

        while slots.len() >= self.capacity {
            let oldest = slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used.load(Ordering::SeqCst))
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    debug!("Evicting translation engine for {}", key);
                    slots.remove(&key);
                }
                None => break,
            }
        }

        let slot = Arc::new(Slot::new(tick));
        slots.insert(pair.clone(), slot.clone());
        slot
    }

    async fn forget(&self, pair: &LanguagePair, slot: &Arc<Slot>) {
        let mut slots = self.slots.lock().await;
        if slots.get(pair).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(pair);
        }
    }
}

//! The cache service: arena-backed registry with explicit reference counts.
//!
//! One registry mutex guards the whole lookup-or-construct path, so two
//! threads racing `create` for the same key cannot each register a "first"
//! instance, and a handle drop racing a lookup on the same key is serialized
//! against it.

use std::collections::VecDeque;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};

use rustc_hash::FxHashMap;
use tracing::debug;

use super::entity::{CachedEntity, Recipe};
use super::key::CacheKey;

/// Pluggable policy for the bounded pin list of freshly created entities.
///
/// Each pinned slot counts as one strong reference held by the cache itself.
pub trait PinStrategy: Send {
    /// Note a freshly created slot. Returns a slot whose pin should be
    /// released, if the policy is at capacity.
    fn note_insert(&mut self, slot: usize) -> Option<usize>;

    /// Release all pins, returning the slots that were pinned.
    fn drain(&mut self) -> Vec<usize>;
}

/// Keep the last `depth` created entities pinned, oldest evicted first.
#[derive(Debug)]
pub struct FifoPin {
    depth: usize,
    queue: VecDeque<usize>,
}

impl FifoPin {
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            queue: VecDeque::with_capacity(depth),
        }
    }
}

impl PinStrategy for FifoPin {
    fn note_insert(&mut self, slot: usize) -> Option<usize> {
        if self.depth == 0 {
            return Some(slot);
        }
        self.queue.push_back(slot);
        if self.queue.len() > self.depth {
            self.queue.pop_front()
        } else {
            None
        }
    }

    fn drain(&mut self) -> Vec<usize> {
        self.queue.drain(..).collect()
    }
}

struct Slot<R: Recipe> {
    key: CacheKey,
    /// Authoritative reference count: caller handles plus cache pins.
    strong: usize,
    entity: Arc<CachedEntity<R>>,
}

struct Registry<R: Recipe> {
    slots: Vec<Option<Slot<R>>>,
    free: Vec<usize>,
    index: FxHashMap<CacheKey, usize>,
    pins: Box<dyn PinStrategy>,
}

/// Memoizing cache for one entity class.
///
/// An explicit service rather than ambient global state, so lifetime is
/// caller-controlled. Clones are cheap and share the same registry.
pub struct EntityCache<R: Recipe> {
    inner: Arc<Mutex<Registry<R>>>,
}

impl<R: Recipe> Clone for EntityCache<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Recipe> EntityCache<R> {
    /// Create a cache whose pin list keeps the last `pin_depth` created
    /// entities strongly referenced.
    pub fn new(pin_depth: usize) -> Self {
        Self::with_strategy(Box::new(FifoPin::new(pin_depth)))
    }

    pub fn with_strategy(pins: Box<dyn PinStrategy>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                slots: Vec::new(),
                free: Vec::new(),
                index: FxHashMap::default(),
                pins,
            })),
        }
    }

    /// Return a handle to the entity with these construction inputs.
    ///
    /// Cache hit: the existing instance's refcount is bumped and a handle to
    /// it returned; nothing is constructed or built. Cache miss: a fresh
    /// entity is registered, pinned, and returned. Never fails; failures
    /// happen only inside the lazily invoked build.
    pub fn create(&self, recipe: R) -> EntityHandle<R> {
        let key = CacheKey::of(&recipe);
        let mut reg = self.lock_registry();

        if let Some(&slot_idx) = reg.index.get(&key) {
            let slot = reg.slots[slot_idx]
                .as_mut()
                .expect("indexed slot must be occupied");
            slot.strong += 1;
            let entity = Arc::clone(&slot.entity);
            debug!(
                class = recipe.class_name(),
                key = key.value(),
                "restored entity from cache"
            );
            return EntityHandle {
                cache: self.clone(),
                slot: slot_idx,
                entity,
            };
        }

        let entity = Arc::new(CachedEntity::new(key, recipe));
        // strong = 2: one for the returned handle, one for the pin below.
        let slot = Slot {
            key,
            strong: 2,
            entity: Arc::clone(&entity),
        };
        let slot_idx = match reg.free.pop() {
            Some(idx) => {
                reg.slots[idx] = Some(slot);
                idx
            }
            None => {
                reg.slots.push(Some(slot));
                reg.slots.len() - 1
            }
        };
        reg.index.insert(key, slot_idx);
        debug!(
            key = key.value(),
            cache_size = reg.index.len(),
            "added entity to cache"
        );

        if let Some(victim) = reg.pins.note_insert(slot_idx) {
            Self::release_slot(&mut reg, victim);
        }

        EntityHandle {
            cache: self.clone(),
            slot: slot_idx,
            entity,
        }
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.lock_registry().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live entity exists for this key.
    pub fn contains(&self, key: CacheKey) -> bool {
        self.lock_registry().index.contains_key(&key)
    }

    /// Release every pin, evicting entities with no outside handle.
    pub fn clear_pins(&self) {
        let mut reg = self.lock_registry();
        for slot in reg.pins.drain() {
            Self::release_slot(&mut reg, slot);
        }
    }

    fn release_slot(reg: &mut Registry<R>, slot_idx: usize) {
        let remaining = {
            let slot = reg.slots[slot_idx]
                .as_mut()
                .expect("released slot must be occupied");
            slot.strong -= 1;
            slot.strong
        };
        if remaining == 0 {
            let slot = reg.slots[slot_idx].take().expect("slot checked above");
            reg.free.push(slot_idx);
            reg.index.remove(&slot.key);
            debug!(
                key = slot.key.value(),
                cache_size = reg.index.len(),
                "last reference released, evicting entity"
            );
        }
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry<R>> {
        // Recover from poisoning: registry bookkeeping stays consistent
        // because every mutation completes under a single lock scope.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<R: Recipe> fmt::Debug for EntityCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCache")
            .field("len", &self.len())
            .finish()
    }
}

/// Strong handle to a cached entity.
///
/// Cloning increments the entity's explicit refcount; dropping decrements it
/// and erases the registry entry when it reaches zero. Dereferences to the
/// entity without taking the registry lock.
pub struct EntityHandle<R: Recipe> {
    cache: EntityCache<R>,
    slot: usize,
    entity: Arc<CachedEntity<R>>,
}

impl<R: Recipe> EntityHandle<R> {
    /// Whether two handles refer to the same live instance.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.entity, &b.entity)
    }
}

impl<R: Recipe> Deref for EntityHandle<R> {
    type Target = CachedEntity<R>;

    fn deref(&self) -> &Self::Target {
        &self.entity
    }
}

impl<R: Recipe> Clone for EntityHandle<R> {
    fn clone(&self) -> Self {
        {
            let mut reg = self.cache.lock_registry();
            reg.slots[self.slot]
                .as_mut()
                .expect("cloned handle's slot must be occupied")
                .strong += 1;
        }
        Self {
            cache: self.cache.clone(),
            slot: self.slot,
            entity: Arc::clone(&self.entity),
        }
    }
}

impl<R: Recipe> Drop for EntityHandle<R> {
    fn drop(&mut self) {
        let mut reg = self.cache.lock_registry();
        EntityCache::release_slot(&mut reg, self.slot);
    }
}

impl<R: Recipe> fmt::Debug for EntityHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHandle")
            .field("key", &self.entity.key())
            .field("slot", &self.slot)
            .finish()
    }
}

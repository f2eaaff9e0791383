//! Memoization cache for expensive, hashable, lazily-built entities.
//!
//! Geometry and derived artifacts are identified by a structural hash of
//! their construction inputs ([`CacheKey`]). The cache service
//! ([`EntityCache`]) guarantees at most one live instance per key: a
//! `create` call for inputs that already have a live instance returns a new
//! handle to it without constructing or building anything. Entities are
//! evicted when their explicit reference count reaches zero; a bounded pin
//! list keeps the N most recently created instances alive to bridge the gap
//! between construction and the caller acquiring its own handle.
//!
//! # Example
//!
//! ```ignore
//! use flowstudy_core::cache::{EntityCache, Recipe};
//!
//! let cache = EntityCache::<WingSurface>::new(4); // pin depth 4
//! let a = cache.create(WingSurface { span: 10.0, chord: 1.2 });
//! let b = cache.create(WingSurface { span: 10.0, chord: 1.2 });
//! assert!(EntityHandle::ptr_eq(&a, &b));          // same live instance
//! let area = a.output(|s| s.area)?;               // builds exactly once
//! ```

mod entity;
mod key;
mod memo;
mod registry;

pub use entity::{BuildState, CachedEntity, Recipe};
pub use key::{CacheKey, KeyHasher};
pub use memo::MemoCache;
pub use registry::{EntityCache, EntityHandle, FifoPin, PinStrategy};

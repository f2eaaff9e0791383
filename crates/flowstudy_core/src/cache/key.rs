//! Content-addressed identity for cacheable entities.

use std::hash::Hasher;

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use super::entity::Recipe;

/// Deterministic structural hash identifying an entity's construction inputs.
///
/// Equal class tag + equal ordered input sequence yields an equal key; the
/// underlying hasher is seed-free, so keys are stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Compute the key for a recipe: class tag first, then the inputs in
    /// the order the recipe writes them.
    pub fn of<R: Recipe>(recipe: &R) -> Self {
        let mut hasher = KeyHasher::new();
        hasher.write_str(recipe.class_name());
        recipe.hash_inputs(&mut hasher);
        hasher.finish_key()
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Incremental hasher recipes feed their construction inputs into.
///
/// Floats are hashed by bit pattern, so `-0.0` and `0.0` are distinct keys;
/// strings are terminated to keep adjacent inputs from gluing together.
#[derive(Default)]
pub struct KeyHasher {
    inner: FxHasher,
}

impl KeyHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u64(&mut self, v: u64) {
        self.inner.write_u64(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.inner.write_i64(v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.inner.write_u64(v.to_bits());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.inner.write_u8(u8::from(v));
    }

    pub fn write_str(&mut self, s: &str) {
        self.inner.write(s.as_bytes());
        self.inner.write_u8(0xff);
    }

    #[must_use]
    pub fn finish_key(self) -> CacheKey {
        CacheKey(self.inner.finish())
    }
}

//! Lazily-built cacheable entities.

use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::error::BuildError;

use super::key::{CacheKey, KeyHasher};

/// Construction inputs of a cacheable entity.
///
/// The recipe owns the immutable inputs, knows how to hash them into the
/// entity's structural identity, and how to build the (possibly expensive)
/// output. Building is deferred until the first output read.
pub trait Recipe: Send + Sync + 'static {
    type Output: Send;

    /// Class tag mixed into the key so different entity classes with equal
    /// inputs do not collide.
    fn class_name(&self) -> &'static str;

    /// Write the construction inputs, in a fixed order, into the hasher.
    fn hash_inputs(&self, hasher: &mut KeyHasher);

    /// Construct the output. Invoked at most once per entity.
    fn build(&self) -> Result<Self::Output, BuildError>;
}

/// Tagged lazy-build state.
///
/// `Failed` is sticky: a later read returns the recorded error without
/// re-running the build.
#[derive(Debug)]
pub enum BuildState<T> {
    Unbuilt,
    Built(T),
    Failed(BuildError),
}

/// A cache-managed entity: immutable recipe, cached key, lazily built output.
pub struct CachedEntity<R: Recipe> {
    key: CacheKey,
    recipe: R,
    state: Mutex<BuildState<R::Output>>,
}

impl<R: Recipe> CachedEntity<R> {
    pub(super) fn new(key: CacheKey, recipe: R) -> Self {
        Self {
            key,
            recipe,
            state: Mutex::new(BuildState::Unbuilt),
        }
    }

    #[must_use]
    pub fn key(&self) -> CacheKey {
        self.key
    }

    #[must_use]
    pub fn recipe(&self) -> &R {
        &self.recipe
    }

    /// Whether the build has run and succeeded.
    #[must_use]
    pub fn is_built(&self) -> bool {
        matches!(*self.lock_state(), BuildState::Built(_))
    }

    /// Read a field of the built output.
    ///
    /// The first call runs `build` exactly once; concurrent callers block on
    /// the state lock until it finishes. After a failed build every call
    /// returns the recorded error.
    pub fn output<F, T>(&self, read: F) -> Result<T, BuildError>
    where
        F: FnOnce(&R::Output) -> T,
    {
        let mut state = self.lock_state();
        if matches!(*state, BuildState::Unbuilt) {
            match self.recipe.build() {
                Ok(out) => *state = BuildState::Built(out),
                Err(e) => {
                    warn!(class = self.recipe.class_name(), key = self.key.value(), error = %e, "entity build failed");
                    *state = BuildState::Failed(e);
                }
            }
        }
        match &*state {
            BuildState::Built(out) => Ok(read(out)),
            BuildState::Failed(e) => Err(e.clone()),
            BuildState::Unbuilt => unreachable!("build state resolved above"),
        }
    }

    /// Peek at the output without triggering a build.
    pub fn try_built<F, T>(&self, read: F) -> Option<T>
    where
        F: FnOnce(&R::Output) -> T,
    {
        match &*self.lock_state() {
            BuildState::Built(out) => Some(read(out)),
            _ => None,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BuildState<R::Output>> {
        // A panicking build poisons the mutex; recover so later readers see
        // the state as it was (Unbuilt) instead of panicking themselves.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

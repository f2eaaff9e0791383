//! Memoization for expensive free functions, with a byte-size budget.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use tracing::debug;

struct MemoEntry<R> {
    arg_hash: u64,
    bytes: usize,
    value: R,
}

/// Caches results of a pure function by argument hash.
///
/// Entries are charged an approximate byte size by the sizing function; when
/// an insert would exceed the budget, the oldest entries are dropped first.
/// Single-threaded by design; wrap in a mutex to share.
pub struct MemoCache<A, R> {
    compute: Box<dyn Fn(&A) -> R + Send>,
    size_of: Box<dyn Fn(&R) -> usize + Send>,
    entries: VecDeque<MemoEntry<R>>,
    max_bytes: usize,
}

impl<A: Hash, R: Clone> MemoCache<A, R> {
    /// Cache with a byte budget, charging each entry `size_of::<R>()`.
    pub fn new(max_bytes: usize, compute: impl Fn(&A) -> R + Send + 'static) -> Self {
        Self::with_sizer(max_bytes, compute, |_| std::mem::size_of::<R>())
    }

    /// Cache with a caller-supplied sizing function for heap-heavy results.
    pub fn with_sizer(
        max_bytes: usize,
        compute: impl Fn(&A) -> R + Send + 'static,
        size_of: impl Fn(&R) -> usize + Send + 'static,
    ) -> Self {
        Self {
            compute: Box::new(compute),
            size_of: Box::new(size_of),
            entries: VecDeque::new(),
            max_bytes,
        }
    }

    /// Return the cached result for these arguments, computing it on a miss.
    pub fn call(&mut self, arg: &A) -> R {
        let mut hasher = FxHasher::default();
        arg.hash(&mut hasher);
        let arg_hash = hasher.finish();

        if let Some(entry) = self.entries.iter().find(|e| e.arg_hash == arg_hash) {
            return entry.value.clone();
        }

        let value = (self.compute)(arg);
        let bytes = (self.size_of)(&value);
        while !self.entries.is_empty() && self.total_bytes() + bytes > self.max_bytes {
            let dropped = self.entries.pop_front();
            if let Some(d) = dropped {
                debug!(bytes = d.bytes, "memo cache over budget, dropping oldest entry");
            }
        }
        self.entries.push_back(MemoEntry {
            arg_hash,
            bytes,
            value: value.clone(),
        });
        value
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.bytes).sum()
    }
}

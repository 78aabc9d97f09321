use indexmap::IndexMap;
use log::warn;
use ndarray::Array2;
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strum_macros::Display;

/// What happens when a new matrix is computed while the cache is full
#[derive(Copy, Clone, Debug, PartialEq, Eq, SmartDefault, Display, Serialize, Deserialize)]
pub enum CachePolicy {
  /// Keep the entries inserted first and stop caching new ones
  #[default]
  KeepFirst,

  /// Drop the oldest entry to make room for the new one
  EvictOldest,
}

#[derive(Clone, Debug, PartialEq, Eq, SmartDefault, Serialize, Deserialize)]
pub struct CacheOptions {
  /// Maximum number of matrices kept per model. Zero disables caching.
  #[default = 1000]
  pub capacity: usize,

  pub policy: CachePolicy,
}

/// Bounded map from the exact time value to the transition matrix computed for it.
///
/// Keys are compared bit-exactly, so `0.1` and `0.1 + 1e-17` are different entries unless they round to the same
/// float. Values are immutable once inserted and are handed out as shared pointers.
#[derive(Debug)]
pub struct ProbabilityCache {
  entries: RwLock<IndexMap<OrderedFloat<f64>, Arc<Array2<f64>>>>,
  options: CacheOptions,
  warned_full: AtomicBool,
}

impl ProbabilityCache {
  pub fn new(options: CacheOptions) -> Self {
    Self {
      entries: RwLock::new(IndexMap::with_capacity(options.capacity.min(1024))),
      options,
      warned_full: AtomicBool::new(false),
    }
  }

  pub fn get(&self, t: f64) -> Option<Arc<Array2<f64>>> {
    self.entries.read().get(&OrderedFloat(t)).cloned()
  }

  /// Returns the cached matrix for `t`, or computes it with `compute` and caches the result if the policy allows.
  ///
  /// The computation runs without holding any lock. When several threads miss on the same `t` concurrently, each of
  /// them computes the matrix, and the first one to insert wins. All of them receive the winning entry.
  pub fn get_or_insert_with(&self, t: f64, compute: impl FnOnce() -> Array2<f64>) -> Arc<Array2<f64>> {
    if let Some(found) = self.get(t) {
      return found;
    }
    let computed = Arc::new(compute());
    self.insert(t, computed)
  }

  fn insert(&self, t: f64, value: Arc<Array2<f64>>) -> Arc<Array2<f64>> {
    if self.options.capacity == 0 {
      return value;
    }

    let mut entries = self.entries.write();
    if let Some(existing) = entries.get(&OrderedFloat(t)) {
      return Arc::clone(existing);
    }

    if entries.len() >= self.options.capacity {
      self.warn_full_once();
      match self.options.policy {
        CachePolicy::KeepFirst => return value,
        CachePolicy::EvictOldest => {
          entries.shift_remove_index(0);
        }
      }
    }

    entries.insert(OrderedFloat(t), Arc::clone(&value));
    value
  }

  fn warn_full_once(&self) {
    if !self.warned_full.swap(true, Ordering::Relaxed) {
      warn!(
        "Transition matrix cache reached its capacity of {} entries. Policy '{}' is in effect from now on.",
        self.options.capacity, self.options.policy
      );
    }
  }

  pub fn len(&self) -> usize {
    self.entries.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.read().is_empty()
  }

  pub fn contains(&self, t: f64) -> bool {
    self.entries.read().contains_key(&OrderedFloat(t))
  }

  pub fn clear(&self) {
    self.entries.write().clear();
    self.warned_full.store(false, Ordering::Relaxed);
  }
}

impl Default for ProbabilityCache {
  fn default() -> Self {
    Self::new(CacheOptions::default())
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use pretty_assertions::assert_eq;
  use rayon::prelude::*;
  use rstest::rstest;
  use std::sync::atomic::AtomicUsize;

  fn filled(t: f64) -> Array2<f64> {
    Array2::from_elem((2, 2), t)
  }

  #[rstest]
  fn computes_once_per_key() {
    let cache = ProbabilityCache::default();
    let calls = AtomicUsize::new(0);
    for _ in 0..5 {
      let m = cache.get_or_insert_with(0.5, || {
        calls.fetch_add(1, Ordering::Relaxed);
        filled(0.5)
      });
      assert_eq!(*m, filled(0.5));
    }
    assert_eq!(calls.load(Ordering::Relaxed), 1);
    assert_eq!(cache.len(), 1);
  }

  #[rstest]
  fn returns_shared_entry() {
    let cache = ProbabilityCache::default();
    let a = cache.get_or_insert_with(1.0, || filled(1.0));
    let b = cache.get_or_insert_with(1.0, || filled(42.0));
    assert!(Arc::ptr_eq(&a, &b));
  }

  #[rstest]
  fn uses_exact_keys() {
    let cache = ProbabilityCache::default();
    cache.get_or_insert_with(0.1, || filled(0.1));
    assert!(cache.contains(0.1));
    assert!(!cache.contains(0.1 + 1e-15));
  }

  #[rstest]
  fn keeps_first_entries_when_full() {
    let cache = ProbabilityCache::new(CacheOptions {
      capacity: 2,
      policy: CachePolicy::KeepFirst,
    });
    for t in [1.0_f64, 2.0, 3.0] {
      let m = cache.get_or_insert_with(t, || filled(t));
      assert_eq!(*m, filled(t));
    }
    assert_eq!(cache.len(), 2);
    assert!(cache.contains(1.0));
    assert!(cache.contains(2.0));
    assert!(!cache.contains(3.0));
  }

  #[rstest]
  fn evicts_oldest_entry_when_full() {
    let cache = ProbabilityCache::new(CacheOptions {
      capacity: 2,
      policy: CachePolicy::EvictOldest,
    });
    for t in [1.0_f64, 2.0, 3.0] {
      cache.get_or_insert_with(t, || filled(t));
    }
    assert_eq!(cache.len(), 2);
    assert!(!cache.contains(1.0));
    assert!(cache.contains(2.0));
    assert!(cache.contains(3.0));
  }

  #[rstest]
  fn disabled_with_zero_capacity() {
    let cache = ProbabilityCache::new(CacheOptions {
      capacity: 0,
      ..CacheOptions::default()
    });
    let m = cache.get_or_insert_with(1.0, || filled(1.0));
    assert_eq!(*m, filled(1.0));
    assert!(cache.is_empty());
  }

  #[rstest]
  fn clears() {
    let cache = ProbabilityCache::default();
    cache.get_or_insert_with(1.0, || filled(1.0));
    cache.clear();
    assert!(cache.is_empty());
  }

  #[rstest]
  fn never_holds_duplicate_keys_under_contention() {
    let cache = ProbabilityCache::default();
    let results: Vec<_> = (0..256)
      .into_par_iter()
      .map(|i| {
        let t = f64::from(i % 8);
        cache.get_or_insert_with(t, || filled(t))
      })
      .collect();

    assert_eq!(cache.len(), 8);
    for (i, m) in results.iter().enumerate() {
      assert_eq!(**m, filled(f64::from(i as u32 % 8)));
    }
  }
}

//! Measured row heights, keyed by item index.
//!
//! The cache only ever holds heights that were actually measured. Unmeasured
//! rows are simply absent; the estimator decides what they fall back to.

use hashbrown::HashMap;

use crate::geometry::is_valid_height;

/// Index -> last measured pixel height.
#[derive(Debug, Default, Clone)]
pub struct HeightCache {
    entries: HashMap<usize, f32>,
    /// Running sum of all entries so the mean stays O(1).
    sum: f64,
}

impl HeightCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from persisted `(index, height)` pairs.
    /// Invalid heights are skipped; later duplicates win.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, f32)>,
    {
        let mut cache = Self::new();
        for (index, height) in entries {
            cache.set(index, height);
        }
        cache
    }

    /// Measured height for `index`, if any.
    pub fn get(&self, index: usize) -> Option<f32> {
        self.entries.get(&index).copied()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    /// Store a measurement, overwriting any earlier one for the same index.
    ///
    /// Returns the previous height. Heights that are not positive and finite
    /// are rejected and leave the cache untouched (returns the current value).
    pub fn set(&mut self, index: usize, height: f32) -> Option<f32> {
        if !is_valid_height(height) {
            return self.get(index);
        }

        let previous = self.entries.insert(index, height);
        if let Some(old) = previous {
            self.sum -= old as f64;
        }
        self.sum += height as f64;
        previous
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.sum = 0.0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Arithmetic mean of all measured heights, `None` when empty.
    pub fn mean(&self) -> Option<f32> {
        if self.entries.is_empty() {
            None
        } else {
            Some((self.sum / self.entries.len() as f64) as f32)
        }
    }
}

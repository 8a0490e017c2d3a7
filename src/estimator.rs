//! Size estimation for rows that have not been measured yet.
//!
//! Two values live here:
//!
//! - the **default size**: natural size of the first item measured for the
//!   current content. Sibling UI (fit-to-width, full-size window commands)
//!   reads it through a [`DefaultSizeHandle`].
//! - the **estimated height**: a snapshot of the cache mean, used as the
//!   height of every unmeasured row. It is only recomputed at well-defined
//!   points so that cumulative offsets of unmeasured rows stay stable between
//!   those points.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::geometry::ItemSize;
use crate::height_cache::HeightCache;

/// Height reported for unmeasured rows while the cache is empty.
pub const SENTINEL_HEIGHT: f32 = 1.0;

/// Cloneable handle to the process-visible default item size.
#[derive(Debug, Clone, Default)]
pub struct DefaultSizeHandle(Arc<RwLock<ItemSize>>);

impl DefaultSizeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ItemSize {
        *self.0.read()
    }

    pub(crate) fn set(&self, size: ItemSize) {
        *self.0.write() = size;
    }

    pub(crate) fn reset(&self) {
        self.set(ItemSize::UNKNOWN);
    }
}

/// What a single measurement did to the estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementEffect {
    /// Height previously cached for the measured index.
    pub previous: Option<f32>,
    /// Whether the estimated height snapshot changed.
    pub estimate_changed: bool,
}

#[derive(Debug)]
pub struct SizeEstimator {
    default_size: DefaultSizeHandle,
    estimated_height: f32,
}

impl SizeEstimator {
    /// Create an estimator whose snapshot reflects `heights` as loaded.
    pub fn new(default_size: DefaultSizeHandle, heights: &HeightCache) -> Self {
        Self {
            default_size,
            estimated_height: Self::average_height(heights),
        }
    }

    pub fn default_size_handle(&self) -> DefaultSizeHandle {
        self.default_size.clone()
    }

    pub fn estimated_default_size(&self) -> ItemSize {
        self.default_size.get()
    }

    /// Current estimate for unmeasured rows.
    pub fn estimated_height(&self) -> f32 {
        self.estimated_height
    }

    /// Mean of all cached heights right now, [`SENTINEL_HEIGHT`] if empty.
    pub fn average_height(heights: &HeightCache) -> f32 {
        heights.mean().unwrap_or(SENTINEL_HEIGHT)
    }

    /// Refresh the snapshot from the cache. Returns true if it changed.
    pub fn update_estimated_height(&mut self, heights: &HeightCache) -> bool {
        let next = Self::average_height(heights);
        if next == self.estimated_height {
            return false;
        }
        debug!(
            "Estimated row height {} -> {} ({} measured rows)",
            self.estimated_height,
            next,
            heights.len()
        );
        self.estimated_height = next;
        true
    }

    /// Store `row_height` for `index` and update the default size.
    ///
    /// The default size is taken from the first measurement with a usable
    /// natural size. The snapshot is recomputed when the default size is still
    /// unknown and this is the first entry in the cache; later measurements
    /// leave it alone.
    pub fn record_measurement(
        &mut self,
        heights: &mut HeightCache,
        index: usize,
        natural_size: ItemSize,
        row_height: f32,
    ) -> MeasurementEffect {
        let was_empty = heights.is_empty();
        let previous = heights.set(index, row_height);

        let default_unknown = self.default_size.get().is_unknown();
        if default_unknown && !natural_size.is_unknown() {
            self.default_size.set(natural_size);
            debug!(
                "Default item size set to {}x{} from row {}",
                natural_size.width, natural_size.height, index
            );
        }

        let estimate_changed = default_unknown && was_empty && self.update_estimated_height(heights);

        MeasurementEffect {
            previous,
            estimate_changed,
        }
    }

    /// Row heights scale with viewport width, so a resize makes the previous
    /// snapshot stale.
    pub fn on_viewport_resize(&mut self, heights: &HeightCache) -> bool {
        self.update_estimated_height(heights)
    }

    /// Back to "nothing measured": unknown default size and sentinel estimate.
    pub fn reset(&mut self) {
        self.default_size.reset();
        self.estimated_height = SENTINEL_HEIGHT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator(heights: &HeightCache) -> SizeEstimator {
        SizeEstimator::new(DefaultSizeHandle::new(), heights)
    }

    #[test]
    fn empty_cache_yields_sentinel() {
        let heights = HeightCache::new();
        let est = estimator(&heights);
        assert_eq!(est.estimated_height(), SENTINEL_HEIGHT);
        assert_eq!(SizeEstimator::average_height(&heights), 1.0);
        assert!(est.estimated_default_size().is_unknown());
    }

    #[test]
    fn snapshot_starts_from_loaded_cache() {
        let heights = HeightCache::from_entries([(0, 200.0), (1, 400.0)]);
        let est = estimator(&heights);
        assert_eq!(est.estimated_height(), 300.0);
    }

    #[test]
    fn first_measurement_sets_default_size_and_estimate() {
        let mut heights = HeightCache::new();
        let mut est = estimator(&heights);

        let effect = est.record_measurement(&mut heights, 4, ItemSize::new(800.0, 1200.0), 600.0);
        assert_eq!(effect.previous, None);
        assert!(effect.estimate_changed);
        assert_eq!(est.estimated_height(), 600.0);
        assert_eq!(est.estimated_default_size(), ItemSize::new(800.0, 1200.0));
    }

    #[test]
    fn later_measurements_do_not_move_the_snapshot() {
        let mut heights = HeightCache::new();
        let mut est = estimator(&heights);
        est.record_measurement(&mut heights, 0, ItemSize::new(800.0, 1200.0), 600.0);

        let effect = est.record_measurement(&mut heights, 1, ItemSize::new(400.0, 400.0), 200.0);
        assert!(!effect.estimate_changed);
        assert_eq!(est.estimated_height(), 600.0);
        // The default size was already known and stays put.
        assert_eq!(est.estimated_default_size(), ItemSize::new(800.0, 1200.0));
        // The live average does track the cache.
        assert_eq!(SizeEstimator::average_height(&heights), 400.0);
    }

    #[test]
    fn no_recompute_when_cache_already_had_rows() {
        // Rows restored from a previous session, default size reset by new content.
        let mut heights = HeightCache::from_entries([(0, 100.0)]);
        let mut est = estimator(&heights);
        let effect = est.record_measurement(&mut heights, 1, ItemSize::new(500.0, 700.0), 300.0);

        assert!(!effect.estimate_changed);
        assert_eq!(est.estimated_height(), 100.0);
        assert_eq!(est.estimated_default_size(), ItemSize::new(500.0, 700.0));
    }

    #[test]
    fn first_write_sets_estimate_even_without_natural_size() {
        // A 1px wide divider strip reports an unusable natural size.
        let mut heights = HeightCache::new();
        let mut est = estimator(&heights);

        let effect = est.record_measurement(&mut heights, 0, ItemSize::new(1.0, 40.0), 400.0);
        assert!(effect.estimate_changed);
        assert_eq!(est.estimated_height(), 400.0);
        assert!(est.estimated_default_size().is_unknown());

        let effect = est.record_measurement(&mut heights, 1, ItemSize::new(800.0, 400.0), 200.0);
        assert!(!effect.estimate_changed);
        assert_eq!(est.estimated_height(), 400.0);
        assert_eq!(est.estimated_default_size(), ItemSize::new(800.0, 400.0));
    }

    #[test]
    fn resize_recomputes_mean() {
        let mut heights = HeightCache::new();
        let mut est = estimator(&heights);
        est.record_measurement(&mut heights, 0, ItemSize::new(800.0, 1200.0), 600.0);
        est.record_measurement(&mut heights, 1, ItemSize::new(800.0, 1200.0), 200.0);

        assert!(est.on_viewport_resize(&heights));
        assert_eq!(est.estimated_height(), 400.0);
        assert!(!est.on_viewport_resize(&heights));
    }

    #[test]
    fn reset_restores_sentinels_through_shared_handle() {
        let mut heights = HeightCache::new();
        let mut est = estimator(&heights);
        let handle = est.default_size_handle();
        est.record_measurement(&mut heights, 0, ItemSize::new(800.0, 1200.0), 600.0);
        assert_eq!(handle.get(), ItemSize::new(800.0, 1200.0));

        est.reset();
        assert!(handle.get().is_unknown());
        assert_eq!(est.estimated_height(), SENTINEL_HEIGHT);
    }
}

//! A viewer session: one scrolling list of measured items plus its
//! persisted state.
//!
//! The session owns the height cache, the estimator, the window controller,
//! the position tracker and the convergent scroller, and wires them together.
//! Content shells talk only to this type:
//!
//! - after loading content they call [`ViewerSession::content_loaded`],
//! - every frame they call [`ViewerSession::tick`] and [`ViewerSession::render`],
//! - whenever an item finishes loading they report it through
//!   [`ViewerSession::set_row_height`] (or [`ViewerSession::measure`]).
//!
//! Time is passed in by the host so the retry loop follows the host's frame
//! clock; [`ViewerSession::next_wakeup`] tells it when to repaint next.

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::content::{MeasuredItem, SessionSource};
use crate::estimator::{DefaultSizeHandle, SizeEstimator};
use crate::geometry::{is_valid_height, ItemSize, ViewportSize};
use crate::height_cache::HeightCache;
use crate::position::{PositionTracker, PositionUpdate};
use crate::scroller::{ConvergentScroller, Observation, ScrollStatus};
use crate::store::{MemoryStore, RedbStore, SessionStore, StoreError};
use crate::window::{RenderWindow, WindowController};

pub struct ViewerSession {
    store: Box<dyn SessionStore>,
    heights: HeightCache,
    estimator: SizeEstimator,
    window: WindowController,
    tracker: PositionTracker,
    scroller: ConvergentScroller,
    source: Option<SessionSource>,
    /// Index `scroll_to_pos` goes to: the restored position, or 0 for new content.
    initial_position: usize,
    initial_delay: Duration,
}

impl ViewerSession {
    /// Build a session on top of `store`, picking up whatever it holds.
    ///
    /// Load failures are logged and treated as an empty store.
    pub fn open(store: Box<dyn SessionStore>, config: &Config) -> Self {
        let heights = match store.row_heights() {
            Ok(entries) => HeightCache::from_entries(entries),
            Err(e) => {
                warn!("Failed to load row heights: {}", e);
                HeightCache::new()
            }
        };
        let position = store.position().unwrap_or_else(|e| {
            warn!("Failed to load position: {}", e);
            None
        });
        let source = store.source().unwrap_or_else(|e| {
            warn!("Failed to load session source: {}", e);
            None
        });

        let estimator = SizeEstimator::new(DefaultSizeHandle::new(), &heights);
        let window = WindowController::new(config.overscan, estimator.estimated_height());

        info!(
            "Session opened: {} measured rows, position {:?}, source {:?}",
            heights.len(),
            position,
            source.as_ref().map(|s| &s.path)
        );

        Self {
            store,
            heights,
            estimator,
            window,
            tracker: PositionTracker::with_position(position),
            scroller: ConvergentScroller::new(config.scroll_policy()),
            source,
            initial_position: position.unwrap_or(0),
            initial_delay: config.initial_scroll_delay(),
        }
    }

    /// Open the session configured in `config`: the on-disk store, or a
    /// throwaway in-memory one when persistence is off.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let store: Box<dyn SessionStore> = if config.persist_session {
            Box::new(RedbStore::open(config.resolved_store_path()?)?)
        } else {
            Box::new(MemoryStore::new())
        };
        Ok(Self::open(store, config))
    }

    // ---- estimation -------------------------------------------------------

    /// Height used for rows that have not been measured yet.
    pub fn estimated_height(&self) -> f32 {
        self.estimator.estimated_height()
    }

    /// Recompute the estimate from the cache now.
    pub fn update_estimated_height(&mut self) {
        if self.estimator.update_estimated_height(&self.heights) {
            self.window
                .set_estimated_item_size(self.estimator.estimated_height());
        }
    }

    /// Measured height of `index`, or the estimate.
    pub fn row_height(&self, index: usize) -> f32 {
        self.heights
            .get(index)
            .unwrap_or_else(|| self.estimator.estimated_height())
    }

    pub fn measured_rows(&self) -> usize {
        self.heights.len()
    }

    pub fn default_size(&self) -> ItemSize {
        self.estimator.estimated_default_size()
    }

    /// Shared default size for sibling UI such as "fit to width".
    pub fn default_size_handle(&self) -> DefaultSizeHandle {
        self.estimator.default_size_handle()
    }

    // ---- measurement ------------------------------------------------------

    /// Report a rendered item.
    pub fn set_row_height<M: MeasuredItem + ?Sized>(&mut self, index: usize, item: &M) -> bool {
        self.measure(index, item.natural_size(), item.row_height())
    }

    /// Record the measured height of `index`. Returns true when the layout
    /// changed.
    ///
    /// Unusable heights and indices outside the loaded content are ignored;
    /// the row keeps its fallback height.
    pub fn measure(&mut self, index: usize, natural_size: ItemSize, row_height: f32) -> bool {
        if index >= self.window.item_count() {
            debug!(
                "Ignoring measurement of row {} ({} items loaded)",
                index,
                self.window.item_count()
            );
            return false;
        }
        if !is_valid_height(row_height) {
            debug!("Ignoring height {} for row {}", row_height, index);
            return false;
        }

        let changed = self.heights.get(index) != Some(row_height);
        if changed {
            if let Err(e) = self.store.put_row_height(index, row_height) {
                warn!("Failed to persist height of row {}: {}", index, e);
            }
        }

        let effect = self
            .estimator
            .record_measurement(&mut self.heights, index, natural_size, row_height);

        if effect.estimate_changed {
            self.window
                .set_estimated_item_size(self.estimator.estimated_height());
        }
        if changed {
            self.window.reset_after_index(index);
        }
        changed || effect.estimate_changed
    }

    // ---- content lifecycle ------------------------------------------------

    /// Start over with new content: heights, default size and position are
    /// forgotten together, the source is remembered for the next restore.
    pub fn open_content(&mut self, source: SessionSource) {
        info!("Opening {} ({})", source.path.display(), source.kind.as_str());
        self.reset_layout();
        if let Err(e) = self.store.reset_layout() {
            warn!("Failed to reset persisted layout: {}", e);
        }
        if let Err(e) = self.store.put_source(&source) {
            warn!("Failed to persist session source: {}", e);
        }
        self.source = Some(source);
        self.initial_position = 0;
    }

    /// Prepare to reopen the last session's content at its last position.
    /// Measured heights are kept. Returns the source to reopen.
    pub fn restore(&mut self) -> Option<SessionSource> {
        let source = match self.store.source() {
            Ok(Some(source)) => source,
            Ok(None) => {
                info!("No previous session to restore");
                return None;
            }
            Err(e) => {
                warn!("Failed to read session source: {}", e);
                return None;
            }
        };
        let position = self.store.position().unwrap_or_else(|e| {
            warn!("Failed to read position: {}", e);
            None
        });

        self.scroller.cancel();
        self.window.reset();
        self.tracker.reset();
        self.initial_position = position.unwrap_or(0);
        self.source = Some(source.clone());

        info!(
            "Restoring {} at position {}",
            source.path.display(),
            self.initial_position
        );
        Some(source)
    }

    /// Content finished loading with `item_count` items. The jump to the
    /// initial position is scheduled after the initial delay so the first
    /// rows have a chance to report their heights.
    pub fn content_loaded(&mut self, item_count: usize, now: Instant) {
        self.window.set_item_count(item_count);
        self.tracker.set_maximum(item_count);
        if item_count == 0 {
            self.scroller.cancel();
            return;
        }
        self.scroller
            .request(self.initial_position, now + self.initial_delay);
        debug!(
            "Loaded {} items, scrolling to {} in {:?}",
            item_count, self.initial_position, self.initial_delay
        );
    }

    /// Clear the view: everything, including the remembered source, is
    /// forgotten.
    pub fn clear(&mut self) {
        self.reset_layout();
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear persisted session: {}", e);
        }
        self.source = None;
        self.initial_position = 0;
        info!("Session cleared");
    }

    fn reset_layout(&mut self) {
        self.scroller.cancel();
        self.heights.clear();
        self.estimator.reset();
        self.window.reset();
        self.window
            .set_estimated_item_size(self.estimator.estimated_height());
        self.tracker.reset();
    }

    pub fn source(&self) -> Option<&SessionSource> {
        self.source.as_ref()
    }

    pub fn item_count(&self) -> usize {
        self.window.item_count()
    }

    // ---- viewport and layout ----------------------------------------------

    pub fn resize(&mut self, viewport: ViewportSize) {
        self.window.set_viewport(viewport);
        if self.estimator.on_viewport_resize(&self.heights) {
            self.window
                .set_estimated_item_size(self.estimator.estimated_height());
        }
    }

    pub fn viewport(&self) -> ViewportSize {
        self.window.viewport()
    }

    /// Lay out the current window and record the resulting position.
    pub fn render(&mut self) -> Option<RenderWindow> {
        let heights = &self.heights;
        let fallback = self.estimator.estimated_height();
        let frame = self
            .window
            .layout(|i| heights.get(i).unwrap_or(fallback))?;

        self.tracker.on_items_rendered(
            frame.visible,
            self.window.item_count(),
            self.store.as_mut(),
        );
        Some(frame)
    }

    pub fn scroll_offset(&self) -> f32 {
        self.window.scroll_offset()
    }

    pub fn total_size(&self) -> f32 {
        self.window.total_size()
    }

    /// User scrolling. Takes over from any pending jump.
    pub fn scroll_by(&mut self, delta: f32) -> f32 {
        self.cancel_for_user_scroll();
        self.window.scroll_by(delta)
    }

    pub fn scroll_to_offset(&mut self, offset: f32) -> f32 {
        self.cancel_for_user_scroll();
        self.window.scroll_to_offset(offset)
    }

    fn cancel_for_user_scroll(&mut self) {
        if let Some(target) = self.scroller.cancel() {
            debug!("Scroll to {} cancelled by user scroll", target);
        }
    }

    // ---- convergent scrolling ---------------------------------------------

    /// Jump to `index` and keep re-jumping until it stays at the top.
    /// The first attempt runs immediately.
    pub fn scroll_to(&mut self, index: usize, now: Instant) -> ScrollStatus {
        self.scroller.request(index, now);
        self.tick(now)
    }

    /// Jump to the initial position: the restored one or the top.
    pub fn scroll_to_pos(&mut self, now: Instant) -> ScrollStatus {
        self.scroll_to(self.initial_position, now)
    }

    /// Go to a one-based page number. `None` if it is out of range.
    pub fn go_to_page(&mut self, page: usize, now: Instant) -> Option<ScrollStatus> {
        match self.tracker.page_to_index(page) {
            Some(index) => Some(self.scroll_to(index, now)),
            None => {
                debug!(
                    "Page {} out of range (1..={})",
                    page,
                    self.tracker.maximum()
                );
                None
            }
        }
    }

    /// Run a convergence attempt if one is due.
    pub fn tick(&mut self, now: Instant) -> ScrollStatus {
        let Some(target) = self.scroller.due_target(now) else {
            return self.scroller.status();
        };
        let observation = self.attempt_scroll(target);
        self.scroller.observe(now, observation)
    }

    /// When the host should call [`ViewerSession::tick`] next.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.scroller.next_deadline()
    }

    pub fn scroll_status(&self) -> ScrollStatus {
        self.scroller.status()
    }

    fn attempt_scroll(&mut self, target: usize) -> Observation {
        let count = self.window.item_count();
        if count == 0 {
            return Observation {
                position: self.tracker.current(),
                reached: false,
            };
        }
        let target = target.min(count - 1);

        let heights = &self.heights;
        let fallback = self.estimator.estimated_height();
        self.window
            .scroll_to_item(target, |i| heights.get(i).unwrap_or(fallback));

        let Some(frame) = self.render() else {
            return Observation {
                position: self.tracker.current(),
                reached: false,
            };
        };
        let position = self.tracker.current();

        // Near the end the target may never reach the top; it counts once it
        // is on screen and the rows around it are real measurements.
        let reached = position == Some(target)
            || (self.window.is_at_end()
                && frame.visible.contains(target)
                && frame.visible.indices().all(|i| self.heights.contains(i)));

        Observation { position, reached }
    }

    // ---- position ---------------------------------------------------------

    pub fn current_position(&self) -> Option<usize> {
        self.tracker.current()
    }

    pub fn maximum_position(&self) -> usize {
        self.tracker.maximum()
    }

    pub fn subscribe(&mut self) -> Receiver<PositionUpdate> {
        self.tracker.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(store: &MemoryStore) -> ViewerSession {
        let mut s = ViewerSession::open(Box::new(store.clone()), &Config::default());
        s.resize(ViewportSize::new(800.0, 800.0));
        s
    }

    fn page() -> ItemSize {
        ItemSize::new(800.0, 400.0)
    }

    #[test]
    fn from_config_honours_store_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            store_path: Some(dir.path().join("s.redb")),
            ..Config::default()
        };
        let mut s = ViewerSession::from_config(&config).unwrap();
        s.open_content(SessionSource::directory("/scans"));
        drop(s);
        let s = ViewerSession::from_config(&config).unwrap();
        assert_eq!(s.source(), Some(&SessionSource::directory("/scans")));

        let ephemeral = Config {
            persist_session: false,
            ..config
        };
        let s = ViewerSession::from_config(&ephemeral).unwrap();
        assert_eq!(s.source(), None);
    }

    #[test]
    fn unmeasured_rows_use_the_estimate() {
        let store = MemoryStore::new();
        let mut s = session(&store);
        s.content_loaded(10, Instant::now());
        assert_eq!(s.row_height(3), 1.0);

        s.measure(0, page(), 400.0);
        assert_eq!(s.row_height(0), 400.0);
        assert_eq!(s.row_height(3), 400.0);
        assert_eq!(s.default_size(), page());
    }

    #[test]
    fn measurement_is_persisted_once() {
        let store = MemoryStore::new();
        let mut s = session(&store);
        s.content_loaded(10, Instant::now());

        assert!(s.measure(2, page(), 400.0));
        let writes = store.write_count();
        assert!(!s.measure(2, page(), 400.0));
        assert_eq!(store.write_count(), writes);
        assert_eq!(store.row_heights().unwrap(), vec![(2, 400.0)]);
    }

    #[test]
    fn bad_measurements_are_ignored() {
        let store = MemoryStore::new();
        let mut s = session(&store);
        s.content_loaded(10, Instant::now());

        assert!(!s.measure(1, page(), 0.0));
        assert!(!s.measure(1, page(), f32::NAN));
        assert!(!s.measure(10, page(), 300.0));
        assert_eq!(s.measured_rows(), 0);
        assert!(s.default_size().is_unknown());
    }

    #[test]
    fn changed_height_moves_later_rows() {
        let store = MemoryStore::new();
        let mut s = session(&store);
        s.content_loaded(20, Instant::now());
        for i in 0..20 {
            s.measure(i, page(), 100.0);
        }
        s.scroll_to_offset(500.0);
        assert_eq!(s.render().unwrap().visible.start, 5);

        s.measure(1, page(), 600.0);
        let frame = s.render().unwrap();
        // Row 1 now spans 100..700 and covers offset 500.
        assert_eq!(frame.visible.start, 1);
        let row5 = frame.placements.iter().find(|p| p.index == 5).unwrap();
        assert_eq!(row5.offset, 1000.0);
    }

    #[test]
    fn set_row_height_uses_item_adapters() {
        use crate::content::ImageItem;

        let store = MemoryStore::new();
        let mut s = session(&store);
        s.content_loaded(3, Instant::now());
        let item = ImageItem::new(ItemSize::new(1000.0, 1500.0), 800.0);
        assert!(s.set_row_height(0, &item));
        assert_eq!(s.row_height(0), 1200.0);
        assert_eq!(s.default_size_handle().get(), ItemSize::new(1000.0, 1500.0));
    }

    #[test]
    fn divider_row_first_still_sets_estimate() {
        let store = MemoryStore::new();
        let mut s = session(&store);
        s.content_loaded(500, Instant::now());

        s.measure(0, ItemSize::new(1.0, 40.0), 400.0);
        s.measure(1, page(), 400.0);
        s.measure(2, page(), 400.0);

        assert_eq!(s.estimated_height(), 400.0);
        assert_eq!(s.default_size(), page());
        assert_eq!(s.total_size(), 500.0 * 400.0);
    }

    #[test]
    fn clear_publishes_a_single_update() {
        let store = MemoryStore::new();
        let mut s = session(&store);
        let rx = s.subscribe();
        s.content_loaded(5, Instant::now());
        s.render();
        let _ = rx.try_iter().count();

        s.clear();
        let updates: Vec<_> = rx.try_iter().collect();
        assert_eq!(updates, vec![PositionUpdate { current: 0, maximum: 0 }]);
    }

    #[test]
    fn resize_recomputes_estimate() {
        let store = MemoryStore::new();
        let mut s = session(&store);
        s.content_loaded(10, Instant::now());
        s.measure(0, page(), 400.0);
        s.measure(1, page(), 200.0);
        assert_eq!(s.estimated_height(), 400.0);

        s.resize(ViewportSize::new(1000.0, 800.0));
        assert_eq!(s.estimated_height(), 300.0);
    }

    #[test]
    fn initial_scroll_waits_for_delay() {
        let store = MemoryStore::new();
        store.clone().put_position(5).unwrap();
        let mut s = session(&store);
        let t0 = Instant::now();
        s.content_loaded(50, t0);

        assert_eq!(s.next_wakeup(), Some(t0 + Duration::from_millis(100)));
        assert!(matches!(s.tick(t0), ScrollStatus::Pending { .. }));
        assert_eq!(s.scroll_offset(), 0.0);
    }

    #[test]
    fn user_scroll_cancels_pending_jump() {
        let store = MemoryStore::new();
        let mut s = session(&store);
        let t0 = Instant::now();
        s.content_loaded(50, t0);
        s.scroll_by(10.0);
        assert_eq!(s.scroll_status(), ScrollStatus::Idle);
        assert_eq!(s.next_wakeup(), None);
    }

    #[test]
    fn go_to_page_validates_range() {
        let store = MemoryStore::new();
        let mut s = session(&store);
        let t0 = Instant::now();
        s.content_loaded(12, t0);
        for i in 0..12 {
            s.measure(i, page(), 400.0);
        }
        assert!(s.go_to_page(0, t0).is_none());
        assert!(s.go_to_page(13, t0).is_none());
        assert!(s.go_to_page(3, t0).is_some());
        assert_eq!(s.current_position(), Some(2));
    }

    #[test]
    fn empty_content_never_writes_a_position() {
        let store = MemoryStore::new();
        let mut s = session(&store);
        s.content_loaded(0, Instant::now());
        assert!(s.render().is_none());
        assert_eq!(store.position().unwrap(), None);
        assert_eq!(s.maximum_position(), 0);
    }

    #[test]
    fn open_content_resets_layout_but_keeps_source() {
        let store = MemoryStore::new();
        let mut s = session(&store);
        s.open_content(SessionSource::file("/books/a.pdf"));
        s.content_loaded(5, Instant::now());
        s.measure(0, page(), 400.0);
        s.render();

        s.open_content(SessionSource::directory("/scans"));
        assert_eq!(s.measured_rows(), 0);
        assert!(s.default_size().is_unknown());
        assert_eq!(s.current_position(), None);
        assert_eq!(s.estimated_height(), 1.0);
        assert_eq!(store.source().unwrap(), Some(SessionSource::directory("/scans")));
        assert!(store.row_heights().unwrap().is_empty());
    }
}

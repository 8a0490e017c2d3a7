//! Reading position: first visible index and total item count.
//!
//! Fed from every layout pass. The position is persisted so a later session
//! can resume, and published to in-memory observers (position chip, go-to
//! dialog) over bounded channels.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::warn;

use crate::store::SessionStore;
use crate::window::VisibleRange;

/// Per-observer backlog. Observers only care about the latest value, so a
/// full channel just drops the update.
const OBSERVER_CHANNEL_CAPACITY: usize = 16;

/// Snapshot sent to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionUpdate {
    pub current: usize,
    pub maximum: usize,
}

impl PositionUpdate {
    /// One-based "current/maximum" label, `None` while nothing is loaded.
    pub fn label(&self) -> Option<String> {
        if self.maximum == 0 {
            None
        } else {
            Some(format!("{}/{}", self.current + 1, self.maximum))
        }
    }
}

#[derive(Debug, Default)]
pub struct PositionTracker {
    current: Option<usize>,
    maximum: usize,
    observers: Vec<Sender<PositionUpdate>>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with a previously persisted position without writing it back.
    pub fn with_position(current: Option<usize>) -> Self {
        Self {
            current,
            ..Self::default()
        }
    }

    /// First visible index as last recorded.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Number of items of the loaded content, 0 when nothing is loaded.
    pub fn maximum(&self) -> usize {
        self.maximum
    }

    pub fn snapshot(&self) -> PositionUpdate {
        PositionUpdate {
            current: self.current.unwrap_or(0),
            maximum: self.maximum,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<PositionUpdate> {
        let (tx, rx) = crossbeam_channel::bounded(OBSERVER_CHANNEL_CAPACITY);
        // Late subscribers start from the current state.
        let _ = tx.try_send(self.snapshot());
        self.observers.push(tx);
        rx
    }

    /// Set once per content load: image count, page count or paragraph count.
    pub fn set_maximum(&mut self, maximum: usize) {
        self.maximum = maximum;
        self.publish();
    }

    /// Record the outcome of a layout pass.
    ///
    /// Nothing is written while `item_count == 0`; a position for content
    /// that has not loaded yet would be bogus. Returns true when the position
    /// changed.
    pub fn on_items_rendered(
        &mut self,
        visible: VisibleRange,
        item_count: usize,
        store: &mut dyn SessionStore,
    ) -> bool {
        if item_count == 0 || self.current == Some(visible.start) {
            return false;
        }

        if let Err(e) = store.put_position(visible.start) {
            warn!("Failed to persist position {}: {}", visible.start, e);
        }
        self.current = Some(visible.start);
        self.publish();
        true
    }

    /// Forget position and maximum (content cleared).
    pub fn reset(&mut self) {
        self.current = None;
        self.maximum = 0;
        self.publish();
    }

    /// Convert a one-based page number into an index, validated against the
    /// loaded maximum.
    pub fn page_to_index(&self, page: usize) -> Option<usize> {
        if page >= 1 && page <= self.maximum {
            Some(page - 1)
        } else {
            None
        }
    }

    fn publish(&mut self) {
        let update = self.snapshot();
        self.observers.retain(|tx| match tx.try_send(update) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

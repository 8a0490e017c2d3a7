//! Windowed rendering over a variable-height item sequence.
//!
//! The controller keeps a lazily grown table of `(offset, size)` for a prefix
//! of the items. Looking up an index extends the table up to that index;
//! [`WindowController::reset_after_index`] truncates it, so a changed height
//! only invalidates the offsets of the rows at or after it.
//!
//! Row sizes come from a caller supplied `height_of(index)` function. The
//! controller never stores heights of rows outside its valid prefix; for the
//! remaining rows it uses the estimated item size when it needs a total.

use crate::geometry::{is_valid_height, ViewportSize};

/// Position of one row inside the scrollable content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub index: usize,
    pub offset: f32,
    pub size: f32,
}

impl Placement {
    pub fn end(&self) -> f32 {
        self.offset + self.size
    }
}

/// Inclusive index range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRange {
    pub start: usize,
    pub end: usize,
}

impl VisibleRange {
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }

    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Result of a layout pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderWindow {
    /// Rows intersecting the viewport.
    pub visible: VisibleRange,
    /// Visible rows plus the overscan margin; these are the rows to mount.
    pub rendered: VisibleRange,
    /// Placement of every row in `rendered`, in index order.
    pub placements: Vec<Placement>,
    pub scroll_offset: f32,
    pub total_size: f32,
}

#[derive(Debug, Clone)]
pub struct WindowController {
    item_count: usize,
    viewport: ViewportSize,
    scroll_offset: f32,
    overscan: usize,
    estimated_item_size: f32,
    /// Valid prefix of the offset table; `table[i].index == i`.
    table: Vec<Placement>,
}

impl WindowController {
    pub fn new(overscan: usize, estimated_item_size: f32) -> Self {
        Self {
            item_count: 0,
            viewport: ViewportSize::default(),
            scroll_offset: 0.0,
            overscan,
            estimated_item_size: sanitize_estimate(estimated_item_size),
            table: Vec::new(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn estimated_item_size(&self) -> f32 {
        self.estimated_item_size
    }

    /// Number of rows whose offsets are currently cached.
    pub fn measured_prefix_len(&self) -> usize {
        self.table.len()
    }

    pub fn set_item_count(&mut self, item_count: usize) {
        self.item_count = item_count;
        self.table.truncate(item_count);
        if item_count == 0 {
            self.scroll_offset = 0.0;
        }
    }

    pub fn set_viewport(&mut self, viewport: ViewportSize) {
        self.viewport = viewport;
    }

    /// Change the size used for unmeasured rows. Every cached offset may
    /// depend on it, so a change drops the whole table.
    pub fn set_estimated_item_size(&mut self, size: f32) {
        let size = sanitize_estimate(size);
        if size != self.estimated_item_size {
            self.estimated_item_size = size;
            self.table.clear();
        }
    }

    /// Discard cached offsets for `index` and everything after it.
    pub fn reset_after_index(&mut self, index: usize) {
        self.table.truncate(index);
    }

    /// Forget everything: no items, no offsets, scrolled to the top.
    pub fn reset(&mut self) {
        self.item_count = 0;
        self.scroll_offset = 0.0;
        self.table.clear();
    }

    /// Placement of `index`, or `None` when it is outside `[0, item_count)`.
    pub fn placement<F>(&mut self, index: usize, height_of: F) -> Option<Placement>
    where
        F: Fn(usize) -> f32,
    {
        if index >= self.item_count {
            return None;
        }
        self.extend_to(index, &height_of);
        Some(self.table[index])
    }

    /// Estimated content height: exact for the cached prefix, estimated
    /// item size for the rest.
    pub fn total_size(&self) -> f32 {
        let cached = self.table.last().map_or(0.0, Placement::end);
        let remaining = self.item_count.saturating_sub(self.table.len());
        cached + remaining as f32 * self.estimated_item_size
    }

    pub fn max_scroll_offset(&self) -> f32 {
        (self.total_size() - self.viewport.height).max(0.0)
    }

    /// True when scrolled as far down as the content allows.
    pub fn is_at_end(&self) -> bool {
        self.scroll_offset >= self.max_scroll_offset() - 0.5
    }

    pub fn scroll_to_offset(&mut self, offset: f32) -> f32 {
        let offset = if offset.is_finite() { offset } else { 0.0 };
        self.scroll_offset = offset.clamp(0.0, self.max_scroll_offset());
        self.scroll_offset
    }

    pub fn scroll_by(&mut self, delta: f32) -> f32 {
        self.scroll_to_offset(self.scroll_offset + delta)
    }

    /// Scroll so the top edge of `index` meets the top of the viewport, as
    /// far as the content height allows. Out-of-range indices are clamped.
    pub fn scroll_to_item<F>(&mut self, index: usize, height_of: F) -> f32
    where
        F: Fn(usize) -> f32,
    {
        if self.item_count == 0 {
            return self.scroll_offset;
        }
        let index = index.min(self.item_count - 1);
        self.extend_to(index, &height_of);
        let target = self.table[index].offset;
        self.scroll_to_offset(target)
    }

    /// Compute visible and overscan ranges for the current scroll offset.
    /// Returns `None` when there is nothing to render.
    pub fn layout<F>(&mut self, height_of: F) -> Option<RenderWindow>
    where
        F: Fn(usize) -> f32,
    {
        if self.item_count == 0 {
            return None;
        }

        // The content may have shrunk since the last scroll.
        self.scroll_offset = self.scroll_offset.clamp(0.0, self.max_scroll_offset());

        let start = self.find_start_index(self.scroll_offset, &height_of);
        let bottom = self.scroll_offset + self.viewport.height;
        let mut end = start;
        let mut edge = self.table[start].end();
        while end + 1 < self.item_count && edge < bottom {
            end += 1;
            self.extend_to(end, &height_of);
            edge = self.table[end].end();
        }

        let rendered = VisibleRange {
            start: start.saturating_sub(self.overscan),
            end: (end + self.overscan).min(self.item_count - 1),
        };
        self.extend_to(rendered.end, &height_of);

        Some(RenderWindow {
            visible: VisibleRange { start, end },
            rendered,
            placements: self.table[rendered.start..=rendered.end].to_vec(),
            scroll_offset: self.scroll_offset,
            total_size: self.total_size(),
        })
    }

    /// Index of the row containing pixel `offset`.
    fn find_start_index<F>(&mut self, offset: f32, height_of: &F) -> usize
    where
        F: Fn(usize) -> f32,
    {
        let offset = offset.max(0.0);

        if let Some(last) = self.table.last() {
            if last.end() > offset {
                let after = self.table.partition_point(|p| p.offset <= offset);
                return after.saturating_sub(1);
            }
        }

        loop {
            let next = self.table.len();
            if next >= self.item_count {
                return self.item_count - 1;
            }
            self.extend_to(next, height_of);
            if self.table[next].end() > offset {
                return next;
            }
        }
    }

    fn extend_to<F>(&mut self, index: usize, height_of: &F)
    where
        F: Fn(usize) -> f32,
    {
        while self.table.len() <= index {
            let i = self.table.len();
            let offset = self.table.last().map_or(0.0, Placement::end);
            let size = height_of(i);
            let size = if is_valid_height(size) {
                size
            } else {
                self.estimated_item_size
            };
            self.table.push(Placement {
                index: i,
                offset,
                size,
            });
        }
    }
}

fn sanitize_estimate(size: f32) -> f32 {
    if is_valid_height(size) {
        size
    } else {
        crate::estimator::SENTINEL_HEIGHT
    }
}

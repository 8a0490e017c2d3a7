//! Plain size types shared by the estimator, the window controller and the
//! content adapters.

/// Width/height pair of a single item, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemSize {
    pub width: f32,
    pub height: f32,
}

impl ItemSize {
    /// Sentinel used before any item has been measured.
    pub const UNKNOWN: ItemSize = ItemSize {
        width: 1.0,
        height: 1.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True while this still holds the "nothing measured yet" sentinel.
    pub fn is_unknown(&self) -> bool {
        self.width <= 1.0 || self.height <= 1.0
    }

    /// Height over width, or `None` for degenerate sizes.
    pub fn aspect_ratio(&self) -> Option<f32> {
        if self.width > 0.0 && self.width.is_finite() && self.height.is_finite() {
            Some(self.height / self.width)
        } else {
            None
        }
    }
}

impl Default for ItemSize {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Size of the scrolling viewport, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportSize {
    pub width: f32,
    pub height: f32,
}

impl ViewportSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }
}

/// A measured height is usable only if it is a positive, finite number.
pub(crate) fn is_valid_height(height: f32) -> bool {
    height.is_finite() && height > 0.0
}

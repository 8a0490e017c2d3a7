//! Variable-height virtualization and reading-position persistence for
//! long strips of images, document pages and text paragraphs.

pub mod config;
pub mod content;
pub mod estimator;
pub mod geometry;
pub mod height_cache;
pub mod position;
pub mod scroller;
pub mod session;
pub mod store;
pub mod window;

pub use config::Config;
pub use content::{
    paragraphs, ContentError, ContentKind, ImageItem, MeasuredItem, PdfPage, SessionSource,
    TextParagraph,
};
pub use estimator::{DefaultSizeHandle, SizeEstimator};
pub use geometry::{ItemSize, ViewportSize};
pub use height_cache::HeightCache;
pub use position::{PositionTracker, PositionUpdate};
pub use scroller::{ConvergentScroller, Observation, ScrollPolicy, ScrollStatus};
pub use session::ViewerSession;
pub use store::{MemoryStore, RedbStore, SessionStore, StoreError};
pub use window::{Placement, RenderWindow, VisibleRange, WindowController};

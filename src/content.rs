//! Content-side types: what is being viewed and how a rendered item reports
//! its size back to the engine.
//!
//! The engine never decodes anything itself. Renderers hand it values that
//! implement [`MeasuredItem`] once an item has finished loading.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::geometry::ItemSize;

/// Rendered pages are laid out at 96 DPI from 72 DPI page units.
pub const PDF_DPI_SCALE: f32 = 4.0 / 3.0;

/// Extra vertical space around a rendered text paragraph, in pixels.
pub const PARAGRAPH_SPACING: f32 = 24.0;

/// Column width used for text paragraphs, in pixels.
pub const TEXT_COLUMN_WIDTH: f32 = 600.0;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read image header of {path}: {source}")]
    ImageHeader {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },
}

/// Kind of content shown by a viewer shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// A directory of images.
    Directory,
    Pdf,
    Text,
    /// A comic book archive.
    Comic,
}

impl ContentKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "dir" | "directory" | "images" => Some(Self::Directory),
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::Text),
            "comic" | "cbz" | "cbr" => Some(Self::Comic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "dir",
            Self::Pdf => "pdf",
            Self::Text => "txt",
            Self::Comic => "comic",
        }
    }

    /// Guess the kind of a file from its extension. Anything unrecognised is
    /// opened as text.
    pub fn guess(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Self::Pdf,
            "cbz" | "cbr" => Self::Comic,
            _ => Self::Text,
        }
    }
}

/// What the session was showing; persisted so it can be reopened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSource {
    pub path: PathBuf,
    pub kind: ContentKind,
}

impl SessionSource {
    pub fn new(path: impl Into<PathBuf>, kind: ContentKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ContentKind::Directory)
    }

    /// A single file, kind guessed from the extension.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = ContentKind::guess(&path);
        Self { path, kind }
    }
}

/// A rendered item able to report its layout height and natural size.
pub trait MeasuredItem {
    /// Height the row occupies in the list, in pixels.
    fn row_height(&self) -> f32;
    /// Natural size of the item, used as the default size for sibling UI.
    fn natural_size(&self) -> ItemSize;
}

/// An image shown at the full list width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageItem {
    pub natural: ItemSize,
    pub display_width: f32,
}

impl ImageItem {
    pub fn new(natural: ItemSize, display_width: f32) -> Self {
        Self {
            natural,
            display_width,
        }
    }

    /// Read the pixel dimensions from the file header without decoding.
    pub fn from_header(path: &Path, display_width: f32) -> Result<Self, ContentError> {
        let size = imagesize::size(path).map_err(|source| ContentError::ImageHeader {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(
            ItemSize::new(size.width as f32, size.height as f32),
            display_width,
        ))
    }
}

impl MeasuredItem for ImageItem {
    fn row_height(&self) -> f32 {
        match self.natural.aspect_ratio() {
            Some(ratio) => (self.display_width * ratio).floor(),
            None => 0.0,
        }
    }

    fn natural_size(&self) -> ItemSize {
        self.natural
    }
}

/// A rendered document page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPage {
    /// Page size in PDF units (1/72 inch).
    pub original: ItemSize,
    /// Height of the page as rendered at the current list width.
    pub rendered_height: f32,
}

impl MeasuredItem for PdfPage {
    fn row_height(&self) -> f32 {
        self.rendered_height.floor()
    }

    fn natural_size(&self) -> ItemSize {
        ItemSize::new(
            self.original.width * PDF_DPI_SCALE,
            self.original.height * PDF_DPI_SCALE,
        )
    }
}

/// A rendered text paragraph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextParagraph {
    pub rendered_height: f32,
}

impl MeasuredItem for TextParagraph {
    fn row_height(&self) -> f32 {
        (self.rendered_height + PARAGRAPH_SPACING).floor()
    }

    fn natural_size(&self) -> ItemSize {
        ItemSize::new(TEXT_COLUMN_WIDTH, self.rendered_height)
    }
}

/// Split text into paragraphs: one per line, trimmed, blank lines dropped.
/// The paragraph count is the maximum position of a text document.
pub fn paragraphs(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

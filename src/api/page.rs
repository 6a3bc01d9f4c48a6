//! Document handles and page geometry.

use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::parser_config::ParseOptions;
use std::sync::Arc;

/// US Letter, used when a page has no usable `/MediaBox`.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// A parsed document, cheap to clone and share across threads.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    document: Arc<SourceDocument>,
}

impl DocumentHandle {
    /// Wrap an already parsed document.
    pub fn new(document: SourceDocument) -> Self {
        Self {
            document: Arc::new(document),
        }
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.document.page_count()
    }

    /// Label used in error messages.
    pub fn label(&self) -> &str {
        self.document.label()
    }

    /// PDF version as `(major, minor)`.
    pub fn version(&self) -> (u8, u8) {
        self.document.version()
    }

    /// The underlying document.
    pub fn document(&self) -> &SourceDocument {
        &self.document
    }
}

impl From<SourceDocument> for DocumentHandle {
    fn from(document: SourceDocument) -> Self {
        Self::new(document)
    }
}

/// One page, with what a rasterizer needs to size its viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRef {
    /// 0-based page index
    pub index: usize,
    /// The page object in its source document
    pub object: ObjectRef,
    /// Effective `/MediaBox` as `[llx, lly, urx, ury]`
    pub media_box: [f64; 4],
    /// Effective `/CropBox`, the media box when absent
    pub crop_box: [f64; 4],
    /// Clockwise rotation in degrees: 0, 90, 180 or 270
    pub rotation: u16,
}

impl PageRef {
    /// Displayed width in points, after rotation.
    pub fn width(&self) -> f64 {
        let (w, h) = self.crop_size();
        if self.rotation % 180 == 0 {
            w
        } else {
            h
        }
    }

    /// Displayed height in points, after rotation.
    pub fn height(&self) -> f64 {
        let (w, h) = self.crop_size();
        if self.rotation % 180 == 0 {
            h
        } else {
            w
        }
    }

    fn crop_size(&self) -> (f64, f64) {
        let [llx, lly, urx, ury] = self.crop_box;
        ((urx - llx).abs(), (ury - lly).abs())
    }
}

/// Parse a document labeled `"document"` with default limits.
pub fn parse_document(data: &[u8]) -> Result<DocumentHandle> {
    parse_document_with(data, "document", &ParseOptions::default())
}

/// Parse a document with a label and explicit limits.
pub fn parse_document_with(
    data: &[u8],
    label: impl Into<String>,
    options: &ParseOptions,
) -> Result<DocumentHandle> {
    SourceDocument::parse_with_options(data, label, options).map(DocumentHandle::new)
}

/// Look up a page and compute its effective geometry.
///
/// # Errors
///
/// [`Error::PageIndexOutOfRange`] if `index >= page_count`.
pub fn get_page(handle: &DocumentHandle, index: usize) -> Result<PageRef> {
    let doc = handle.document();
    let page = doc.page(index).ok_or_else(|| Error::PageIndexOutOfRange {
        document: doc.label().to_string(),
        index,
        page_count: doc.page_count(),
    })?;

    let media_box = doc
        .page_attribute(page, "MediaBox")
        .and_then(|o| rectangle(doc, o))
        .unwrap_or(DEFAULT_MEDIA_BOX);
    let crop_box = doc
        .page_attribute(page, "CropBox")
        .and_then(|o| rectangle(doc, o))
        .map(|crop| intersect(crop, media_box))
        .unwrap_or(media_box);
    let rotation = doc
        .page_attribute(page, "Rotate")
        .and_then(|o| o.as_integer())
        .map(normalize_rotation)
        .unwrap_or(0);

    Ok(PageRef {
        index,
        object: page.object,
        media_box,
        crop_box,
        rotation,
    })
}

/// A four-number array, normalized so the lower-left corner comes first.
fn rectangle(doc: &SourceDocument, obj: &Object) -> Option<[f64; 4]> {
    let items = obj.as_array()?;
    if items.len() != 4 {
        return None;
    }
    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(items) {
        *slot = doc.resolve(item)?.as_number()?;
    }
    let [x0, y0, x1, y1] = values;
    Some([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
}

/// Clip the crop box to the media box; an empty overlap keeps the media box.
fn intersect(crop: [f64; 4], media: [f64; 4]) -> [f64; 4] {
    let clipped = [
        crop[0].max(media[0]),
        crop[1].max(media[1]),
        crop[2].min(media[2]),
        crop[3].min(media[3]),
    ];
    if clipped[0] < clipped[2] && clipped[1] < clipped[3] {
        clipped
    } else {
        media
    }
}

/// Map any multiple of 90 into 0..360; anything else counts as 0.
fn normalize_rotation(degrees: i64) -> u16 {
    if degrees % 90 != 0 {
        log::warn!("Ignoring /Rotate {} (not a multiple of 90)", degrees);
        return 0;
    }
    degrees.rem_euclid(360) as u16
}

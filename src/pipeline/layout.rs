//! Page layout and region rendering.
//!
//! [`PagedDocument`] is the seam between the table pass and the PDF
//! backend: it exposes each page's words and ruling lines in top-left
//! coordinates and renders arbitrary page regions. [`PdfiumDocument`]
//! implements it over `pdfium-render`; tests substitute synthetic pages.
//!
//! ## Threading
//!
//! pdfium uses thread-local state and is CPU-bound. Every entry point here
//! is synchronous; the extractor calls [`PdfEngine::scan_tables`] from
//! `tokio::task::spawn_blocking`.

use crate::config::TableScanOptions;
use crate::error::IngestError;
use crate::geometry::{BBox, Edge, PageLayout, Word};
use crate::pipeline::scan::{scan_document, RenderedTable};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Maximum thickness, in points, for a path to count as a ruling line.
const RULE_THICKNESS: f64 = 2.0;
/// Horizontal gap that splits two characters into separate words.
const WORD_X_TOLERANCE: f64 = 3.0;
/// Vertical drift that moves a character onto a new line.
const WORD_Y_TOLERANCE: f64 = 3.0;

/// A paginated document the table pass can inspect and render.
pub trait PagedDocument {
    fn page_count(&self) -> usize;

    /// Words and ruling lines of page `index` (0-based).
    fn layout(&self, index: usize) -> Result<PageLayout, IngestError>;

    /// Render `region` of page `index` at `dpi`.
    fn render_region(
        &self,
        index: usize,
        region: &BBox,
        dpi: u32,
    ) -> Result<DynamicImage, IngestError>;
}

/// Blocking table scan over raw document bytes.
pub trait PdfEngine: Send + Sync {
    fn scan_tables(
        &self,
        bytes: Vec<u8>,
        options: &TableScanOptions,
    ) -> Result<Vec<RenderedTable>, IngestError>;
}

/// [`PdfEngine`] backed by a pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    /// Bind to the library at `path` instead of searching for one.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    fn bind(&self) -> Result<Pdfium, IngestError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| IngestError::PdfiumBindingFailed(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PdfEngine for PdfiumEngine {
    fn scan_tables(
        &self,
        bytes: Vec<u8>,
        options: &TableScanOptions,
    ) -> Result<Vec<RenderedTable>, IngestError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_vec(bytes, None)
            .map_err(|e| IngestError::Pdf {
                detail: format!("{:?}", e),
            })?;
        let doc = PdfiumDocument { document };
        info!("PDF loaded: {} pages", doc.page_count());
        scan_document(&doc, options)
    }
}

/// A loaded pdfium document.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    pub fn new(document: PdfDocument<'a>) -> Self {
        Self { document }
    }

    fn page(&self, index: usize) -> Result<PdfPage<'_>, IngestError> {
        self.document
            .pages()
            .get(index as u16)
            .map_err(|e| IngestError::Pdf {
                detail: format!("page {}: {:?}", index + 1, e),
            })
    }
}

impl PagedDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn layout(&self, index: usize) -> Result<PageLayout, IngestError> {
        let page = self.page(index)?;
        let width = f64::from(page.width().value);
        let height = f64::from(page.height().value);
        let mut layout = PageLayout::new(width, height);

        let text = page.text().map_err(|e| IngestError::Pdf {
            detail: format!("page {} text: {:?}", index + 1, e),
        })?;
        let mut words = WordBuilder::default();
        for ch in text.chars().iter() {
            let Some(c) = ch.unicode_char() else {
                continue;
            };
            let Ok(rect) = ch.loose_bounds() else {
                continue;
            };
            words.push(c, to_top_left(&rect, height));
        }
        layout.words = words.finish();

        for object in page.objects().iter() {
            if object.object_type() != PdfPageObjectType::Path {
                continue;
            }
            let Ok(bounds) = object.bounds() else {
                continue;
            };
            let bbox = BBox::new(
                f64::from(bounds.left().value),
                height - f64::from(bounds.top().value),
                f64::from(bounds.right().value),
                height - f64::from(bounds.bottom().value),
            );
            layout.edges.extend(path_edges(&bbox));
        }

        debug!(
            "Page {} layout: {} words, {} edges",
            index + 1,
            layout.words.len(),
            layout.edges.len()
        );
        Ok(layout)
    }

    fn render_region(
        &self,
        index: usize,
        region: &BBox,
        dpi: u32,
    ) -> Result<DynamicImage, IngestError> {
        let page = self.page(index)?;
        let scale = dpi as f32 / 72.0;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| IngestError::Rasterisation {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;
        let full = bitmap.as_image();
        crop_points(&full, region, f64::from(scale)).ok_or_else(|| IngestError::Rasterisation {
            page: index + 1,
            detail: format!("empty crop region {:?}", region),
        })
    }
}

fn to_top_left(rect: &PdfRect, page_height: f64) -> BBox {
    BBox::new(
        f64::from(rect.left().value),
        page_height - f64::from(rect.top().value),
        f64::from(rect.right().value),
        page_height - f64::from(rect.bottom().value),
    )
}

/// Ruling lines contributed by one path object: thin paths are lines,
/// anything else contributes its four sides.
fn path_edges(bbox: &BBox) -> Vec<Edge> {
    if bbox.height() <= RULE_THICKNESS && bbox.width() > RULE_THICKNESS {
        let y = (bbox.top + bbox.bottom) / 2.0;
        vec![Edge::horizontal(bbox.x0, bbox.x1, y)]
    } else if bbox.width() <= RULE_THICKNESS && bbox.height() > RULE_THICKNESS {
        let x = (bbox.x0 + bbox.x1) / 2.0;
        vec![Edge::vertical(x, bbox.top, bbox.bottom)]
    } else if bbox.width() > RULE_THICKNESS && bbox.height() > RULE_THICKNESS {
        Edge::rect_sides(bbox).to_vec()
    } else {
        Vec::new()
    }
}

/// Crop a rendered page to `region` (in points) at `scale` pixels per point.
pub(crate) fn crop_points(image: &DynamicImage, region: &BBox, scale: f64) -> Option<DynamicImage> {
    let max_w = f64::from(image.width());
    let max_h = f64::from(image.height());
    let x0 = (region.x0 * scale).floor().clamp(0.0, max_w);
    let y0 = (region.top * scale).floor().clamp(0.0, max_h);
    let x1 = (region.x1 * scale).ceil().clamp(0.0, max_w);
    let y1 = (region.bottom * scale).ceil().clamp(0.0, max_h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(image.crop_imm(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

/// Groups characters into words the way layout analysers do: whitespace
/// ends a word, as does a jump to another line or a wide horizontal gap.
#[derive(Default)]
struct WordBuilder {
    words: Vec<Word>,
    text: String,
    bbox: Option<BBox>,
}

impl WordBuilder {
    fn push(&mut self, c: char, rect: BBox) {
        if c.is_whitespace() {
            self.flush();
            return;
        }
        if let Some(current) = self.bbox {
            let new_line = (rect.top - current.top).abs() > WORD_Y_TOLERANCE;
            let gap = rect.x0 - current.x1 > WORD_X_TOLERANCE || rect.x1 < current.x0;
            if new_line || gap {
                self.flush();
            }
        }
        self.text.push(c);
        self.bbox = Some(match self.bbox {
            Some(b) => b.union(&rect),
            None => rect,
        });
    }

    fn flush(&mut self) {
        if let Some(bbox) = self.bbox.take() {
            self.words.push(Word::new(std::mem::take(&mut self.text), bbox));
        }
        self.text.clear();
    }

    fn finish(mut self) -> Vec<Word> {
        self.flush();
        self.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Orientation;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn glyph(x0: f64, top: f64) -> BBox {
        BBox::new(x0, top, x0 + 5.0, top + 10.0)
    }

    #[test]
    fn word_builder_splits_on_space_gap_and_line() {
        let mut b = WordBuilder::default();
        b.push('F', glyph(10.0, 100.0));
        b.push('e', glyph(15.0, 100.0));
        b.push('e', glyph(20.0, 100.0));
        b.push(' ', glyph(25.0, 100.0));
        b.push('2', glyph(30.0, 100.0));
        b.push('4', glyph(50.0, 100.0)); // wide gap
        b.push('x', glyph(10.0, 120.0)); // next line
        let words = b.finish();
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Fee", "2", "4", "x"]);
        assert_eq!(words[0].bbox, BBox::new(10.0, 100.0, 25.0, 110.0));
    }

    #[test]
    fn thin_paths_become_rules() {
        let h = path_edges(&BBox::new(10.0, 50.0, 200.0, 51.0));
        assert_eq!(h.len(), 1);
        assert_eq!(h[0].orientation, Orientation::Horizontal);
        assert_eq!(h[0].top, 50.5);

        let v = path_edges(&BBox::new(10.0, 50.0, 10.5, 150.0));
        assert_eq!(v[0].orientation, Orientation::Vertical);

        assert_eq!(path_edges(&BBox::new(10.0, 10.0, 100.0, 100.0)).len(), 4);
        assert!(path_edges(&BBox::new(10.0, 10.0, 11.0, 11.0)).is_empty());
    }

    #[test]
    fn crop_scales_and_clamps() {
        let page = DynamicImage::ImageRgba8(RgbaImage::from_pixel(200, 300, Rgba([0, 0, 0, 255])));
        let crop = crop_points(&page, &BBox::new(10.0, 20.0, 60.0, 500.0), 2.0).unwrap();
        assert_eq!(crop.dimensions(), (100, 260));
        assert!(crop_points(&page, &BBox::new(150.0, 0.0, 160.0, 10.0), 2.0).is_none());
    }
}

//! Table geometry: pure layout heuristics, no I/O.
//!
//! Coordinates follow the top-left convention used by layout analysers:
//! `x0`/`x1` grow rightwards, `top`/`bottom` grow downwards, all in PDF
//! points. The PDF backend converts pdfium's bottom-left origin before
//! anything reaches this module.
//!
//! ```text
//! PageLayout ──▶ lattice   (edges → cells → tables)
//!            ──▶ title     (words above a table → title + expanded box)
//!            ──▶ continuation (page N table ⇄ page N+1 table → one group)
//! ```

pub mod continuation;
pub mod lattice;
pub mod title;

pub use continuation::{are_tables_connected, ContinuousTable, TableGrouper, TablePart};
pub use lattice::{find_tables, LatticeSettings};
pub use title::{expand_table_bbox_with_title, find_table_title};

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle `(x0, top, x1, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl BBox {
    pub fn new(x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            x0,
            top,
            x1,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &BBox) -> bool {
        other.x0 >= self.x0 && other.x1 <= self.x1 && other.top >= self.top && other.bottom <= self.bottom
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Clamp to `[0, width] × [0, height]`.
    pub fn clamp_to(&self, width: f64, height: f64) -> BBox {
        BBox {
            x0: self.x0.clamp(0.0, width),
            top: self.top.clamp(0.0, height),
            x1: self.x1.clamp(0.0, width),
            bottom: self.bottom.clamp(0.0, height),
        }
    }
}

/// A word as reported by layout analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub bbox: BBox,
}

impl Word {
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// Orientation of a ruling line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A ruling line segment drawn on the page.
///
/// Horizontal edges have `top == bottom`; vertical edges have `x0 == x1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub orientation: Orientation,
    pub x0: f64,
    pub top: f64,
    pub x1: f64,
    pub bottom: f64,
}

impl Edge {
    pub fn horizontal(x0: f64, x1: f64, y: f64) -> Self {
        Self {
            orientation: Orientation::Horizontal,
            x0: x0.min(x1),
            top: y,
            x1: x0.max(x1),
            bottom: y,
        }
    }

    pub fn vertical(x: f64, top: f64, bottom: f64) -> Self {
        Self {
            orientation: Orientation::Vertical,
            x0: x,
            top: top.min(bottom),
            x1: x,
            bottom: top.max(bottom),
        }
    }

    /// Split a filled/stroked rectangle into its four sides.
    pub fn rect_sides(rect: &BBox) -> [Edge; 4] {
        [
            Edge::horizontal(rect.x0, rect.x1, rect.top),
            Edge::horizontal(rect.x0, rect.x1, rect.bottom),
            Edge::vertical(rect.x0, rect.top, rect.bottom),
            Edge::vertical(rect.x1, rect.top, rect.bottom),
        ]
    }
}

/// A detected table region together with its cell grid.
///
/// `cells` may be empty when the detector could not recover the grid; the
/// continuation test treats that as "do not merge".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedTable {
    pub bbox: BBox,
    pub cells: Vec<BBox>,
}

impl DetectedTable {
    pub fn new(bbox: BBox, cells: Vec<BBox>) -> Self {
        Self { bbox, cells }
    }

    /// Number of distinct column left edges across all cells.
    pub fn column_count(&self) -> usize {
        let mut xs: Vec<i64> = self
            .cells
            .iter()
            .map(|c| (c.x0 * 100.0).round() as i64)
            .collect();
        xs.sort_unstable();
        xs.dedup();
        xs.len()
    }
}

/// Everything the table pass needs to know about one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub width: f64,
    pub height: f64,
    pub words: Vec<Word>,
    pub edges: Vec<Edge>,
}

impl PageLayout {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            words: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Words lying entirely inside `region`.
    pub fn words_within(&self, region: &BBox) -> impl Iterator<Item = &Word> + '_ {
        let region = *region;
        self.words.iter().filter(move |w| region.contains(&w.bbox))
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(0.0, 0.0, self.width, self.height)
    }
}

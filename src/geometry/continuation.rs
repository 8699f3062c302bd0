//! Cross-page table continuation.
//!
//! A table split by a page break shows up as two detected tables: the last
//! one on page N and the first one on page N+1. [`are_tables_connected`]
//! decides whether they are one logical table, and [`TableGrouper`] folds the
//! page sequence into [`ContinuousTable`] groups carrying exactly one open
//! group at a time.

use serde::{Deserialize, Serialize};

use super::{BBox, DetectedTable};

/// Default fraction of page/table width tolerated by the continuation test.
pub const DEFAULT_CONTINUATION_THRESHOLD: f64 = 0.1;

/// Decide whether `curr` (first table of page N+1) continues `prev`
/// (a table of page N).
///
/// All of the following must hold:
/// * left edges differ by less than `threshold × prev_page_width`,
/// * widths differ by less than `threshold × max(width)`,
/// * distinct column counts differ by at most one.
///
/// Missing cell geometry on either side is a negative result.
pub fn are_tables_connected(
    prev: &DetectedTable,
    curr: &DetectedTable,
    prev_page_width: f64,
    threshold: f64,
) -> bool {
    if prev.cells.is_empty() || curr.cells.is_empty() || prev_page_width <= 0.0 {
        return false;
    }

    let left_diff = (prev.bbox.x0 - curr.bbox.x0).abs() / prev_page_width;
    if left_diff >= threshold {
        return false;
    }

    let max_width = prev.bbox.width().max(curr.bbox.width());
    if max_width <= 0.0 {
        return false;
    }
    let width_diff = (prev.bbox.width() - curr.bbox.width()).abs() / max_width;
    if width_diff >= threshold {
        return false;
    }

    prev.column_count().abs_diff(curr.column_count()) <= 1
}

/// One page's contribution to a logical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePart {
    /// Zero-based page index.
    pub page_number: usize,
    /// Position of the table among the tables detected on its page.
    pub table_index: usize,
    /// Crop region: title-expanded, padded, clamped to the page.
    pub bounding_box: BBox,
    /// Detected table region before any expansion.
    pub original_bounding_box: BBox,
    pub inferred_title: Option<String>,
    /// Width of the page the part lives on.
    pub page_width: f64,
    /// Detected cell grid, kept for the continuation test.
    pub cells: Vec<BBox>,
}

impl TablePart {
    fn as_detected(&self) -> DetectedTable {
        DetectedTable::new(self.original_bounding_box, self.cells.clone())
    }
}

/// Ordered parts believed to be one logical table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousTable {
    pub parts: Vec<TablePart>,
    pub start_page: usize,
    pub end_page: usize,
}

impl ContinuousTable {
    fn open(part: TablePart) -> Self {
        Self {
            start_page: part.page_number,
            end_page: part.page_number,
            parts: vec![part],
        }
    }

    fn append(&mut self, part: TablePart) {
        self.end_page = part.page_number;
        self.parts.push(part);
    }

    /// Title of the first part that has one.
    pub fn title(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| p.inferred_title.as_deref())
    }

    pub fn is_multi_page(&self) -> bool {
        self.parts.len() > 1
    }
}

/// Forward-only fold over pages producing finished [`ContinuousTable`]s.
///
/// Only the first table of a page may extend the open group, and only when
/// the open group ended on the immediately preceding page. Every other
/// table closes the open group and starts a new one.
#[derive(Debug)]
pub struct TableGrouper {
    threshold: f64,
    open: Option<ContinuousTable>,
}

impl TableGrouper {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            open: None,
        }
    }

    /// Feed the parts found on one page (in detection order). Returns the
    /// groups that were closed by this page.
    pub fn push_page(&mut self, parts: Vec<TablePart>) -> Vec<ContinuousTable> {
        let mut closed = Vec::new();
        for part in parts {
            let joins = self
                .open
                .as_ref()
                .is_some_and(|open| self.continues(open, &part));
            if joins {
                if let Some(open) = self.open.as_mut() {
                    open.append(part);
                }
                continue;
            }
            if let Some(done) = self.open.replace(ContinuousTable::open(part)) {
                closed.push(done);
            }
        }
        closed
    }

    /// Close the document, flushing the open group if any.
    pub fn finish(mut self) -> Option<ContinuousTable> {
        self.open.take()
    }

    fn continues(&self, open: &ContinuousTable, part: &TablePart) -> bool {
        if part.table_index != 0 || part.page_number != open.end_page + 1 {
            return false;
        }
        let Some(last) = open.parts.last() else {
            return false;
        };
        are_tables_connected(
            &last.as_detected(),
            &part.as_detected(),
            last.page_width,
            self.threshold,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A grid table with `cols` equal columns and two rows.
    fn table(x0: f64, width: f64, cols: usize) -> DetectedTable {
        let col_w = width / cols as f64;
        let mut cells = Vec::new();
        for r in 0..2 {
            for c in 0..cols {
                let cx = x0 + col_w * c as f64;
                cells.push(BBox::new(cx, 100.0 + 20.0 * r as f64, cx + col_w, 120.0 + 20.0 * r as f64));
            }
        }
        DetectedTable::new(BBox::new(x0, 100.0, x0 + width, 140.0), cells)
    }

    fn part(page: usize, index: usize, t: &DetectedTable) -> TablePart {
        TablePart {
            page_number: page,
            table_index: index,
            bounding_box: t.bbox,
            original_bounding_box: t.bbox,
            inferred_title: None,
            page_width: 600.0,
            cells: t.cells.clone(),
        }
    }

    #[test]
    fn matching_tables_connect() {
        assert!(are_tables_connected(&table(50.0, 400.0, 4), &table(52.0, 398.0, 4), 600.0, 0.1));
    }

    #[test]
    fn left_edge_shift_breaks_connection() {
        // 61 / 600 > 0.1
        assert!(!are_tables_connected(&table(50.0, 400.0, 4), &table(111.0, 400.0, 4), 600.0, 0.1));
    }

    #[test]
    fn width_change_breaks_connection() {
        // 41 / 400 > 0.1
        assert!(!are_tables_connected(&table(50.0, 400.0, 4), &table(50.0, 359.0, 4), 600.0, 0.1));
    }

    #[test]
    fn column_count_tolerates_one() {
        assert!(are_tables_connected(&table(50.0, 400.0, 4), &table(50.0, 400.0, 5), 600.0, 0.1));
        assert!(!are_tables_connected(&table(50.0, 400.0, 4), &table(50.0, 400.0, 6), 600.0, 0.1));
    }

    #[test]
    fn missing_cells_never_connect() {
        let bare = DetectedTable::new(BBox::new(50.0, 100.0, 450.0, 140.0), vec![]);
        assert!(!are_tables_connected(&bare, &table(50.0, 400.0, 4), 600.0, 0.1));
        assert!(!are_tables_connected(&table(50.0, 400.0, 4), &bare, 600.0, 0.1));
    }

    #[test]
    fn grouper_merges_across_pages_and_splits_unrelated() {
        let t = table(50.0, 400.0, 4);
        let other = table(300.0, 200.0, 2);
        let mut g = TableGrouper::new(0.1);

        assert!(g.push_page(vec![part(0, 0, &t)]).is_empty());
        assert!(g.push_page(vec![part(1, 0, &t)]).is_empty());
        let closed = g.push_page(vec![part(2, 0, &other)]);
        assert_eq!(closed.len(), 1);
        assert_eq!((closed[0].start_page, closed[0].end_page), (0, 1));
        assert_eq!(closed[0].parts.len(), 2);

        let last = g.finish().expect("open group");
        assert_eq!((last.start_page, last.end_page), (2, 2));
    }

    #[test]
    fn second_table_on_page_never_continues() {
        let t = table(50.0, 400.0, 4);
        let mut g = TableGrouper::new(0.1);
        g.push_page(vec![part(0, 0, &t)]);
        let closed = g.push_page(vec![part(1, 0, &table(300.0, 100.0, 2)), part(1, 1, &t)]);
        assert_eq!(closed.len(), 2);
        assert_eq!(g.finish().map(|c| c.parts.len()), Some(1));
    }

    #[test]
    fn skipped_page_breaks_continuation() {
        let t = table(50.0, 400.0, 4);
        let mut g = TableGrouper::new(0.1);
        g.push_page(vec![part(0, 0, &t)]);
        g.push_page(vec![]);
        let closed = g.push_page(vec![part(2, 0, &t)]);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].end_page, 0);
    }

    #[test]
    fn long_table_keeps_extending_the_open_group() {
        let t = table(50.0, 400.0, 4);
        let mut g = TableGrouper::new(0.1);
        for page in 0..4 {
            assert!(g.push_page(vec![part(page, 0, &t)]).is_empty());
        }
        let group = g.finish().expect("open group");
        assert_eq!((group.start_page, group.end_page), (0, 3));
        assert_eq!(group.parts.len(), 4);
        assert!(group.is_multi_page());
    }
}

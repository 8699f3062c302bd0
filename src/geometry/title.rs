//! Table title inference.
//!
//! Titles are recovered from the words sitting just above a table. Layout
//! analysis reports a multi-token title ("Table 3 - Fee schedule") as
//! separate words whose baselines jitter by a point or two, so the search
//! keeps every candidate within a tolerance band of the closest one rather
//! than picking a single nearest word.

use super::{BBox, PageLayout};
use tracing::debug;

/// Horizontal widening of the search region on each side.
const SEARCH_MARGIN_X: f64 = 20.0;
/// Horizontal tolerance when testing a word against the table span.
const SPAN_TOLERANCE: f64 = 15.0;
/// Candidates within this distance of the closest one join the title.
const DISTANCE_BAND: f64 = 15.0;
/// Gap left above the title when growing the table box.
const TITLE_MARGIN: f64 = 5.0;

/// Default vertical search distance above a table.
pub const DEFAULT_TITLE_DISTANCE: f64 = 50.0;
/// Default padding added around a table crop.
pub const DEFAULT_TABLE_PADDING: f64 = 25.0;

struct Candidate<'a> {
    text: &'a str,
    bbox: BBox,
    distance: f64,
}

/// Look for a title directly above `table_bbox`.
///
/// Returns the joined title and the table box grown upwards to include it,
/// or `(None, table_bbox)` when nothing qualifies.
pub fn find_table_title(
    page: &PageLayout,
    table_bbox: &BBox,
    max_distance: f64,
) -> (Option<String>, BBox) {
    let title_area = BBox::new(
        table_bbox.x0 - SEARCH_MARGIN_X,
        (table_bbox.top - max_distance).max(0.0),
        table_bbox.x1 + SEARCH_MARGIN_X,
        table_bbox.top,
    );

    let mut candidates: Vec<Candidate<'_>> = page
        .words_within(&title_area)
        .filter(|w| {
            w.bbox.x0 < table_bbox.x1 + SPAN_TOLERANCE && w.bbox.x1 > table_bbox.x0 - SPAN_TOLERANCE
        })
        .filter(|w| !w.text.trim().is_empty())
        .map(|w| Candidate {
            text: w.text.as_str(),
            bbox: w.bbox,
            distance: table_bbox.top - w.bbox.bottom,
        })
        .collect();

    if candidates.is_empty() {
        return (None, *table_bbox);
    }

    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    let min_distance = candidates[0].distance;

    let mut parts: Vec<Candidate<'_>> = candidates
        .into_iter()
        .filter(|c| c.distance <= min_distance + DISTANCE_BAND)
        .collect();
    parts.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));

    let title = parts.iter().map(|p| p.text).collect::<Vec<_>>().join(" ");
    let title_top = parts
        .iter()
        .map(|p| p.bbox.top)
        .fold(f64::INFINITY, f64::min);

    let expanded = BBox::new(
        table_bbox.x0,
        title_top - TITLE_MARGIN,
        table_bbox.x1,
        table_bbox.bottom,
    );
    debug!("Table title {:?} at top={:.1}", title, title_top);

    (Some(title), expanded)
}

/// Find the title and return the final crop region: the title-expanded box
/// padded by `padding` on every side and clamped to the page.
pub fn expand_table_bbox_with_title(
    page: &PageLayout,
    table_bbox: &BBox,
    max_distance: f64,
    padding: f64,
) -> (Option<String>, BBox) {
    let (title, extended) = find_table_title(page, table_bbox, max_distance);
    let padded = BBox::new(
        extended.x0 - padding,
        extended.top - padding,
        extended.x1 + padding,
        extended.bottom + padding,
    )
    .clamp_to(page.width, page.height);
    (title, padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Word;

    fn page_with(words: Vec<Word>) -> PageLayout {
        let mut page = PageLayout::new(600.0, 800.0);
        page.words = words;
        page
    }

    fn table() -> BBox {
        BBox::new(100.0, 200.0, 400.0, 350.0)
    }

    #[test]
    fn joins_tokens_left_to_right_within_band() {
        let page = page_with(vec![
            Word::new("schedule", BBox::new(180.0, 182.0, 230.0, 192.0)),
            Word::new("Fee", BBox::new(110.0, 180.0, 130.0, 190.0)),
            Word::new("2024", BBox::new(140.0, 181.0, 170.0, 191.0)),
        ]);
        let (title, expanded) = find_table_title(&page, &table(), 50.0);
        assert_eq!(title.as_deref(), Some("Fee 2024 schedule"));
        assert_eq!(expanded.top, 175.0);
        assert_eq!(expanded.bottom, 350.0);
        assert_eq!(expanded.x0, 100.0);
    }

    #[test]
    fn distant_lines_fall_outside_the_band() {
        let page = page_with(vec![
            Word::new("Heading", BBox::new(110.0, 155.0, 160.0, 165.0)),
            Word::new("Caption", BBox::new(110.0, 185.0, 160.0, 195.0)),
        ]);
        let (title, _) = find_table_title(&page, &table(), 50.0);
        assert_eq!(title.as_deref(), Some("Caption"));
    }

    #[test]
    fn words_outside_horizontal_span_are_ignored() {
        // Inside the search region (x0 - 20) but entirely left of x0 - 15.
        let page = page_with(vec![Word::new("Side", BBox::new(81.0, 185.0, 84.0, 195.0))]);
        let (title, bbox) = find_table_title(&page, &table(), 50.0);
        assert!(title.is_none());
        assert_eq!(bbox, table());
    }

    #[test]
    fn words_beyond_max_distance_are_ignored() {
        let page = page_with(vec![Word::new("Far", BBox::new(110.0, 100.0, 150.0, 110.0))]);
        let (title, bbox) = find_table_title(&page, &table(), 50.0);
        assert!(title.is_none());
        assert_eq!(bbox, table());
    }

    #[test]
    fn padding_is_clamped_to_page() {
        let page = page_with(vec![]);
        let near_edge = BBox::new(10.0, 10.0, 590.0, 790.0);
        let (_, padded) = expand_table_bbox_with_title(&page, &near_edge, 50.0, 25.0);
        assert_eq!(padded, BBox::new(0.0, 0.0, 600.0, 800.0));
    }
}

//! The table pass: detect, title, group and rasterise every table.
//!
//! ```text
//! for page in document:
//!     lattice::find_tables ─▶ title::expand_table_bbox_with_title ─▶ TablePart
//!     TableGrouper::push_page ─▶ closed ContinuousTables ─▶ render + merge + PNG
//! TableGrouper::finish ─▶ last open group ─▶ render + merge + PNG
//! ```
//!
//! A table that fails to render is logged and skipped; the remaining tables
//! still flow. A page whose layout cannot be read aborts the pass.

use crate::config::TableScanOptions;
use crate::error::IngestError;
use crate::geometry::{
    expand_table_bbox_with_title, find_tables, ContinuousTable, TableGrouper, TablePart,
};
use crate::pipeline::layout::PagedDocument;
use crate::pipeline::raster::{encode_png, merge_all};
use tracing::{debug, info, warn};

/// One logical table, rasterised and PNG-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTable {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub title: Option<String>,
    /// Zero-based first and last page of the table.
    pub start_page: usize,
    pub end_page: usize,
    pub part_count: usize,
}

/// Run the table pass over every page of `doc`.
pub fn scan_document(
    doc: &dyn PagedDocument,
    options: &TableScanOptions,
) -> Result<Vec<RenderedTable>, IngestError> {
    let mut grouper = TableGrouper::new(options.continuation_threshold);
    let mut rendered = Vec::new();

    for page_index in 0..doc.page_count() {
        let layout = doc.layout(page_index)?;
        let tables = find_tables(&layout, &options.lattice);
        debug!("Page {}: {} table(s)", page_index + 1, tables.len());

        let parts: Vec<TablePart> = tables
            .into_iter()
            .enumerate()
            .map(|(table_index, table)| {
                let (title, bbox) = expand_table_bbox_with_title(
                    &layout,
                    &table.bbox,
                    options.title_distance,
                    options.padding,
                );
                TablePart {
                    page_number: page_index,
                    table_index,
                    bounding_box: bbox,
                    original_bounding_box: table.bbox,
                    inferred_title: title,
                    page_width: layout.width,
                    cells: table.cells,
                }
            })
            .collect();

        for group in grouper.push_page(parts) {
            rendered.extend(render_group(doc, &group, options));
        }
    }
    if let Some(group) = grouper.finish() {
        rendered.extend(render_group(doc, &group, options));
    }

    info!("Table pass produced {} image(s)", rendered.len());
    Ok(rendered)
}

fn render_group(
    doc: &dyn PagedDocument,
    group: &ContinuousTable,
    options: &TableScanOptions,
) -> Option<RenderedTable> {
    match try_render_group(doc, group, options) {
        Ok(table) => Some(table),
        Err(e) => {
            warn!(
                "Skipping table on pages {}-{}: {}",
                group.start_page + 1,
                group.end_page + 1,
                e
            );
            None
        }
    }
}

fn try_render_group(
    doc: &dyn PagedDocument,
    group: &ContinuousTable,
    options: &TableScanOptions,
) -> Result<RenderedTable, IngestError> {
    let images = group
        .parts
        .iter()
        .map(|part| doc.render_region(part.page_number, &part.bounding_box, options.resolution))
        .collect::<Result<Vec<_>, _>>()?;

    let image = merge_all(images, options.merge_overlap).ok_or_else(|| {
        IngestError::Internal("continuous table without parts".to_string())
    })?;
    let png = encode_png(&image).map_err(|e| IngestError::Rasterisation {
        page: group.start_page + 1,
        detail: e.to_string(),
    })?;

    if group.is_multi_page() {
        info!(
            "Merged table across pages {}-{} ({} parts){}",
            group.start_page + 1,
            group.end_page + 1,
            group.parts.len(),
            group
                .title()
                .map(|t| format!(", title: {}", t))
                .unwrap_or_default()
        );
    }

    Ok(RenderedTable {
        width: image.width(),
        height: image.height(),
        png,
        title: group.title().map(str::to_string),
        start_page: group.start_page,
        end_page: group.end_page,
        part_count: group.parts.len(),
    })
}

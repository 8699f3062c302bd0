//! Lattice table detection from ruling lines.
//!
//! The finder works purely on the [`Edge`]s a page exposes:
//!
//! 1. snap nearly-collinear edges onto a shared coordinate,
//! 2. join collinear segments separated by small gaps,
//! 3. intersect every vertical edge with every horizontal edge,
//! 4. turn intersection rectangles whose sides are backed by real edges
//!    into cells,
//! 5. group cells sharing corners into tables.
//!
//! Tables made of a single cell are dropped; a lone framed box is far more
//! often a callout or a border than a table.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::{BBox, DetectedTable, Edge, Orientation, PageLayout};

/// Tolerances for the lattice finder, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticeSettings {
    pub snap_tolerance: f64,
    pub join_tolerance: f64,
    pub edge_min_length: f64,
    pub intersection_tolerance: f64,
}

impl Default for LatticeSettings {
    fn default() -> Self {
        Self {
            snap_tolerance: 3.0,
            join_tolerance: 3.0,
            edge_min_length: 3.0,
            intersection_tolerance: 3.0,
        }
    }
}

/// Detect tables on `page`, ordered top-to-bottom then left-to-right.
pub fn find_tables(page: &PageLayout, settings: &LatticeSettings) -> Vec<DetectedTable> {
    let edges = merge_edges(&page.edges, settings);
    let (verticals, horizontals): (Vec<Edge>, Vec<Edge>) = edges
        .into_iter()
        .partition(|e| e.orientation == Orientation::Vertical);

    let intersections = find_intersections(&verticals, &horizontals, settings.intersection_tolerance);
    let cells = intersections_to_cells(&intersections);
    let mut tables: Vec<DetectedTable> = cells_to_tables(cells)
        .into_iter()
        .filter(|cells| cells.len() > 1)
        .map(|cells| {
            let bbox = cells
                .iter()
                .skip(1)
                .fold(cells[0], |acc, c| acc.union(c));
            DetectedTable::new(bbox, cells)
        })
        .collect();

    tables.sort_by(|a, b| {
        a.bbox
            .top
            .total_cmp(&b.bbox.top)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });
    tables
}

// ── Edge merging ────────────────────────────────────────────────────────────

fn merge_edges(edges: &[Edge], settings: &LatticeSettings) -> Vec<Edge> {
    let mut horizontals: Vec<Edge> = edges
        .iter()
        .filter(|e| e.orientation == Orientation::Horizontal)
        .copied()
        .collect();
    let mut verticals: Vec<Edge> = edges
        .iter()
        .filter(|e| e.orientation == Orientation::Vertical)
        .copied()
        .collect();

    snap(&mut horizontals, settings.snap_tolerance);
    snap(&mut verticals, settings.snap_tolerance);

    let mut merged = join(horizontals, settings.join_tolerance);
    merged.extend(join(verticals, settings.join_tolerance));
    merged.retain(|e| edge_length(e) >= settings.edge_min_length);
    merged
}

/// The coordinate that is shared by all points of an edge.
fn position(e: &Edge) -> f64 {
    match e.orientation {
        Orientation::Horizontal => e.top,
        Orientation::Vertical => e.x0,
    }
}

fn set_position(e: &mut Edge, value: f64) {
    match e.orientation {
        Orientation::Horizontal => {
            e.top = value;
            e.bottom = value;
        }
        Orientation::Vertical => {
            e.x0 = value;
            e.x1 = value;
        }
    }
}

fn span(e: &Edge) -> (f64, f64) {
    match e.orientation {
        Orientation::Horizontal => (e.x0, e.x1),
        Orientation::Vertical => (e.top, e.bottom),
    }
}

fn set_span(e: &mut Edge, start: f64, end: f64) {
    match e.orientation {
        Orientation::Horizontal => {
            e.x0 = start;
            e.x1 = end;
        }
        Orientation::Vertical => {
            e.top = start;
            e.bottom = end;
        }
    }
}

fn edge_length(e: &Edge) -> f64 {
    let (start, end) = span(e);
    end - start
}

/// Cluster edges whose positions chain within `tolerance` and move every
/// member onto the cluster mean.
fn snap(edges: &mut [Edge], tolerance: f64) {
    if edges.is_empty() {
        return;
    }
    edges.sort_by(|a, b| position(a).total_cmp(&position(b)));

    let mut start = 0;
    for i in 1..=edges.len() {
        let breaks = i == edges.len() || position(&edges[i]) - position(&edges[i - 1]) > tolerance;
        if breaks {
            let cluster = &mut edges[start..i];
            let mean = cluster.iter().map(position).sum::<f64>() / cluster.len() as f64;
            for e in cluster.iter_mut() {
                set_position(e, mean);
            }
            start = i;
        }
    }
}

/// Join collinear edges (same snapped position) whose spans overlap or
/// are separated by at most `tolerance`.
fn join(edges: Vec<Edge>, tolerance: f64) -> Vec<Edge> {
    let mut by_position: BTreeMap<i64, Vec<Edge>> = BTreeMap::new();
    for e in edges {
        by_position.entry(key(position(&e))).or_default().push(e);
    }

    let mut out = Vec::new();
    for (_, mut group) in by_position {
        group.sort_by(|a, b| span(a).0.total_cmp(&span(b).0));
        let mut iter = group.into_iter();
        let Some(mut current) = iter.next() else {
            continue;
        };
        for next in iter {
            let (cur_start, cur_end) = span(&current);
            let (next_start, next_end) = span(&next);
            if next_start <= cur_end + tolerance {
                set_span(&mut current, cur_start, cur_end.max(next_end));
            } else {
                out.push(current);
                current = next;
            }
        }
        out.push(current);
    }
    out
}

// ── Intersections and cells ─────────────────────────────────────────────────

/// Fixed-point key so snapped coordinates can be compared exactly.
fn key(v: f64) -> i64 {
    (v * 1000.0).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Point {
    x: i64,
    y: i64,
}

impl Point {
    fn coords(&self) -> (f64, f64) {
        (self.x as f64 / 1000.0, self.y as f64 / 1000.0)
    }
}

/// Edge ids passing through an intersection point.
#[derive(Debug, Default)]
struct Crossing {
    verticals: HashSet<usize>,
    horizontals: HashSet<usize>,
}

fn find_intersections(
    verticals: &[Edge],
    horizontals: &[Edge],
    tolerance: f64,
) -> BTreeMap<Point, Crossing> {
    let mut points: BTreeMap<Point, Crossing> = BTreeMap::new();
    for (vi, v) in verticals.iter().enumerate() {
        for (hi, h) in horizontals.iter().enumerate() {
            let touches = v.top <= h.top + tolerance
                && v.bottom >= h.top - tolerance
                && v.x0 >= h.x0 - tolerance
                && v.x0 <= h.x1 + tolerance;
            if touches {
                let entry = points
                    .entry(Point {
                        x: key(v.x0),
                        y: key(h.top),
                    })
                    .or_default();
                entry.verticals.insert(vi);
                entry.horizontals.insert(hi);
            }
        }
    }
    points
}

fn edge_connects(points: &BTreeMap<Point, Crossing>, a: &Point, b: &Point) -> bool {
    let (Some(pa), Some(pb)) = (points.get(a), points.get(b)) else {
        return false;
    };
    if a.x == b.x && !pa.verticals.is_disjoint(&pb.verticals) {
        return true;
    }
    a.y == b.y && !pa.horizontals.is_disjoint(&pb.horizontals)
}

/// For each intersection, the smallest rectangle having it as top-left
/// corner whose four sides are backed by edges.
fn intersections_to_cells(points: &BTreeMap<Point, Crossing>) -> Vec<BBox> {
    let ordered: Vec<Point> = points.keys().copied().collect();
    let mut cells = Vec::new();

    for (i, pt) in ordered.iter().enumerate() {
        let rest = &ordered[i + 1..];
        let below: Vec<&Point> = rest.iter().filter(|p| p.x == pt.x).collect();
        let right: Vec<&Point> = rest.iter().filter(|p| p.y == pt.y).collect();

        'search: for b in &below {
            if !edge_connects(points, pt, b) {
                continue;
            }
            for r in &right {
                if !edge_connects(points, pt, r) {
                    continue;
                }
                let corner = Point { x: r.x, y: b.y };
                if points.contains_key(&corner)
                    && edge_connects(points, &corner, r)
                    && edge_connects(points, &corner, b)
                {
                    let (x0, top) = pt.coords();
                    let (x1, bottom) = corner.coords();
                    cells.push(BBox::new(x0, top, x1, bottom));
                    break 'search;
                }
            }
        }
    }
    cells
}

fn corners(cell: &BBox) -> [Point; 4] {
    let (x0, x1, top, bottom) = (key(cell.x0), key(cell.x1), key(cell.top), key(cell.bottom));
    [
        Point { x: x0, y: top },
        Point { x: x0, y: bottom },
        Point { x: x1, y: top },
        Point { x: x1, y: bottom },
    ]
}

/// Connected components of cells, where two cells are adjacent when they
/// share a corner.
fn cells_to_tables(cells: Vec<BBox>) -> Vec<Vec<BBox>> {
    let mut owners: HashMap<Point, Vec<usize>> = HashMap::new();
    for (i, cell) in cells.iter().enumerate() {
        for c in corners(cell) {
            owners.entry(c).or_default().push(i);
        }
    }

    let mut seen = vec![false; cells.len()];
    let mut tables = Vec::new();
    for start in 0..cells.len() {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut stack = vec![start];
        let mut members = Vec::new();
        while let Some(i) = stack.pop() {
            members.push(i);
            for c in corners(&cells[i]) {
                for &j in owners.get(&c).map(Vec::as_slice).unwrap_or_default() {
                    if !seen[j] {
                        seen[j] = true;
                        stack.push(j);
                    }
                }
            }
        }
        members.sort_unstable();
        tables.push(members.into_iter().map(|i| cells[i]).collect());
    }
    tables
}

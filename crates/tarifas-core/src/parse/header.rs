//! Two-level header reconstruction.
//!
//! The portal publishes a pivot table whose first header row carries the base
//! columns (route, length, effective date, usually `rowspan=2`) and the vehicle
//! classes (`colspan` over their axle variants); the second row carries the
//! axle labels. Both rows are expanded into `top`/`bottom` of equal width.

use crate::errors::{IngestError, IngestResult};
use crate::model::{HeaderGrid, TableCell, TableRow};

pub const ROUTE_SYNONYMS: &[&str] = &["vía", "via"];
pub const LENGTH_SYNONYMS: &[&str] = &[
    "long km",
    "long. km",
    "long (km)",
    "long(km)",
    "longitud",
    "long",
];
pub const EFFECTIVE_FROM_SYNONYMS: &[&str] =
    &["vigente desde", "vigencia", "fecha vigencia", "vigente"];

pub fn build_header_grid(rows: &[TableRow]) -> IngestResult<HeaderGrid> {
    let first = rows
        .first()
        .ok_or_else(|| IngestError::unexpected_format("table has no rows"))?;

    let width: usize = first.iter().map(|c| c.colspan.max(1)).sum();
    let mut top = Vec::with_capacity(width);
    let mut spans_both = Vec::with_capacity(width);
    for cell in first {
        for _ in 0..cell.colspan.max(1) {
            top.push(cell.text.clone());
            spans_both.push(cell.rowspan >= 2);
        }
    }

    let route_idx = find_column(&top, ROUTE_SYNONYMS).ok_or_else(|| {
        IngestError::unexpected_format(format!(
            "header has no route column (top row: {:?})",
            top
        ))
    })?;

    let mut grid = HeaderGrid {
        bottom: vec![String::new(); width],
        top,
        spans_both,
        header_rows: 1,
    };

    if let Some(second) = rows.get(1) {
        let bottom = lay_second_row(second, &grid.spans_both);
        // A second row with text under the route column is data, not header.
        if bottom[route_idx].is_empty() {
            grid.bottom = bottom;
            if grid.has_bottom_labels() {
                grid.header_rows = 2;
            }
        }
    }

    Ok(grid)
}

/// Places row-1 cells left to right into the columns not blocked by row 0.
fn lay_second_row(cells: &[TableCell], blocked: &[bool]) -> Vec<String> {
    let width = blocked.len();
    let mut out = vec![String::new(); width];
    let mut filled = vec![false; width];

    let next_free = |from: usize, filled: &[bool]| {
        (from..width)
            .find(|&c| !blocked[c] && !filled[c])
            .unwrap_or(width)
    };

    let mut col = next_free(0, &filled);
    for cell in cells {
        let mut placed = 0;
        while col < width && placed < cell.colspan.max(1) {
            if !blocked[col] && !filled[col] {
                out[col] = cell.text.clone();
                filled[col] = true;
                placed += 1;
            }
            col += 1;
        }
        col = next_free(col, &filled);
    }
    out
}

/// Expands a data row by column span and fits it to `width`.
pub fn expand_row(cells: &[TableCell], width: usize) -> Vec<String> {
    let mut out: Vec<String> = cells
        .iter()
        .flat_map(|c| std::iter::repeat(c.text.clone()).take(c.colspan.max(1)))
        .take(width)
        .collect();
    out.resize(width, String::new());
    out
}

/// Locates a header column by synonym: exact label match first (in synonym
/// order), then the first label containing a synonym as whole words.
pub fn find_column(labels: &[String], synonyms: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = labels.iter().map(|l| normalize_label(l)).collect();
    let wanted: Vec<String> = synonyms.iter().map(|s| normalize_label(s)).collect();

    for w in &wanted {
        if let Some(i) = normalized.iter().position(|l| l == w) {
            return Some(i);
        }
    }
    for w in &wanted {
        let needle = format!(" {} ", w);
        if let Some(i) = normalized
            .iter()
            .position(|l| format!(" {} ", l).contains(&needle))
        {
            return Some(i);
        }
    }
    None
}

fn normalize_label(s: &str) -> String {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

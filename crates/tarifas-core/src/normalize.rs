//! Pivot table → flat records.
//!
//! Each data row fans out into one [`NormalizedRecord`] per vehicle-class/axle
//! column carrying a value.

use crate::errors::IngestResult;
use crate::model::{HeaderGrid, NormalizedRecord, TableRow};
use crate::parse::header::{
    build_header_grid, expand_row, find_column, EFFECTIVE_FROM_SYNONYMS, LENGTH_SYNONYMS,
    ROUTE_SYNONYMS,
};
use crate::parse::table::extract_table;
use crate::parse::values::{parse_axles, parse_length_km};

/// Last numeric length seen in the current pass. Continuation rows often
/// leave the length cell blank.
#[derive(Debug, Default, Clone, Copy)]
pub struct LengthCarry {
    last: Option<i64>,
}

impl LengthCarry {
    pub fn resolve(&mut self, parsed: Option<i64>) -> Option<i64> {
        match parsed {
            Some(km) => {
                self.last = Some(km);
                Some(km)
            }
            None => self.last,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BaseColumns {
    route: Option<usize>,
    length: Option<usize>,
    effective_from: Option<usize>,
}

impl BaseColumns {
    fn locate(top: &[String]) -> Self {
        Self {
            route: find_column(top, ROUTE_SYNONYMS),
            length: find_column(top, LENGTH_SYNONYMS),
            effective_from: find_column(top, EFFECTIVE_FROM_SYNONYMS),
        }
    }

    fn contains(&self, col: usize) -> bool {
        [self.route, self.length, self.effective_from].contains(&Some(col))
    }
}

/// Full parse: document → table → header grid → records.
pub fn parse_tariff_table(html: &str) -> IngestResult<Vec<NormalizedRecord>> {
    let rows = extract_table(html)?;
    let grid = build_header_grid(&rows)?;
    let data = rows.get(grid.header_rows..).unwrap_or(&[]);
    Ok(normalize_rows(&grid, data))
}

pub fn normalize_rows(grid: &HeaderGrid, data_rows: &[TableRow]) -> Vec<NormalizedRecord> {
    let base = BaseColumns::locate(&grid.top);
    let width = grid.width();
    let mut carry = LengthCarry::default();
    let mut out = Vec::new();

    for cells in data_rows {
        let row = expand_row(cells, width);
        normalize_row(grid, base, &row, &mut carry, &mut out);
    }
    out
}

fn normalize_row(
    grid: &HeaderGrid,
    base: BaseColumns,
    row: &[String],
    carry: &mut LengthCarry,
    out: &mut Vec<NormalizedRecord>,
) {
    let cell = |idx: Option<usize>| idx.map(|i| row[i].trim()).unwrap_or("");

    let route = cell(base.route);
    if route.is_empty() {
        return;
    }
    let length_text = cell(base.length);
    let length_km = carry.resolve(parse_length_km(length_text));
    let effective_from = cell(base.effective_from);

    for (col, value) in row.iter().enumerate() {
        if base.contains(col) {
            continue;
        }
        let class = grid.top[col].trim();
        let tariff = value.trim();
        if class.is_empty() || tariff.is_empty() {
            continue;
        }
        let axles_text = match grid.bottom[col].trim() {
            "" => class,
            label => label,
        };
        out.push(NormalizedRecord {
            route: route.to_string(),
            length_km,
            length_text: length_text.to_string(),
            effective_from: effective_from.to_string(),
            class: class.to_string(),
            axles: parse_axles(axles_text),
            axles_text: axles_text.to_string(),
            tariff_text: tariff.to_string(),
        });
    }
}

/// Distinct non-empty route names, for the route-count sanity check.
pub fn distinct_routes(records: &[NormalizedRecord]) -> usize {
    records
        .iter()
        .map(|r| r.route.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableCell;

    fn grid(top: &[&str], bottom: &[&str]) -> HeaderGrid {
        HeaderGrid {
            top: top.iter().map(|s| s.to_string()).collect(),
            bottom: bottom.iter().map(|s| s.to_string()).collect(),
            spans_both: vec![false; top.len()],
            header_rows: 2,
        }
    }

    fn row(cells: &[&str]) -> TableRow {
        cells.iter().map(|c| TableCell::new(*c)).collect()
    }

    #[test]
    fn data_row_fans_out_per_class_column() {
        let g = grid(
            &["Vía", "Long Km", "Vigente desde", "AUTOMÓVIL", "AUTOMÓVIL"],
            &["", "", "", "2 EJES", "3 EJES"],
        );
        let recs = normalize_rows(
            &g,
            &[row(&["Ruta 1", "120", "2024-01-01", "$50.00", "$75.00"])],
        );
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].route, "Ruta 1");
        assert_eq!(recs[0].length_km, Some(120));
        assert_eq!(recs[0].effective_from, "2024-01-01");
        assert_eq!(recs[0].class, "AUTOMÓVIL");
        assert_eq!(recs[0].axles, Some(2));
        assert_eq!(recs[0].tariff_text, "$50.00");
        assert_eq!(recs[1].axles, Some(3));
        assert_eq!(recs[1].tariff_text, "$75.00");
    }

    #[test]
    fn length_is_carried_forward_only() {
        let g = grid(&["Vía", "Long Km", "Camión"], &["", "", "5 ejes"]);
        let recs = normalize_rows(
            &g,
            &[
                row(&["Ruta A", "", "10"]),
                row(&["Ruta A", "85 kms", "11"]),
                row(&["Ruta B", "", "12"]),
                row(&["Ruta C", "N/D", "13"]),
            ],
        );
        let lengths: Vec<_> = recs.iter().map(|r| r.length_km).collect();
        assert_eq!(lengths, vec![None, Some(85), Some(85), Some(85)]);
        assert_eq!(recs[2].length_text, "");
    }

    #[test]
    fn empty_route_and_empty_cells_are_skipped() {
        let g = grid(&["Vía", "Moto", "Auto"], &["", "", ""]);
        let recs = normalize_rows(
            &g,
            &[row(&["", "1", "2"]), row(&["Ruta 9", "", "30"])],
        );
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].class, "Auto");
        // no bottom label: the class label doubles as axle text
        assert_eq!(recs[0].axles_text, "Auto");
        assert_eq!(recs[0].axles, None);
    }

    #[test]
    fn short_and_long_rows_are_fitted() {
        let g = grid(&["Vía", "Auto", "Bus"], &["", "2", "3"]);
        let recs = normalize_rows(
            &g,
            &[row(&["Ruta 1", "5"]), row(&["Ruta 2", "6", "7", "overflow"])],
        );
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[2].tariff_text, "7");
    }

    #[test]
    fn carry_accumulator_resets_per_pass() {
        let g = grid(&["Vía", "Long Km", "Auto"], &["", "", ""]);
        let first = normalize_rows(&g, &[row(&["R", "40", "1"])]);
        let second = normalize_rows(&g, &[row(&["R", "", "1"])]);
        assert_eq!(first[0].length_km, Some(40));
        assert_eq!(second[0].length_km, None);
    }

    #[test]
    fn distinct_route_count() {
        let g = grid(&["Vía", "Auto", "Bus"], &["", "", ""]);
        let recs = normalize_rows(
            &g,
            &[row(&["R1", "1", "2"]), row(&["R2", "3", ""]), row(&["R1", "4", "5"])],
        );
        assert_eq!(distinct_routes(&recs), 2);
    }
}

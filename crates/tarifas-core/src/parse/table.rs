use crate::errors::{IngestError, IngestResult};
use crate::model::{TableCell, TableRow};
use crate::parse::header::{find_column, LENGTH_SYNONYMS, ROUTE_SYNONYMS};
use scraper::{ElementRef, Html, Selector};

/// Banner the portal serves instead of the table when it is overloaded.
pub const SERVICE_UNAVAILABLE_MARKER: &str =
    "Disculpe usted, pero por el momento no podemos atenderlo";

const MAX_SPAN: usize = 1000;

fn selector(css: &str) -> IngestResult<Selector> {
    Selector::parse(css)
        .map_err(|e| IngestError::unexpected_format(format!("bad selector {css}: {e:?}")))
}

/// Extracts the rows of the largest `<table>` in the document.
pub fn extract_table(html: &str) -> IngestResult<Vec<TableRow>> {
    if html.contains(SERVICE_UNAVAILABLE_MARKER) {
        return Err(IngestError::unexpected_format(
            "portal answered with its service-unavailable page",
        ));
    }

    let doc = Html::parse_document(html);
    let table_sel = selector("table")?;
    let tr_sel = selector("tr")?;

    let mut best: Option<(usize, ElementRef)> = None;
    for table in doc.select(&table_sel) {
        let n = table.select(&tr_sel).count();
        if best.as_ref().map_or(true, |(m, _)| n > *m) {
            best = Some((n, table));
        }
    }
    let (_, table) = best.ok_or_else(|| IngestError::unexpected_format("document has no tables"))?;

    let rows: Vec<TableRow> = table
        .select(&tr_sel)
        .map(row_cells)
        .filter(|cells| !cells.is_empty())
        .collect();

    if rows.is_empty() {
        return Err(IngestError::unexpected_format("largest table has no cells"));
    }
    Ok(rows)
}

/// Cheap probe used while retrying portal requests: route and length
/// headers present in the first row of the largest table.
pub fn looks_like_tariff_table(html: &str) -> bool {
    let rows = match extract_table(html) {
        Ok(rows) if rows.len() >= 2 => rows,
        _ => return false,
    };
    let labels: Vec<String> = rows[0].iter().map(|c| c.text.clone()).collect();
    let has_route = find_column(&labels, ROUTE_SYNONYMS).is_some();
    let has_length = find_column(&labels, LENGTH_SYNONYMS).is_some()
        || labels.iter().any(|l| l.to_lowercase().contains("km"));
    has_route && has_length
}

fn row_cells(tr: ElementRef) -> TableRow {
    tr.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "th" | "td"))
        .map(|el| TableCell {
            text: cell_text(el),
            colspan: span_attr(el, "colspan"),
            rowspan: span_attr(el, "rowspan"),
        })
        .collect()
}

fn cell_text(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn span_attr(el: ElementRef, name: &str) -> usize {
    el.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map_or(1, |n| n.min(MAX_SPAN))
}

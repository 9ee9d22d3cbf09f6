//! Read surfaces over the `vw_tariff_*` views.

use crate::model::{SnapshotRow, TariffRow};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use serde::Serialize;
use std::str::FromStr;

pub const DEFAULT_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TariffView {
    Current,
    History,
    #[default]
    Snapshot,
}

impl TariffView {
    pub fn view_name(&self) -> &'static str {
        match self {
            TariffView::Current => "vw_tariff_current",
            TariffView::History => "vw_tariff_history",
            TariffView::Snapshot => "vw_tariff_snapshot",
        }
    }

    /// Column holding the date the filters and ordering apply to.
    fn date_column(&self) -> &'static str {
        match self {
            TariffView::Snapshot => "capture_date",
            TariffView::Current | TariffView::History => "effective_from",
        }
    }
}

impl FromStr for TariffView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "current" | "vigente" | "vw_tariff_current" => Ok(TariffView::Current),
            "history" | "hist" | "vw_tariff_history" => Ok(TariffView::History),
            "snapshot" | "snap" | "vw_tariff_snapshot" => Ok(TariffView::Snapshot),
            other => Err(format!(
                "unknown view '{}' (expected current|history|snapshot)",
                other
            )),
        }
    }
}

/// Row limit; `None` returns everything.
pub fn parse_limit(s: &str) -> Option<u32> {
    match s.trim().to_lowercase().as_str() {
        "all" | "todo" | "todos" | "inf" | "infinity" | "0" => None,
        other => Some(other.parse().unwrap_or(DEFAULT_LIMIT)),
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// Substring match on the route name.
    pub route_like: Option<String>,
    /// Exact date (capture date for snapshots, effective_from otherwise).
    pub date: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewStats {
    pub total: i64,
    pub latest_date: Option<String>,
}

fn build_where(view: TariffView, f: &QueryFilter) -> (String, Vec<Value>) {
    let date_col = view.date_column();
    let mut clauses = Vec::new();
    let mut args = Vec::new();

    if let Some(q) = f.route_like.as_deref().filter(|q| !q.trim().is_empty()) {
        clauses.push("route LIKE ?".to_string());
        args.push(Value::Text(format!("%{}%", q.trim())));
    }
    if let Some(d) = f.date.as_deref() {
        clauses.push(format!("{} = ?", date_col));
        args.push(Value::Text(d.to_string()));
    }
    if let Some(d) = f.date_from.as_deref() {
        clauses.push(format!("{} >= ?", date_col));
        args.push(Value::Text(d.to_string()));
    }
    if let Some(d) = f.date_to.as_deref() {
        clauses.push(format!("{} <= ?", date_col));
        args.push(Value::Text(d.to_string()));
    }

    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (sql, args)
}

fn select_sql(view: TariffView, columns: &str, f: &QueryFilter) -> (String, Vec<Value>) {
    let (where_sql, args) = build_where(view, f);
    let limit_sql = f.limit.map(|n| format!("LIMIT {}", n)).unwrap_or_default();
    let sql = format!(
        "SELECT {} FROM {} {} ORDER BY {} DESC, route ASC, class ASC {}",
        columns,
        view.view_name(),
        where_sql,
        view.date_column(),
        limit_sql
    );
    (sql, args)
}

const TARIFF_COLUMNS: &str =
    "definition_id, route, length_km, class, axles, tariff, effective_from, effective_until, source";
const SNAPSHOT_COLUMNS: &str =
    "run_id, capture_date, route, length_km, class, axles, tariff, effective_from, source";

fn tariff_row(r: &Row) -> rusqlite::Result<TariffRow> {
    Ok(TariffRow {
        definition_id: r.get(0)?,
        route: r.get(1)?,
        length_km: r.get(2)?,
        class: r.get(3)?,
        axles: r.get(4)?,
        tariff: r.get(5)?,
        effective_from: r.get(6)?,
        effective_until: r.get(7)?,
        source: r.get(8)?,
    })
}

fn snapshot_row(r: &Row) -> rusqlite::Result<SnapshotRow> {
    Ok(SnapshotRow {
        run_id: r.get(0)?,
        capture_date: r.get(1)?,
        route: r.get(2)?,
        length_km: r.get(3)?,
        class: r.get(4)?,
        axles: r.get(5)?,
        tariff: r.get(6)?,
        effective_from: r.get(7)?,
        source: r.get(8)?,
    })
}

/// Current or historical tariffs, newest `effective_from` first.
pub fn tariffs(conn: &Connection, view: TariffView, f: &QueryFilter) -> rusqlite::Result<Vec<TariffRow>> {
    let view = match view {
        TariffView::Snapshot => TariffView::History,
        v => v,
    };
    let (sql, args) = select_sql(view, TARIFF_COLUMNS, f);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), tariff_row)?;
    rows.collect()
}

pub fn snapshots(conn: &Connection, f: &QueryFilter) -> rusqlite::Result<Vec<SnapshotRow>> {
    let (sql, args) = select_sql(TariffView::Snapshot, SNAPSHOT_COLUMNS, f);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), snapshot_row)?;
    rows.collect()
}

/// Row count and latest date of a view, ignoring filters.
pub fn view_stats(conn: &Connection, view: TariffView) -> rusqlite::Result<ViewStats> {
    conn.query_row(
        &format!(
            "SELECT COUNT(*), MAX({}) FROM {}",
            view.date_column(),
            view.view_name()
        ),
        [],
        |r| {
            Ok(ViewStats {
                total: r.get(0)?,
                latest_date: r.get(1)?,
            })
        },
    )
}

use super::{db_path, exit_codes};
use crate::cli::args::QueryArgs;
use tarifas_core::config::IngestConfig;
use tarifas_core::model::{SnapshotRow, TariffRow};
use tarifas_core::storage::query::{parse_limit, QueryFilter, TariffView};
use tarifas_core::storage::Store;

pub fn run(args: QueryArgs, cfg: &IngestConfig) -> anyhow::Result<i32> {
    let view: TariffView = match args.view.parse() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let db = db_path(args.db.as_ref(), cfg);
    if !db.exists() {
        eprintln!("config error: database {} not found (run `tarifas ingest` first)", db.display());
        return Ok(exit_codes::CONFIG_ERROR);
    }
    let store = Store::open(&db)?;
    store.init_schema()?;

    let filter = QueryFilter {
        route_like: args.route.clone(),
        date: args.date.clone(),
        date_from: args.from.clone(),
        date_to: args.to.clone(),
        limit: parse_limit(&args.limit),
    };
    let stats = store.view_stats(view)?;

    match view {
        TariffView::Snapshot => {
            let rows = store.snapshot_tariffs(&filter)?;
            if args.format == "json" {
                let out = serde_json::json!({ "view": view, "stats": stats, "rows": rows });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_snapshot_rows(&rows);
            }
        }
        TariffView::Current | TariffView::History => {
            let rows = if view == TariffView::Current {
                store.current_tariffs(&filter)?
            } else {
                store.historical_tariffs(&filter)?
            };
            if args.format == "json" {
                let out = serde_json::json!({ "view": view, "stats": stats, "rows": rows });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_tariff_rows(&rows);
            }
        }
    }

    if args.format != "json" {
        eprintln!(
            "{} rows in {} (latest {})",
            stats.total,
            view.view_name(),
            stats.latest_date.as_deref().unwrap_or("-")
        );
    }
    Ok(exit_codes::OK)
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

fn print_tariff_rows(rows: &[TariffRow]) {
    println!(
        "{:<40} {:>6} {:<20} {:>5} {:>10} {:<10} {:<10}",
        "route", "km", "class", "axles", "tariff", "from", "until"
    );
    for r in rows {
        println!(
            "{:<40} {:>6} {:<20} {:>5} {:>10.2} {:<10} {:<10}",
            r.route,
            opt(r.length_km),
            r.class,
            opt(r.axles),
            r.tariff,
            opt(r.effective_from.as_deref()),
            opt(r.effective_until.as_deref())
        );
    }
}

fn print_snapshot_rows(rows: &[SnapshotRow]) {
    println!(
        "{:<10} {:<40} {:>6} {:<20} {:>5} {:>10} {:<10}",
        "captured", "route", "km", "class", "axles", "tariff", "from"
    );
    for r in rows {
        println!(
            "{:<10} {:<40} {:>6} {:<20} {:>5} {:>10.2} {:<10}",
            r.capture_date,
            r.route,
            opt(r.length_km),
            r.class,
            opt(r.axles),
            r.tariff,
            opt(r.effective_from.as_deref())
        );
    }
}

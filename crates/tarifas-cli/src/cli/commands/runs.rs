use super::{db_path, exit_codes};
use crate::cli::args::RunsArgs;
use tarifas_core::config::IngestConfig;
use tarifas_core::storage::Store;

pub fn run(args: RunsArgs, cfg: &IngestConfig) -> anyhow::Result<i32> {
    let db = db_path(args.db.as_ref(), cfg);
    if !db.exists() {
        eprintln!("config error: database {} not found", db.display());
        return Ok(exit_codes::CONFIG_ERROR);
    }
    let store = Store::open(&db)?;
    store.init_schema()?;
    let runs = store.recent_runs(args.limit)?;

    if args.format == "json" {
        let out: Vec<_> = runs
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "started_at": r.started_at,
                    "finished_at": r.finished_at,
                    "status": r.status,
                    "params": parse_json(r.params_json.as_deref()),
                    "summary": parse_json(r.summary_json.as_deref()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(exit_codes::OK);
    }

    println!("{:>5} {:<32} {:<32} status", "id", "started_at", "finished_at");
    for r in &runs {
        println!(
            "{:>5} {:<32} {:<32} {}",
            r.id,
            r.started_at,
            r.finished_at.as_deref().unwrap_or("-"),
            r.status
        );
    }

    let stats = store.stats_best_effort()?;
    let last = match (stats.last_run_id, stats.last_run_status.as_deref()) {
        (Some(id), Some(status)) => format!(" (last #{} {})", id, status),
        _ => String::new(),
    };
    eprintln!(
        "{} routes, {} definitions, {} history entries, {} snapshots over {} runs{}",
        stats.routes, stats.definitions, stats.history_entries, stats.snapshots, stats.runs, last
    );
    Ok(exit_codes::OK)
}

fn parse_json(raw: Option<&str>) -> serde_json::Value {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or(serde_json::Value::Null)
}

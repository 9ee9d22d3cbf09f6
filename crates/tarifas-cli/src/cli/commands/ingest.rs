use super::{db_path, ensure_parent_dir, exit_codes};
use crate::cli::args::IngestArgs;
use crate::fetch::{Fetcher, FileFetcher, HttpFetcher};
use anyhow::Context;
use chrono::NaiveDate;
use tarifas_core::config::IngestConfig;
use tarifas_core::engine::{IngestOptions, Ingestor};
use tarifas_core::model::IngestSummary;
use tarifas_core::storage::Store;

pub async fn run(args: IngestArgs, mut cfg: IngestConfig) -> anyhow::Result<i32> {
    if let Some(n) = args.min_routes {
        cfg.min_routes = n;
    }
    if let Some(tag) = &args.source_tag {
        cfg.source_tag = tag.clone();
    }
    if let Some(dir) = &args.diagnostics_dir {
        cfg.diagnostics_dir = Some(dir.clone());
    }
    if args.no_diagnostics {
        cfg.diagnostics_dir = None;
    }
    if args.no_raw {
        cfg.save_raw = false;
    }

    let capture_date = match args.capture_date.as_deref() {
        Some(raw) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(d) => d,
            Err(e) => {
                eprintln!("config error: invalid --capture-date {:?}: {}", raw, e);
                return Ok(exit_codes::CONFIG_ERROR);
            }
        },
        None => chrono::Local::now().date_naive(),
    };

    let fetcher: Box<dyn Fetcher> = match &args.html_file {
        Some(path) => Box::new(FileFetcher::new(path.clone())),
        None => Box::new(HttpFetcher::new(&cfg.fetch, cfg.diagnostics_dir.clone())?),
    };
    let html = match fetcher.fetch().await {
        Ok(html) => html,
        Err(e) => {
            eprintln!("ingest failed: fetch error: {:#}", e);
            return Ok(exit_codes::INGEST_FAILED);
        }
    };

    let db = db_path(args.db.as_ref(), &cfg);
    ensure_parent_dir(&db)?;
    let store = Store::open(&db).with_context(|| format!("opening {}", db.display()))?;
    store.init_schema()?;

    let ingestor = Ingestor::new(store, IngestOptions::from(&cfg));
    let result = tokio::task::spawn_blocking(move || ingestor.run_at(&html, capture_date)).await?;

    match result {
        Ok(summary) => {
            print_summary(&summary, &args.format)?;
            Ok(exit_codes::OK)
        }
        Err(e) => {
            eprintln!("ingest failed: {}", e);
            Ok(exit_codes::INGEST_FAILED)
        }
    }
}

fn print_summary(summary: &IngestSummary, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!(
            "run {}: {} records over {} routes, {} snapshots, {} new history entries, {} skipped",
            summary.run_id,
            summary.records,
            summary.distinct_routes,
            summary.snapshots,
            summary.new_history,
            summary.skipped
        );
    }
    Ok(())
}

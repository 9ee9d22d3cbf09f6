use super::args::*;
use std::path::{Path, PathBuf};
use tarifas_core::config::{load_or_default, write_sample_config, IngestConfig};

pub mod ingest;
pub mod query;
pub mod runs;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const INGEST_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    if let Command::Version = cli.cmd {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(exit_codes::OK);
    }
    if let Command::Init(args) = &cli.cmd {
        return cmd_init(&cli.config, args);
    }

    let cfg = match load_config(&cli.config, cli.strict_config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    match cli.cmd {
        Command::Ingest(args) => ingest::run(args, cfg).await,
        Command::Query(args) => query::run(args, &cfg),
        Command::Runs(args) => runs::run(args, &cfg),
        Command::Init(_) | Command::Version => Ok(exit_codes::OK),
    }
}

/// File (or defaults) plus `TARIFAS_*` overrides.
fn load_config(path: &Path, strict: bool) -> anyhow::Result<IngestConfig> {
    let mut cfg = load_or_default(path, strict)?;
    cfg.apply_env();
    tracing::debug!(event = "config_loaded", path = %path.display(), db = %cfg.db_path.display());
    Ok(cfg)
}

fn cmd_init(config: &Path, args: &InitArgs) -> anyhow::Result<i32> {
    if config.exists() && !args.force {
        eprintln!("note: {} already exists (use --force to overwrite)", config.display());
        return Ok(exit_codes::OK);
    }
    ensure_parent_dir(config)?;
    write_sample_config(config)?;
    eprintln!("created {}", config.display());
    Ok(exit_codes::OK)
}

pub(crate) fn db_path(arg: Option<&PathBuf>, cfg: &IngestConfig) -> PathBuf {
    arg.cloned().unwrap_or_else(|| cfg.db_path.clone())
}

pub(crate) fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tarifas",
    version,
    about = "Toll-tariff table ingestion with SCD2 history"
)]
pub struct Cli {
    /// YAML config; a missing file falls back to defaults
    #[arg(long, global = true, default_value = "tarifas.yaml")]
    pub config: PathBuf,

    /// fail on unknown config keys instead of warning
    #[arg(long, global = true)]
    pub strict_config: bool,

    /// tracing filter, e.g. `info` or `tarifas_core=debug`
    #[arg(long, global = true, env = "TARIFAS_LOG", default_value = "warn")]
    pub log: String,

    /// log format: text|json
    #[arg(long, global = true, default_value = "text")]
    pub log_format: String,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch (or read) the tariff page and persist it as a new run
    Ingest(IngestArgs),
    /// Print current, historical or snapshot tariffs
    Query(QueryArgs),
    /// List recent ingestion runs
    Runs(RunsArgs),
    /// Write a sample config
    Init(InitArgs),
    Version,
}

#[derive(Parser, Clone)]
pub struct IngestArgs {
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// replay a saved page instead of querying the portal
    #[arg(long)]
    pub html_file: Option<PathBuf>,

    /// minimum distinct routes expected (0 disables the check)
    #[arg(long)]
    pub min_routes: Option<usize>,

    #[arg(long)]
    pub source_tag: Option<String>,

    /// capture date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub capture_date: Option<String>,

    /// skip raw capture rows
    #[arg(long)]
    pub no_raw: bool,

    #[arg(long)]
    pub diagnostics_dir: Option<PathBuf>,

    /// do not save rejected or fetched pages
    #[arg(long, conflicts_with = "diagnostics_dir")]
    pub no_diagnostics: bool,

    /// text|json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Parser, Clone)]
pub struct QueryArgs {
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// current|history|snapshot
    #[arg(long, default_value = "snapshot")]
    pub view: String,

    /// substring filter on route name
    #[arg(long)]
    pub route: Option<String>,

    /// exact date (capture date for snapshots, effective_from otherwise)
    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub from: Option<String>,

    #[arg(long)]
    pub to: Option<String>,

    /// row limit; `all` for everything
    #[arg(long, default_value = "100")]
    pub limit: String,

    /// text|json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Parser, Clone)]
pub struct RunsArgs {
    #[arg(long)]
    pub db: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    pub limit: u32,

    /// text|json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Parser, Clone)]
pub struct InitArgs {
    /// overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

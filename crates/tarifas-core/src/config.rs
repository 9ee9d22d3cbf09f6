use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

pub const DEFAULT_DIAGNOSTICS_DIR: &str = "debug";

pub const DEFAULT_FORM_URL: &str =
    "https://app.sct.gob.mx/sibuac_internet/ControllerUI?action=CmdSelTarifaRep1Data";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub version: u32,
    pub db_path: PathBuf,
    pub source_tag: String,
    /// Abort when fewer distinct routes are parsed. `0` disables the check.
    pub min_routes: usize,
    pub save_raw: bool,
    pub repair_stale_runs: bool,
    /// Where rejected and fetched pages are saved; `null` disables dumps.
    pub diagnostics_dir: Option<PathBuf>,
    pub fetch: FetchConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            db_path: PathBuf::from("tarifas.sqlite"),
            source_tag: "SIBUAC".to_string(),
            min_routes: 120,
            save_raw: true,
            repair_stale_runs: true,
            diagnostics_dir: Some(PathBuf::from(DEFAULT_DIAGNOSTICS_DIR)),
            fetch: FetchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub form_url: String,
    /// `action=` values tried in order when submitting the query form.
    pub action_variants: Vec<String>,
    pub timeout_seconds: u64,
    pub post_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            form_url: DEFAULT_FORM_URL.to_string(),
            action_variants: [
                "CmdTarifaRep1Data",
                "cmdTarifaRep1Data",
                "CmdTarifaRep1",
                "cmdTarifaRep1",
                "CmdImpTarifasRep1Data",
                "cmdImpTarifasRep1Data",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            timeout_seconds: 30,
            post_timeout_seconds: 60,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string(),
        }
    }
}

impl IngestConfig {
    /// Applies `TARIFAS_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(v) = env::var("TARIFAS_DB") {
            self.db_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("TARIFAS_MIN_ROUTES") {
            if let Ok(n) = v.parse() {
                self.min_routes = n;
            }
        }
        if let Ok(v) = env::var("TARIFAS_SOURCE_TAG") {
            self.source_tag = v;
        }
        if let Ok(v) = env::var("TARIFAS_DIAGNOSTICS_DIR") {
            // empty value disables dumps
            self.diagnostics_dir = (!v.trim().is_empty()).then(|| PathBuf::from(v));
        }
    }

    pub fn min_routes_threshold(&self) -> Option<usize> {
        (self.min_routes > 0).then_some(self.min_routes)
    }
}

pub fn load_config(path: &Path, strict: bool) -> Result<IngestConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    parse_config(&raw, strict)
        .map_err(|ConfigError(msg)| ConfigError(format!("{} (file: {})", msg, path.display())))
}

/// Missing file → defaults; an existing file must parse.
pub fn load_or_default(path: &Path, strict: bool) -> Result<IngestConfig, ConfigError> {
    if path.exists() {
        load_config(path, strict)
    } else {
        Ok(IngestConfig::default())
    }
}

pub fn parse_config(raw: &str, strict: bool) -> Result<IngestConfig, ConfigError> {
    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);

    let cfg: IngestConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    let meaningful: Vec<_> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();
    if !meaningful.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "Unknown fields detected in strict mode: {:?}",
                meaningful
            )));
        }
        tracing::warn!(event = "config_unknown_fields", fields = ?meaningful);
    }

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }
    if cfg.source_tag.trim().is_empty() {
        return Err(ConfigError("source_tag must not be empty".into()));
    }

    Ok(cfg)
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"version: 1
db_path: tarifas.sqlite
source_tag: SIBUAC
# abort when the table lists fewer distinct routes (0 disables)
min_routes: 120
save_raw: true
repair_stale_runs: true
# rejected pages are saved here; null disables
diagnostics_dir: debug
fetch:
  form_url: "https://app.sct.gob.mx/sibuac_internet/ControllerUI?action=CmdSelTarifaRep1Data"
  timeout_seconds: 30
  post_timeout_seconds: 60
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}

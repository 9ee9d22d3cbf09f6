use serde::{Deserialize, Serialize};

/// Fallback vehicle class name when the source label is blank.
pub const NO_CLASS: &str = "SIN CLASE";

/// One `th`/`td` cell with its text and spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCell {
    pub text: String,
    pub colspan: usize,
    pub rowspan: usize,
}

impl TableCell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            colspan: 1,
            rowspan: 1,
        }
    }

    pub fn spans(mut self, colspan: usize, rowspan: usize) -> Self {
        self.colspan = colspan.max(1);
        self.rowspan = rowspan.max(1);
        self
    }
}

pub type TableRow = Vec<TableCell>;

/// Two aligned logical header rows of uniform width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderGrid {
    pub top: Vec<String>,
    pub bottom: Vec<String>,
    /// Columns whose row-0 cell spans both header rows.
    pub spans_both: Vec<bool>,
    /// Number of source rows consumed by the header (1 or 2).
    pub header_rows: usize,
}

impl HeaderGrid {
    pub fn width(&self) -> usize {
        self.top.len()
    }

    pub fn has_bottom_labels(&self) -> bool {
        self.bottom.iter().any(|s| !s.is_empty())
    }
}

/// Flat record emitted per (data row, tariff column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub route: String,
    pub length_km: Option<i64>,
    /// Length cell exactly as published (empty on continuation rows).
    pub length_text: String,
    pub effective_from: String,
    pub class: String,
    pub axles: Option<i64>,
    pub axles_text: String,
    pub tariff_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Ok,
    Error(String),
}

impl RunStatus {
    pub fn as_db_string(&self) -> String {
        match self {
            RunStatus::Running => "RUNNING".to_string(),
            RunStatus::Ok => "OK".to_string(),
            RunStatus::Error(msg) => format!("ERROR:{}", msg),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "RUNNING" => RunStatus::Running,
            "OK" => RunStatus::Ok,
            other => RunStatus::Error(
                other
                    .strip_prefix("ERROR:")
                    .unwrap_or(other)
                    .trim()
                    .to_string(),
            ),
        }
    }
}

/// Serialized into `ingestion_run.params_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParameters {
    pub capture_date: String,
    pub source_tag: String,
    pub min_routes: Option<usize>,
    pub html_bytes: usize,
    pub html_sha256: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub run_id: i64,
    pub records: usize,
    pub distinct_routes: usize,
    pub snapshots: usize,
    pub new_history: usize,
    pub skipped: usize,
}

// --- read surfaces ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffRow {
    pub definition_id: i64,
    pub route: String,
    pub length_km: Option<i64>,
    pub class: String,
    pub axles: Option<i64>,
    pub tariff: f64,
    pub effective_from: Option<String>,
    pub effective_until: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub run_id: Option<i64>,
    pub capture_date: String,
    pub route: String,
    pub length_km: Option<i64>,
    pub class: String,
    pub axles: Option<i64>,
    pub tariff: f64,
    pub effective_from: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRow {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
    pub params_json: Option<String>,
    pub summary_json: Option<String>,
}

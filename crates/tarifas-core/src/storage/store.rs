use crate::errors::{IngestError, IngestResult};
use crate::model::{IngestSummary, NormalizedRecord, RunParameters, RunRow, RunStatus, SnapshotRow, TariffRow};
use crate::storage::history::{self, HistoryChange, Observation};
use crate::storage::ledger::{self, SnapshotEntry};
use crate::storage::query::{self, QueryFilter, TariffView, ViewStats};
use crate::storage::resolver::{self, DefinitionKey};
use anyhow::Context;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

pub struct StoreStats {
    pub routes: u64,
    pub definitions: u64,
    pub history_entries: u64,
    pub snapshots: u64,
    pub runs: u64,
    pub last_run_id: Option<i64>,
    pub last_run_status: Option<String>,
}

/// A typed record ready to be persisted.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRecord<'a> {
    pub record: &'a NormalizedRecord,
    pub tariff: f64,
    /// `effective_from`, or the capture date when the source left it blank.
    pub effective_from: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub definition_id: i64,
    pub change: HistoryChange,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get::<_, String>(0))
            .context("failed to enable WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        // SQLite in-memory DB
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    fn lock(&self) -> IngestResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| IngestError::persistence("store connection lock poisoned"))
    }

    // --- run ledger ---

    pub fn begin_run(&self, params: &RunParameters) -> IngestResult<i64> {
        let conn = self.lock()?;
        Ok(ledger::begin_run(&conn, &now_rfc3339(), params)?)
    }

    pub fn finalize_run(
        &self,
        run_id: i64,
        status: &RunStatus,
        summary: Option<&IngestSummary>,
    ) -> IngestResult<()> {
        let conn = self.lock()?;
        Ok(ledger::finalize_run(&conn, run_id, &now_rfc3339(), status, summary)?)
    }

    pub fn mark_stale_runs(&self) -> IngestResult<usize> {
        let conn = self.lock()?;
        Ok(ledger::mark_stale_runs(&conn)?)
    }

    pub fn recent_runs(&self, limit: u32) -> anyhow::Result<Vec<RunRow>> {
        let conn = self.lock()?;
        Ok(ledger::recent_runs(&conn, limit)?)
    }

    pub fn insert_raw_capture(&self, run_id: i64, rec: &NormalizedRecord) -> IngestResult<()> {
        let conn = self.lock()?;
        Ok(ledger::insert_raw_capture(&conn, run_id, rec, &now_rfc3339())?)
    }

    /// Resolves dimensions, writes the snapshot and advances history for one
    /// record inside a single transaction.
    pub fn persist_record(
        &self,
        run_id: i64,
        capture_date: &str,
        source: &str,
        rec: &ResolvedRecord,
    ) -> IngestResult<RecordOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let definition_id = resolver::resolve_definition(
            &tx,
            &DefinitionKey {
                route: &rec.record.route,
                length_km: rec.record.length_km,
                class: &rec.record.class,
                axles: rec.record.axles,
            },
        )?;

        ledger::insert_snapshot(
            &tx,
            &SnapshotEntry {
                definition_id,
                run_id,
                capture_date,
                effective_from: rec.effective_from,
                tariff: rec.tariff,
                source,
            },
        )?;

        let change = history::record_observation(
            &tx,
            run_id,
            &Observation {
                definition_id,
                tariff: rec.tariff,
                effective_from: rec.effective_from,
                source,
            },
        )?;

        tx.commit()?;
        Ok(RecordOutcome {
            definition_id,
            change,
        })
    }

    // --- read surfaces ---

    pub fn current_tariffs(&self, filter: &QueryFilter) -> anyhow::Result<Vec<TariffRow>> {
        let conn = self.lock()?;
        Ok(query::tariffs(&conn, TariffView::Current, filter)?)
    }

    pub fn historical_tariffs(&self, filter: &QueryFilter) -> anyhow::Result<Vec<TariffRow>> {
        let conn = self.lock()?;
        Ok(query::tariffs(&conn, TariffView::History, filter)?)
    }

    pub fn snapshot_tariffs(&self, filter: &QueryFilter) -> anyhow::Result<Vec<SnapshotRow>> {
        let conn = self.lock()?;
        Ok(query::snapshots(&conn, filter)?)
    }

    pub fn view_stats(&self, view: TariffView) -> anyhow::Result<ViewStats> {
        let conn = self.lock()?;
        Ok(query::view_stats(&conn, view)?)
    }

    pub fn stats_best_effort(&self) -> anyhow::Result<StoreStats> {
        let conn = self.lock()?;
        let count = |table: &str| -> u64 {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
                r.get::<_, i64>(0)
            })
            .map(|n| n as u64)
            .unwrap_or(0)
        };

        let last: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, status FROM ingestion_run ORDER BY id DESC LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .ok();

        Ok(StoreStats {
            routes: count("route"),
            definitions: count("tariff_definition"),
            history_entries: count("tariff_history"),
            snapshots: count("tariff_snapshot"),
            runs: count("ingestion_run"),
            last_run_id: last.as_ref().map(|(id, _)| *id),
            last_run_status: last.map(|(_, s)| s),
        })
    }

    pub fn count_rows(&self, table: &str) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        // Validation to prevent SQL injection (simple allowlist)
        if ![
            "route",
            "vehicle_class",
            "tariff_definition",
            "tariff_history",
            "tariff_snapshot",
            "tariff_snapshot_raw",
            "ingestion_run",
            "ingestion_run_item",
        ]
        .contains(&table)
        {
            anyhow::bail!("Invalid table name for count_rows: {}", table);
        }
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let n: i64 = conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(n)
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

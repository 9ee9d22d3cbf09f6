//! Append-only provenance: ingestion runs, raw captures and snapshots.

use crate::model::{IngestSummary, NormalizedRecord, RunParameters, RunRow, RunStatus};
use rusqlite::{params, Connection};

pub fn begin_run(conn: &Connection, started_at: &str, params: &RunParameters) -> rusqlite::Result<i64> {
    let params_json = serde_json::to_string(params)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO ingestion_run(started_at, params_json, status) VALUES (?1, ?2, ?3)",
        params![started_at, params_json, RunStatus::Running.as_db_string()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn finalize_run(
    conn: &Connection,
    run_id: i64,
    finished_at: &str,
    status: &RunStatus,
    summary: Option<&IngestSummary>,
) -> rusqlite::Result<()> {
    let summary_json = summary
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "UPDATE ingestion_run SET status = ?1, finished_at = ?2, summary_json = ?3 WHERE id = ?4",
        params![status.as_db_string(), finished_at, summary_json, run_id],
    )?;
    Ok(())
}

/// Marks runs left `RUNNING` by an aborted process as interrupted.
pub fn mark_stale_runs(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE ingestion_run SET status = ?1 WHERE status = ?2",
        params![
            RunStatus::Error("interrupted".into()).as_db_string(),
            RunStatus::Running.as_db_string()
        ],
    )
}

pub fn insert_raw_capture(
    conn: &Connection,
    run_id: i64,
    rec: &NormalizedRecord,
    captured_at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO tariff_snapshot_raw(run_id, route, length_km, effective_from, class, axles, tariff, captured_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            run_id,
            rec.route,
            rec.length_text,
            rec.effective_from,
            rec.class,
            rec.axles_text,
            rec.tariff_text,
            captured_at
        ],
    )?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotEntry<'a> {
    pub definition_id: i64,
    pub run_id: i64,
    pub capture_date: &'a str,
    pub effective_from: &'a str,
    pub tariff: f64,
    pub source: &'a str,
}

pub fn insert_snapshot(conn: &Connection, s: &SnapshotEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO tariff_snapshot(definition_id, run_id, capture_date, effective_from, tariff, source)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            s.definition_id,
            s.run_id,
            s.capture_date,
            s.effective_from,
            s.tariff,
            s.source
        ],
    )?;
    Ok(())
}

pub fn recent_runs(conn: &Connection, limit: u32) -> rusqlite::Result<Vec<RunRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, started_at, finished_at, status, params_json, summary_json
         FROM ingestion_run ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |r| {
        Ok(RunRow {
            id: r.get(0)?,
            started_at: r.get(1)?,
            finished_at: r.get(2)?,
            status: r.get(3)?,
            params_json: r.get(4)?,
            summary_json: r.get(5)?,
        })
    })?;
    rows.collect()
}

use crate::config::IngestConfig;
use crate::diagnostics;
use crate::errors::{IngestError, IngestResult};
use crate::model::{IngestSummary, NormalizedRecord, RunParameters, RunStatus};
use crate::normalize::{distinct_routes, parse_tariff_table};
use crate::parse::parse_amount;
use crate::storage::store::{ResolvedRecord, Store};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub source_tag: String,
    /// Minimum distinct routes expected in the document; `None` skips the check.
    pub min_routes: Option<usize>,
    pub save_raw: bool,
    pub repair_stale_runs: bool,
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for IngestOptions {
    fn from(cfg: &IngestConfig) -> Self {
        Self {
            source_tag: cfg.source_tag.clone(),
            min_routes: cfg.min_routes_threshold(),
            save_raw: cfg.save_raw,
            repair_stale_runs: cfg.repair_stale_runs,
            diagnostics_dir: cfg.diagnostics_dir.clone(),
        }
    }
}

pub struct Ingestor {
    pub store: Store,
    pub options: IngestOptions,
}

impl Ingestor {
    pub fn new(store: Store, options: IngestOptions) -> Self {
        Self { store, options }
    }

    /// Ingests one document, stamping it with today's local date.
    pub fn run(&self, html: &str) -> IngestResult<IngestSummary> {
        self.run_at(html, chrono::Local::now().date_naive())
    }

    /// Parse, sanity-check, then persist record by record under a fresh run.
    ///
    /// Structural failures return before any row is written. A persistence
    /// failure marks the run `ERROR:<message>`; rows already committed stay.
    pub fn run_at(&self, html: &str, capture_date: NaiveDate) -> IngestResult<IngestSummary> {
        let records = match self.prepare(html) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(event = "ingest_rejected", error = %e);
                if e.is_structural() {
                    diagnostics::dump_best_effort(
                        self.options.diagnostics_dir.as_deref(),
                        "rejected",
                        html,
                    );
                }
                return Err(e);
            }
        };

        if self.options.repair_stale_runs {
            let repaired = self.store.mark_stale_runs()?;
            if repaired > 0 {
                tracing::warn!(event = "stale_runs_repaired", count = repaired);
            }
        }

        let capture = capture_date.format("%Y-%m-%d").to_string();
        let params = RunParameters {
            capture_date: capture.clone(),
            source_tag: self.options.source_tag.clone(),
            min_routes: self.options.min_routes,
            html_bytes: html.len(),
            html_sha256: hex::encode(Sha256::digest(html.as_bytes())),
        };
        let run_id = self.store.begin_run(&params)?;

        let mut summary = IngestSummary {
            run_id,
            records: records.len(),
            distinct_routes: distinct_routes(&records),
            ..Default::default()
        };
        tracing::info!(
            event = "run_started",
            run_id,
            capture_date = %capture,
            records = summary.records,
            distinct_routes = summary.distinct_routes
        );

        match self.persist_all(run_id, &capture, &records, &mut summary) {
            Ok(()) => {
                self.store
                    .finalize_run(run_id, &RunStatus::Ok, Some(&summary))?;
                tracing::info!(
                    event = "run_finished",
                    run_id,
                    snapshots = summary.snapshots,
                    new_history = summary.new_history,
                    skipped = summary.skipped
                );
                Ok(summary)
            }
            Err(e) => {
                let status = RunStatus::Error(e.to_string());
                if let Err(finalize_err) = self.store.finalize_run(run_id, &status, Some(&summary)) {
                    tracing::error!(event = "run_finalize_failed", run_id, error = %finalize_err);
                }
                tracing::error!(
                    event = "run_failed",
                    run_id,
                    snapshots = summary.snapshots,
                    error = %e
                );
                Err(e)
            }
        }
    }

    fn prepare(&self, html: &str) -> IngestResult<Vec<NormalizedRecord>> {
        let records = parse_tariff_table(html)?;
        if let Some(expected) = self.options.min_routes {
            let found = distinct_routes(&records);
            if found < expected {
                return Err(IngestError::TooFewRoutes { found, expected });
            }
        }
        Ok(records)
    }

    fn persist_all(
        &self,
        run_id: i64,
        capture_date: &str,
        records: &[NormalizedRecord],
        summary: &mut IngestSummary,
    ) -> IngestResult<()> {
        for rec in records {
            if self.options.save_raw {
                self.store.insert_raw_capture(run_id, rec)?;
            }

            let Some(tariff) = parse_amount(&rec.tariff_text) else {
                let skip = IngestError::UnparseableValue {
                    field: "tariff",
                    raw: rec.tariff_text.clone(),
                };
                tracing::warn!(
                    event = "record_skipped",
                    route = %rec.route,
                    class = %rec.class,
                    axles = %rec.axles_text,
                    error = %skip
                );
                summary.skipped += 1;
                continue;
            };

            let effective_from = match rec.effective_from.trim() {
                "" => capture_date,
                from => from,
            };
            let outcome = self.store.persist_record(
                run_id,
                capture_date,
                &self.options.source_tag,
                &ResolvedRecord {
                    record: rec,
                    tariff,
                    effective_from,
                },
            )?;
            summary.snapshots += 1;
            if outcome.change.opened_entry().is_some() {
                summary.new_history += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"<table>
        <tr><th rowspan="2">Vía</th><th rowspan="2">Long Km</th><th rowspan="2">Vigente desde</th><th colspan="2">AUTOMÓVIL</th></tr>
        <tr><th>2 EJES</th><th>3 EJES</th></tr>
        <tr><td>Ruta 1</td><td>120</td><td></td><td>$50.00</td><td>s/t</td></tr>
    </table>"#;

    fn ingestor() -> Ingestor {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        Ingestor::new(
            store,
            IngestOptions {
                min_routes: None,
                diagnostics_dir: None,
                ..Default::default()
            },
        )
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn blank_effective_date_falls_back_to_capture_date() {
        let ing = ingestor();
        let summary = ing.run_at(TABLE, day()).unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.snapshots, 1);
        assert_eq!(summary.skipped, 1);

        let conn = ing.store.conn.lock().unwrap();
        let from: String = conn
            .query_row("SELECT effective_from FROM tariff_history", [], |r| r.get(0))
            .unwrap();
        assert_eq!(from, "2024-06-01");
    }

    #[test]
    fn run_parameters_carry_digest() {
        let ing = ingestor();
        let summary = ing.run_at(TABLE, day()).unwrap();
        let runs = ing.store.recent_runs(1).unwrap();
        assert_eq!(runs[0].id, summary.run_id);
        assert_eq!(runs[0].status, "OK");
        let params: RunParameters =
            serde_json::from_str(runs[0].params_json.as_deref().unwrap()).unwrap();
        assert_eq!(params.html_bytes, TABLE.len());
        assert_eq!(params.html_sha256.len(), 64);
        assert_eq!(params.capture_date, "2024-06-01");
        let stored: IngestSummary =
            serde_json::from_str(runs[0].summary_json.as_deref().unwrap()).unwrap();
        assert_eq!(stored, summary);
    }

    #[test]
    fn persistence_failure_marks_run_and_keeps_earlier_rows() {
        let ing = ingestor();
        {
            let conn = ing.store.conn.lock().unwrap();
            conn.execute_batch("DROP VIEW vw_tariff_snapshot; DROP TABLE tariff_snapshot;")
                .unwrap();
        }
        let err = ing.run_at(TABLE, day()).unwrap_err();
        assert!(matches!(err, IngestError::Persistence(_)));

        let runs = ing.store.recent_runs(1).unwrap();
        assert!(runs[0].status.starts_with("ERROR:"));
        assert!(runs[0].finished_at.is_some());
        // raw capture precedes the failing record transaction
        assert_eq!(ing.store.count_rows("tariff_snapshot_raw").unwrap(), 1);
        assert_eq!(ing.store.count_rows("tariff_history").unwrap(), 0);
    }

    #[test]
    fn stale_running_runs_are_repaired_on_next_run() {
        let ing = ingestor();
        {
            let conn = ing.store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO ingestion_run(started_at, status) VALUES ('2024-01-01T00:00:00Z', 'RUNNING')",
                [],
            )
            .unwrap();
        }
        ing.run_at(TABLE, day()).unwrap();
        let runs = ing.store.recent_runs(10).unwrap();
        assert_eq!(runs[1].status, "ERROR:interrupted");
        assert_eq!(runs[0].status, "OK");
    }
}

//! SCD2 tariff history.
//!
//! Per definition: `NO_HISTORY -> OPEN(a) -> OPEN(a')`. A change closes the
//! open entry at the new `effective_from` and opens a new one; an equal amount
//! writes nothing. At most one entry per definition has `effective_until IS NULL`.

use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenEntry {
    pub id: i64,
    pub tariff: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryChange {
    Unchanged { entry_id: i64 },
    Opened { entry_id: i64 },
    Superseded { closed_id: i64, entry_id: i64 },
}

impl HistoryChange {
    pub fn opened_entry(&self) -> Option<i64> {
        match *self {
            HistoryChange::Unchanged { .. } => None,
            HistoryChange::Opened { entry_id } | HistoryChange::Superseded { entry_id, .. } => {
                Some(entry_id)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub definition_id: i64,
    pub tariff: f64,
    /// Already defaulted to the run's capture date when the source had none.
    pub effective_from: &'a str,
    pub source: &'a str,
}

pub fn open_entry(conn: &Connection, definition_id: i64) -> rusqlite::Result<Option<OpenEntry>> {
    conn.query_row(
        "SELECT id, tariff FROM tariff_history
         WHERE definition_id = ?1 AND effective_until IS NULL
         ORDER BY id DESC LIMIT 1",
        params![definition_id],
        |r| {
            Ok(OpenEntry {
                id: r.get(0)?,
                tariff: r.get(1)?,
            })
        },
    )
    .optional()
}

/// Applies one observation and links any opened entry to `run_id`.
pub fn record_observation(
    conn: &Connection,
    run_id: i64,
    obs: &Observation,
) -> rusqlite::Result<HistoryChange> {
    let change = match open_entry(conn, obs.definition_id)? {
        Some(open) if open.tariff == obs.tariff => {
            return Ok(HistoryChange::Unchanged { entry_id: open.id });
        }
        Some(open) => {
            conn.execute(
                "UPDATE tariff_history SET effective_until = ?1 WHERE id = ?2",
                params![obs.effective_from, open.id],
            )?;
            let entry_id = insert_entry(conn, obs)?;
            tracing::debug!(
                event = "tariff_changed",
                definition_id = obs.definition_id,
                from = open.tariff,
                to = obs.tariff,
                effective_from = %obs.effective_from
            );
            HistoryChange::Superseded {
                closed_id: open.id,
                entry_id,
            }
        }
        None => HistoryChange::Opened {
            entry_id: insert_entry(conn, obs)?,
        },
    };

    if let Some(entry_id) = change.opened_entry() {
        conn.execute(
            "INSERT INTO ingestion_run_item(run_id, history_id) VALUES (?1, ?2)",
            params![run_id, entry_id],
        )?;
    }
    Ok(change)
}

fn insert_entry(conn: &Connection, obs: &Observation) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO tariff_history(definition_id, tariff, effective_from, source)
         VALUES (?1, ?2, ?3, ?4)",
        params![obs.definition_id, obs.tariff, obs.effective_from, obs.source],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::resolver::{resolve_definition, DefinitionKey};
    use crate::storage::schema::DDL;

    fn setup() -> (Connection, i64, i64) {
        let c = Connection::open_in_memory().unwrap();
        c.execute_batch(DDL).unwrap();
        c.execute(
            "INSERT INTO ingestion_run(started_at, status) VALUES ('t', 'RUNNING')",
            [],
        )
        .unwrap();
        let run = c.last_insert_rowid();
        let def = resolve_definition(
            &c,
            &DefinitionKey {
                route: "Ruta 1",
                length_km: Some(120),
                class: "AUTOMÓVIL",
                axles: Some(2),
            },
        )
        .unwrap();
        (c, run, def)
    }

    fn obs(def: i64, tariff: f64, from: &str) -> Observation<'_> {
        Observation {
            definition_id: def,
            tariff,
            effective_from: from,
            source: "SIBUAC",
        }
    }

    #[test]
    fn identical_observations_keep_one_open_entry() {
        let (c, run, def) = setup();
        let first = record_observation(&c, run, &obs(def, 50.0, "2024-01-01")).unwrap();
        let second = record_observation(&c, run, &obs(def, 50.0, "2024-01-01")).unwrap();
        assert!(matches!(first, HistoryChange::Opened { .. }));
        assert!(matches!(second, HistoryChange::Unchanged { .. }));

        let open: i64 = c
            .query_row(
                "SELECT COUNT(*) FROM tariff_history WHERE definition_id = ?1 AND effective_until IS NULL",
                [def],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(open, 1);
    }

    #[test]
    fn only_changes_advance_history() {
        let (c, run, def) = setup();
        let feed = [
            (10.0, "2024-01-01"),
            (10.0, "2024-02-01"),
            (12.5, "2024-03-01"),
            (12.5, "2024-04-01"),
        ];
        for (amount, from) in feed {
            record_observation(&c, run, &obs(def, amount, from)).unwrap();
        }

        let rows: Vec<(f64, Option<String>, Option<String>)> = c
            .prepare("SELECT tariff, effective_from, effective_until FROM tariff_history ORDER BY id")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 10.0);
        assert_eq!(rows[0].2.as_deref(), Some("2024-03-01"));
        assert_eq!(rows[1].0, 12.5);
        assert_eq!(rows[1].1.as_deref(), Some("2024-03-01"));
        assert_eq!(rows[1].2, None);

        let items: i64 = c
            .query_row("SELECT COUNT(*) FROM ingestion_run_item", [], |r| r.get(0))
            .unwrap();
        assert_eq!(items, 2);
    }
}

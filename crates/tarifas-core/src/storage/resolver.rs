//! Find-or-create for the route / vehicle class / tariff definition
//! dimensions. Every lookup is an insert guarded by a unique constraint
//! followed by a fetch, so the surrogate ids are stable across runs.

use crate::model::NO_CLASS;
use rusqlite::{params, Connection, OptionalExtension};

/// Natural key of a tariff definition as read from one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionKey<'a> {
    pub route: &'a str,
    pub length_km: Option<i64>,
    pub class: &'a str,
    pub axles: Option<i64>,
}

pub fn resolve_definition(conn: &Connection, key: &DefinitionKey) -> rusqlite::Result<i64> {
    let route_id = resolve_route(conn, key.route, key.length_km)?;
    let class_id = resolve_class(conn, key.class)?;
    resolve_definition_ids(conn, route_id, class_id, key.axles)
}

/// A known length promotes the route's null-length row in place. An unknown
/// length reuses the null-length row, else the oldest row of that name.
pub fn resolve_route(conn: &Connection, name: &str, length_km: Option<i64>) -> rusqlite::Result<i64> {
    let name = name.trim();
    match length_km {
        Some(km) => {
            let existing = conn
                .query_row(
                    "SELECT id FROM route WHERE name = ?1 AND length_km = ?2",
                    params![name, km],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                return Ok(id);
            }

            let promoted = conn
                .query_row(
                    "UPDATE route SET length_km = ?2
                     WHERE name = ?1 AND length_km IS NULL
                     RETURNING id",
                    params![name, km],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(id) = promoted {
                tracing::debug!(event = "route_promoted", route = %name, length_km = km, id);
                return Ok(id);
            }

            conn.execute(
                "INSERT INTO route(name, length_km) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
                params![name, km],
            )?;
            conn.query_row(
                "SELECT id FROM route WHERE name = ?1 AND length_km = ?2",
                params![name, km],
                |r| r.get(0),
            )
        }
        None => {
            let existing = conn
                .query_row(
                    "SELECT id FROM route WHERE name = ?1
                     ORDER BY (length_km IS NOT NULL), id
                     LIMIT 1",
                    params![name],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                return Ok(id);
            }

            conn.execute(
                "INSERT INTO route(name, length_km) VALUES (?1, NULL) ON CONFLICT DO NOTHING",
                params![name],
            )?;
            conn.query_row(
                "SELECT id FROM route WHERE name = ?1 AND length_km IS NULL",
                params![name],
                |r| r.get(0),
            )
        }
    }
}

pub fn resolve_class(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
    let name = match name.trim() {
        "" => NO_CLASS,
        n => n,
    };
    conn.execute(
        "INSERT INTO vehicle_class(name) VALUES (?1) ON CONFLICT DO NOTHING",
        params![name],
    )?;
    conn.query_row(
        "SELECT id FROM vehicle_class WHERE name = ?1",
        params![name],
        |r| r.get(0),
    )
}

pub fn resolve_definition_ids(
    conn: &Connection,
    route_id: i64,
    class_id: i64,
    axles: Option<i64>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO tariff_definition(route_id, class_id, axles) VALUES (?1, ?2, ?3)
         ON CONFLICT DO NOTHING",
        params![route_id, class_id, axles],
    )?;
    conn.query_row(
        "SELECT id FROM tariff_definition
         WHERE route_id = ?1 AND class_id = ?2 AND axles IS ?3",
        params![route_id, class_id, axles],
        |r| r.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::DDL;

    fn conn() -> Connection {
        let c = Connection::open_in_memory().unwrap();
        c.execute_batch(DDL).unwrap();
        c
    }

    fn count(c: &Connection, table: &str) -> i64 {
        c.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn null_length_route_is_promoted_in_place() {
        let c = conn();
        let a = resolve_route(&c, "A", None).unwrap();
        let b = resolve_route(&c, "A", Some(120)).unwrap();
        assert_eq!(a, b);
        assert_eq!(count(&c, "route"), 1);
        let km: Option<i64> = c
            .query_row("SELECT length_km FROM route WHERE id = ?1", [a], |r| r.get(0))
            .unwrap();
        assert_eq!(km, Some(120));
    }

    #[test]
    fn unknown_length_reuses_known_route() {
        let c = conn();
        let a = resolve_route(&c, "A", Some(120)).unwrap();
        assert_eq!(resolve_route(&c, "A", None).unwrap(), a);
        assert_eq!(count(&c, "route"), 1);
    }

    #[test]
    fn distinct_lengths_are_distinct_routes() {
        let c = conn();
        let a = resolve_route(&c, "A", Some(120)).unwrap();
        let b = resolve_route(&c, "A", Some(80)).unwrap();
        assert_ne!(a, b);
        assert_eq!(resolve_route(&c, "A", Some(120)).unwrap(), a);
        assert_eq!(count(&c, "route"), 2);
    }

    #[test]
    fn blank_class_falls_back() {
        let c = conn();
        let id = resolve_class(&c, "  ").unwrap();
        let name: String = c
            .query_row("SELECT name FROM vehicle_class WHERE id = ?1", [id], |r| r.get(0))
            .unwrap();
        assert_eq!(name, NO_CLASS);
        assert_eq!(resolve_class(&c, "").unwrap(), id);
    }

    #[test]
    fn definitions_are_unique_including_null_axles() {
        let c = conn();
        let key = DefinitionKey {
            route: "Ruta 1",
            length_km: Some(120),
            class: "AUTOMÓVIL",
            axles: None,
        };
        let d1 = resolve_definition(&c, &key).unwrap();
        let d2 = resolve_definition(&c, &key).unwrap();
        assert_eq!(d1, d2);

        let d3 = resolve_definition(&c, &DefinitionKey { axles: Some(2), ..key.clone() }).unwrap();
        assert_ne!(d1, d3);
        assert_eq!(count(&c, "tariff_definition"), 2);
    }
}

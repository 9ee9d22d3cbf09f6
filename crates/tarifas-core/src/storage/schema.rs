pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS route (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  length_km INTEGER,
  UNIQUE(name, length_km)
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_route_null_km ON route(name) WHERE length_km IS NULL;

CREATE TABLE IF NOT EXISTS vehicle_class (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS tariff_definition (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  route_id INTEGER NOT NULL REFERENCES route(id),
  class_id INTEGER NOT NULL REFERENCES vehicle_class(id),
  axles INTEGER,
  UNIQUE(route_id, class_id, axles)
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_definition_null_axles
  ON tariff_definition(route_id, class_id) WHERE axles IS NULL;

CREATE TABLE IF NOT EXISTS tariff_history (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  definition_id INTEGER NOT NULL REFERENCES tariff_definition(id),
  tariff REAL NOT NULL,
  effective_from TEXT,
  effective_until TEXT,
  source TEXT DEFAULT 'SIBUAC'
);
CREATE INDEX IF NOT EXISTS ix_history_definition ON tariff_history(definition_id);
CREATE INDEX IF NOT EXISTS ix_history_validity ON tariff_history(effective_from, effective_until);
CREATE UNIQUE INDEX IF NOT EXISTS uq_history_open
  ON tariff_history(definition_id) WHERE effective_until IS NULL;

CREATE TABLE IF NOT EXISTS ingestion_run (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  started_at TEXT NOT NULL,
  finished_at TEXT,
  params_json TEXT,
  status TEXT NOT NULL,
  summary_json TEXT
);
CREATE INDEX IF NOT EXISTS ix_run_status ON ingestion_run(status);

CREATE TABLE IF NOT EXISTS ingestion_run_item (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id INTEGER NOT NULL REFERENCES ingestion_run(id),
  history_id INTEGER NOT NULL REFERENCES tariff_history(id)
);
CREATE INDEX IF NOT EXISTS ix_run_item_run ON ingestion_run_item(run_id);

CREATE TABLE IF NOT EXISTS tariff_snapshot_raw (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id INTEGER REFERENCES ingestion_run(id),
  route TEXT,
  length_km TEXT,
  effective_from TEXT,
  class TEXT,
  axles TEXT,
  tariff TEXT,
  captured_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS ix_raw_run ON tariff_snapshot_raw(run_id);

CREATE TABLE IF NOT EXISTS tariff_snapshot (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  definition_id INTEGER NOT NULL REFERENCES tariff_definition(id),
  run_id INTEGER REFERENCES ingestion_run(id),
  capture_date TEXT NOT NULL,
  effective_from TEXT,
  tariff REAL NOT NULL,
  source TEXT DEFAULT 'SIBUAC'
);
CREATE INDEX IF NOT EXISTS ix_snapshot_definition ON tariff_snapshot(definition_id);
CREATE INDEX IF NOT EXISTS ix_snapshot_capture_date ON tariff_snapshot(capture_date);
CREATE INDEX IF NOT EXISTS ix_snapshot_run ON tariff_snapshot(run_id);

CREATE VIEW IF NOT EXISTS vw_tariff_history AS
SELECT
  d.id AS definition_id,
  r.name AS route,
  r.length_km AS length_km,
  c.name AS class,
  d.axles AS axles,
  h.tariff AS tariff,
  h.effective_from AS effective_from,
  h.effective_until AS effective_until,
  h.source AS source
FROM tariff_history h
JOIN tariff_definition d ON d.id = h.definition_id
JOIN route r ON r.id = d.route_id
JOIN vehicle_class c ON c.id = d.class_id;

CREATE VIEW IF NOT EXISTS vw_tariff_current AS
SELECT * FROM vw_tariff_history WHERE effective_until IS NULL;

CREATE VIEW IF NOT EXISTS vw_tariff_snapshot AS
SELECT
  s.run_id AS run_id,
  s.capture_date AS capture_date,
  r.name AS route,
  r.length_km AS length_km,
  c.name AS class,
  d.axles AS axles,
  s.tariff AS tariff,
  s.effective_from AS effective_from,
  s.source AS source
FROM tariff_snapshot s
JOIN tariff_definition d ON d.id = s.definition_id
JOIN route r ON r.id = d.route_id
JOIN vehicle_class c ON c.id = d.class_id;
"#;

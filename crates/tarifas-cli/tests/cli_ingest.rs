use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures/tarifas_sample.html")
}

fn tarifas(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tarifas").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("TARIFAS_DB")
        .env_remove("TARIFAS_MIN_ROUTES")
        .env_remove("TARIFAS_SOURCE_TAG")
        .env_remove("TARIFAS_DIAGNOSTICS_DIR")
        .env_remove("TARIFAS_LOG");
    cmd
}

fn ingest(dir: &TempDir, db: &Path, date: &str) -> assert_cmd::assert::Assert {
    tarifas(dir)
        .arg("ingest")
        .arg("--db")
        .arg(db)
        .arg("--html-file")
        .arg(fixture())
        .args(["--min-routes", "4", "--capture-date", date, "--format", "json"])
        .assert()
}

#[test]
fn ingest_then_query_current_tariffs() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("data/tarifas.sqlite");

    ingest(&dir, &db, "2024-06-01")
        .success()
        .stdout(contains("\"snapshots\": 12"))
        .stdout(contains("\"skipped\": 1"));

    let out = tarifas(&dir)
        .arg("query")
        .arg("--db")
        .arg(&db)
        .args(["--view", "current", "--route", "Querétaro", "--format", "json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["view"], "current");
    assert_eq!(json["rows"].as_array().unwrap().len(), 4);
    assert_eq!(json["stats"]["total"], 12);
}

#[test]
fn rerun_adds_snapshots_but_no_history() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("tarifas.sqlite");

    ingest(&dir, &db, "2024-06-01").success();
    ingest(&dir, &db, "2024-06-02")
        .success()
        .stdout(contains("\"new_history\": 0"));

    let out = tarifas(&dir)
        .arg("runs")
        .arg("--db")
        .arg(&db)
        .args(["--format", "json"])
        .output()
        .unwrap();
    let runs: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let runs = runs.as_array().unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r["status"] == "OK"));
    assert_eq!(runs[0]["params"]["capture_date"], "2024-06-02");

    tarifas(&dir)
        .arg("runs")
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(contains("status"))
        .stderr(contains(
            "4 routes, 12 definitions, 12 history entries, 24 snapshots over 2 runs (last #2 OK)",
        ));

    tarifas(&dir)
        .arg("query")
        .arg("--db")
        .arg(&db)
        .args(["--view", "snapshot", "--date", "2024-06-02", "--limit", "all"])
        .assert()
        .success()
        .stdout(contains("Puente Tampico"))
        .stderr(contains("24 rows in vw_tariff_snapshot (latest 2024-06-02)"));
}

#[test]
fn too_few_routes_fails_with_exit_code_1() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("tarifas.sqlite");

    tarifas(&dir)
        .arg("ingest")
        .arg("--db")
        .arg(&db)
        .arg("--html-file")
        .arg(fixture())
        .assert()
        .code(1)
        .stderr(contains("too few routes: found 4, expected at least 120"));

    // default config keeps the rejected page under ./debug
    let dumps: Vec<_> = fs::read_dir(dir.path().join("debug"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(dumps.len(), 1);
    assert!(dumps[0].starts_with("rejected_") && dumps[0].ends_with(".html"));
}

#[test]
fn no_diagnostics_skips_the_rejected_page_dump() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("tarifas.sqlite");

    tarifas(&dir)
        .arg("ingest")
        .arg("--db")
        .arg(&db)
        .arg("--html-file")
        .arg(fixture())
        .arg("--no-diagnostics")
        .assert()
        .code(1);
    assert!(!dir.path().join("debug").exists());
}

#[test]
fn query_without_database_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    tarifas(&dir)
        .args(["query", "--db", "missing.sqlite"])
        .assert()
        .code(2)
        .stderr(contains("not found"));
}

#[test]
fn init_writes_sample_config_once() {
    let dir = TempDir::new().unwrap();
    tarifas(&dir).arg("init").assert().success();
    let written = fs::read_to_string(dir.path().join("tarifas.yaml")).unwrap();
    assert!(written.contains("source_tag: SIBUAC"));

    tarifas(&dir)
        .arg("init")
        .assert()
        .success()
        .stderr(contains("already exists"));
}

#[test]
fn strict_config_rejects_unknown_keys() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tarifas.yaml"), "version: 1\nmin_rutes: 3\n").unwrap();
    tarifas(&dir)
        .args(["--strict-config", "runs"])
        .assert()
        .code(2)
        .stderr(contains("config error"));
}

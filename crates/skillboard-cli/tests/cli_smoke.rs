use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn skillboard(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("skillboard").unwrap();
    cmd.env_remove("SKILLBOARD_CONFIG")
        .env_remove("SKILLBOARD_DB")
        .env("SKILLBOARD_LOG", "error")
        .arg("--db")
        .arg(db);
    cmd
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

#[test]
fn test_upsert_get_and_rank() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("data/profiles.db");

    skillboard(&db).arg("init").assert().success();

    let rec = stdout_json(
        skillboard(&db)
            .args(["upsert", "--id", "X1", "--name", "Alice", "--points", "120"]),
    );
    assert_eq!(rec["points"], 120);
    assert_eq!(rec["dc"], 0);
    assert!(rec["college"].is_null());
    assert_eq!(rec["created_at"], rec["updated_at"]);

    skillboard(&db)
        .args(["upsert", "--id", "X2", "--points", "200"])
        .assert()
        .success();
    skillboard(&db)
        .args(["upsert", "--id", "X3", "--points", "50"])
        .assert()
        .success();

    let got = stdout_json(skillboard(&db).args(["get", "--id", "X1"]));
    assert_eq!(got["name"], "Alice");

    let top = stdout_json(skillboard(&db).args(["top", "--format", "json"]));
    let ids: Vec<&str> = top
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["X2", "X1", "X3"]);

    skillboard(&db)
        .args(["top", "--limit", "1"])
        .assert()
        .success()
        .stdout(contains("X2"))
        .stdout(contains("X1").not());
}

#[test]
fn test_missing_profile_exits_not_found() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("profiles.db");

    skillboard(&db)
        .args(["get", "--id", "nobody"])
        .assert()
        .code(1)
        .stderr(contains("profile not found: nobody"));

    skillboard(&db)
        .args(["delete", "--id", "nobody"])
        .assert()
        .code(1);
}

#[test]
fn test_insert_conflict_exit_code() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("profiles.db");

    skillboard(&db)
        .args(["insert", "--id", "X1", "--points", "1"])
        .assert()
        .success();
    skillboard(&db)
        .args(["insert", "--id", "X1", "--points", "2"])
        .assert()
        .code(4)
        .stderr(contains("profile already exists: X1"));
}

#[test]
fn test_url_lookup_reports_staleness() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("profiles.db");
    let url = "https://www.skillrack.com/faces/resume.xhtml?id=77";

    skillboard(&db)
        .args([
            "upsert",
            "--id",
            "77",
            "--profile-url",
            url,
            "--last-fetched",
            "2020-01-01T00:00:00Z",
        ])
        .assert()
        .success();

    skillboard(&db)
        .args(["get", "--url", url])
        .assert()
        .code(3)
        .stdout(contains("\"id\": \"77\""));

    let now = chrono::Utc::now().to_rfc3339();
    skillboard(&db)
        .args(["upsert", "--id", "77", "--last-fetched", now.as_str()])
        .assert()
        .success();
    skillboard(&db)
        .args(["get", "--url", url, "--max-age-secs", "600"])
        .assert()
        .success();

    skillboard(&db)
        .args(["get", "--url", "https://elsewhere"])
        .assert()
        .code(1);
}

#[test]
fn test_import_jsonl() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("profiles.db");
    let file = dir.path().join("profiles.jsonl");
    fs::write(
        &file,
        r#"{"id":"a","name":"Ann","points":30}
{"id":"b","points":90,"dc":4,"dt":1}

{"id":"a","points":35}
"#,
    )
    .unwrap();

    let summary = stdout_json(skillboard(&db).arg("import").arg("--file").arg(&file));
    assert_eq!(summary["inserted"], 2);
    assert_eq!(summary["updated"], 1);

    let a = stdout_json(skillboard(&db).args(["get", "--id", "a"]));
    assert_eq!(a["points"], 35);
    assert_eq!(a["name"], "Ann");

    let stats = stdout_json(skillboard(&db).args(["stats", "--format", "json"]));
    assert_eq!(stats["profiles"], 2);
    assert_eq!(stats["schema_version"], 1);
}

#[test]
fn test_bad_import_is_fatal_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("profiles.db");
    let file = dir.path().join("profiles.jsonl");
    fs::write(&file, "{\"id\":\"a\"}\nnot json\n").unwrap();

    skillboard(&db)
        .arg("import")
        .arg("--file")
        .arg(&file)
        .assert()
        .code(2)
        .stderr(contains("invalid profile line"));

    skillboard(&db)
        .args(["get", "--id", "a"])
        .assert()
        .code(1);
}

#[test]
fn test_config_file_supplies_database() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("skillboard.yaml");
    fs::write(&config, "db_path: store/profiles.db\ndefault_limit: 2\n").unwrap();

    let mut cmd = Command::cargo_bin("skillboard").unwrap();
    cmd.env_remove("SKILLBOARD_DB")
        .env("SKILLBOARD_LOG", "error")
        .arg("--config")
        .arg(&config)
        .arg("init")
        .assert()
        .success();

    assert!(dir.path().join("store/profiles.db").exists());
}

#[test]
fn test_max_age_only_applies_to_url_lookup() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("profiles.db");

    skillboard(&db)
        .args(["get", "--id", "X1", "--max-age-secs", "5"])
        .assert()
        .code(2)
        .stderr(contains("--max-age-secs"));
    assert!(!db.exists());
}

//! CLI snapshot integration tests
//!
//! Drive the `sandpress` binary against a throwaway project laid out the
//! way a CMS checkout is: a marker file at the root and the SQLite database
//! in its conventional location.

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const ENV_VARS: [&str; 3] = [
    "SANDPRESS_ISOLATION",
    "SANDPRESS_DATABASE",
    "SANDPRESS_SETTLE_MS",
];

fn setup_project(temp_dir: &TempDir) -> PathBuf {
    fs::write(temp_dir.path().join("composer.json"), "{}").unwrap();
    let db_dir = temp_dir.path().join("wp-content").join("database");
    fs::create_dir_all(&db_dir).unwrap();
    let db_path = db_dir.join(".ht.sqlite");

    let conn = Connection::open(&db_path).unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE wp_posts (ID INTEGER PRIMARY KEY, post_title TEXT);
        INSERT INTO wp_posts VALUES (1, 'Hello world');
        "#,
    )
    .unwrap();

    db_path
}

fn sandpress(dir: &Path, args: &[&str]) -> Output {
    let cli_bin = env!("CARGO_BIN_EXE_sandpress");
    let mut command = Command::new(cli_bin);
    command.current_dir(dir).args(args);
    for var in ENV_VARS {
        command.env_remove(var);
    }
    command.output().expect("Failed to execute CLI")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "CLI command should succeed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn post_count(db_path: &Path) -> i64 {
    let conn = Connection::open(db_path).unwrap();
    conn.query_row("SELECT COUNT(*) FROM wp_posts", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_cli_locate_prints_resolved_paths() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = setup_project(&temp_dir);
    let nested = temp_dir.path().join("tests").join("unit");
    fs::create_dir_all(&nested).unwrap();

    let output = sandpress(&nested, &["locate"]);

    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&db_path.display().to_string()));
    assert!(stdout.contains(".ht.sqlite.snapshot"));
    assert!(stdout.contains("transaction"));
}

#[test]
fn test_cli_locate_without_project_fails() {
    let temp_dir = TempDir::new().unwrap();

    let output = sandpress(temp_dir.path(), &["locate"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
}

#[test]
fn test_cli_capture_then_restore_discards_changes() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = setup_project(&temp_dir);

    let output = sandpress(temp_dir.path(), &["snapshot", "capture"]);
    assert_success(&output);
    assert!(temp_dir
        .path()
        .join("wp-content/database/.ht.sqlite.snapshot")
        .is_file());

    {
        let conn = Connection::open(&db_path).unwrap();
        conn.execute("INSERT INTO wp_posts VALUES (2, 'Test post')", [])
            .unwrap();
    }
    assert_eq!(post_count(&db_path), 2);

    let output = sandpress(temp_dir.path(), &["snapshot", "restore"]);
    assert_success(&output);

    assert_eq!(post_count(&db_path), 1);
}

#[test]
fn test_cli_status_reports_live_state() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = setup_project(&temp_dir);

    let output = sandpress(temp_dir.path(), &["snapshot", "status"]);
    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("snapshot: none"));

    assert_success(&sandpress(temp_dir.path(), &["snapshot", "capture"]));
    let output = sandpress(temp_dir.path(), &["snapshot", "status"]);
    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sha256:"));
    assert!(stdout.contains("clean"));

    {
        let conn = Connection::open(&db_path).unwrap();
        conn.execute("DELETE FROM wp_posts", []).unwrap();
    }
    let output = sandpress(temp_dir.path(), &["snapshot", "status"]);
    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("modified"));
}

#[test]
fn test_cli_restore_without_snapshot_fails() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = setup_project(&temp_dir);

    let output = sandpress(temp_dir.path(), &["snapshot", "restore"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("snapshot capture"));
    assert_eq!(post_count(&db_path), 1);
}

#[test]
fn test_cli_cleanup_removes_snapshot_and_is_repeatable() {
    let temp_dir = TempDir::new().unwrap();
    setup_project(&temp_dir);
    let snapshot = temp_dir
        .path()
        .join("wp-content/database/.ht.sqlite.snapshot");

    assert_success(&sandpress(temp_dir.path(), &["snapshot", "capture"]));
    assert!(snapshot.is_file());

    assert_success(&sandpress(temp_dir.path(), &["snapshot", "cleanup"]));
    assert!(!snapshot.exists());

    assert_success(&sandpress(temp_dir.path(), &["snapshot", "cleanup"]));
}

#[test]
fn test_cli_database_flag_overrides_discovery() {
    let temp_dir = TempDir::new().unwrap();
    setup_project(&temp_dir);
    let other = temp_dir.path().join("other.db");
    Connection::open(&other)
        .unwrap()
        .execute_batch("CREATE TABLE t (v INTEGER)")
        .unwrap();

    let output = sandpress(
        temp_dir.path(),
        &["snapshot", "capture", "--database", "other.db"],
    );

    assert_success(&output);
    assert!(temp_dir.path().join("other.db.snapshot").is_file());
    assert!(!temp_dir
        .path()
        .join("wp-content/database/.ht.sqlite.snapshot")
        .exists());
}

#[test]
fn test_cli_root_flag_selects_project() {
    let temp_dir = TempDir::new().unwrap();
    setup_project(&temp_dir);
    let elsewhere = TempDir::new().unwrap();

    let output = sandpress(
        elsewhere.path(),
        &["locate", "--root", temp_dir.path().to_str().unwrap()],
    );

    assert_success(&output);
    assert!(String::from_utf8_lossy(&output.stdout)
        .contains(&temp_dir.path().display().to_string()));
}

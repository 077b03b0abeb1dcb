//! Integration tests for the markup-migrator CLI
//!
//! These tests run the binary against scratch SQLite databases, with `cat`
//! standing in for pandoc as an identity converter.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a markup-migrator Command
fn migrator() -> Command {
    let mut cmd = cargo_bin_cmd!("markup-migrator");
    cmd.env_remove("MIGRATOR_CONVERTER")
        .env_remove("MIGRATOR_DATABASE");
    cmd
}

const IDENTITY_CONFIG: &str = r#"
[converter]
command = "cat"
args = []

[[targets]]
table = "news"
attributes = ["title", "description"]
"#;

/// Helper to write a migrator.toml into the directory
fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("migrator.toml");
    fs::write(&path, content).unwrap();
    path
}

/// Helper to create a populated database in the directory
fn create_database(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("app.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "
        CREATE TABLE settings (id INTEGER PRIMARY KEY, name TEXT NOT NULL, value TEXT);
        CREATE TABLE news (id INTEGER PRIMARY KEY, title TEXT, description TEXT);
        CREATE TABLE custom_fields (id INTEGER PRIMARY KEY, field_format TEXT);
        CREATE TABLE custom_values (id INTEGER PRIMARY KEY, custom_field_id INTEGER, value TEXT);

        INSERT INTO settings (name, value) VALUES ('welcome_text', 'Hello @x@y@');
        INSERT INTO news VALUES (1, 'Release', 'Clone @git@example.com:repo.git@ today');
        INSERT INTO news VALUES (2, NULL, '> quoted
> reply');
        INSERT INTO news VALUES (3, NULL, NULL);
        INSERT INTO custom_fields VALUES (1, 'text');
        INSERT INTO custom_fields VALUES (2, 'string');
        INSERT INTO custom_values VALUES (1, 1, '@a@b@');
        INSERT INTO custom_values VALUES (2, 2, '@c@d@');
        ",
    )
    .unwrap();
    path
}

fn news(db: &Path) -> Vec<(i64, Option<String>, Option<String>)> {
    let conn = Connection::open(db).unwrap();
    let mut stmt = conn
        .prepare("SELECT id, title, description FROM news ORDER BY id")
        .unwrap();
    stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap()
}

fn single_value(db: &Path, sql: &str) -> Option<String> {
    let conn = Connection::open(db).unwrap();
    conn.query_row(sql, [], |r| r.get(0)).unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        migrator()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("convert"));
    }

    #[test]
    fn test_version() {
        migrator().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_command_fails() {
        migrator().arg("migrate-everything").assert().failure();
    }
}

// =============================================================================
// Convert Command Tests
// =============================================================================

mod convert_command {
    use super::*;

    #[test]
    fn test_convert_stdin() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, IDENTITY_CONFIG);

        migrator()
            .current_dir(dir.path())
            .arg("convert")
            .write_stdin("Clone @git@example.com:repo.git@ now")
            .assert()
            .success()
            .stdout("Clone `git@example.com:repo.git` now\n");
    }

    #[test]
    fn test_convert_file() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, IDENTITY_CONFIG);
        let input = dir.path().join("page.textile");
        fs::write(&input, "See \\[\\[Home\\]\\]").unwrap();

        migrator()
            .current_dir(dir.path())
            .arg("convert")
            .arg(&input)
            .assert()
            .success()
            .stdout("See [[Home]]\n");
    }

    #[test]
    fn test_convert_with_env_converter() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "[converter]\nargs = []\n");

        migrator()
            .current_dir(dir.path())
            .env("MIGRATOR_CONVERTER", "cat")
            .arg("convert")
            .write_stdin("plain text")
            .assert()
            .success()
            .stdout("plain text\n");
    }

    #[test]
    fn test_convert_missing_converter_fails() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "[converter]\ncommand = \"definitely-not-a-real-converter-binary\"\nargs = []\n",
        );

        migrator()
            .current_dir(dir.path())
            .arg("convert")
            .write_stdin("text")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to start converter"));
    }

    #[test]
    fn test_convert_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, IDENTITY_CONFIG);

        migrator()
            .current_dir(dir.path())
            .args(["convert", "missing.textile"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to read"));
    }
}

// =============================================================================
// Run Command Tests
// =============================================================================

mod run_command {
    use super::*;

    #[test]
    fn test_run_converts_settings_targets_and_custom_values() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, IDENTITY_CONFIG);
        let db = create_database(&dir);

        migrator()
            .current_dir(dir.path())
            .arg("--database")
            .arg(&db)
            .arg("run")
            .assert()
            .success()
            .stdout(predicate::str::contains("Total rows converted: 2"));

        let rows = news(&db);
        assert_eq!(
            rows[0],
            (
                1,
                Some("Release".to_string()),
                Some("Clone `git@example.com:repo.git` today".to_string())
            )
        );
        assert_eq!(
            rows[1],
            (2, Some(String::new()), Some("> quoted\n> reply".to_string()))
        );
        assert_eq!(rows[2], (3, None, None));

        assert_eq!(
            single_value(&db, "SELECT value FROM settings WHERE name = 'welcome_text'"),
            Some("Hello `x@y`".to_string())
        );
        assert_eq!(
            single_value(&db, "SELECT value FROM custom_values WHERE id = 1"),
            Some("`a@b`".to_string())
        );
        assert_eq!(
            single_value(&db, "SELECT value FROM custom_values WHERE id = 2"),
            Some("@c@d@".to_string())
        );
    }

    #[test]
    fn test_run_json_report() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, IDENTITY_CONFIG);
        let db = create_database(&dir);

        let output = migrator()
            .current_dir(dir.path())
            .env("MIGRATOR_DATABASE", &db)
            .args(["run", "--json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(report["settings_converted"], 1);
        assert_eq!(report["custom_values_converted"], 1);
        assert_eq!(report["dry_run"], false);
        assert_eq!(report["targets"][0]["table"], "news");
        assert_eq!(report["targets"][0]["rows"], 2);
        assert_eq!(report["targets"][0]["batches"], 1);
        assert_eq!(report["targets"][0]["fallback_batches"], 0);
    }

    #[test]
    fn test_dry_run_leaves_database_untouched() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, IDENTITY_CONFIG);
        let db = create_database(&dir);
        let before = news(&db);

        migrator()
            .current_dir(dir.path())
            .arg("--database")
            .arg(&db)
            .args(["run", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Dry run"));

        assert_eq!(news(&db), before);
        assert_eq!(
            single_value(&db, "SELECT value FROM settings WHERE name = 'welcome_text'"),
            Some("Hello @x@y@".to_string())
        );
    }

    #[test]
    fn test_failed_converter_rolls_back() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
[converter]
command = "false"
args = []

[[targets]]
table = "news"
attributes = ["title", "description"]
"#,
        );
        let db = create_database(&dir);
        let before = news(&db);

        migrator()
            .current_dir(dir.path())
            .arg("--database")
            .arg(&db)
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Migration of"));

        assert_eq!(news(&db), before);
    }

    #[test]
    fn test_run_without_database_fails() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, IDENTITY_CONFIG);

        migrator()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No database configured"));
    }

    #[test]
    fn test_run_with_missing_database_file_fails() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, IDENTITY_CONFIG);

        migrator()
            .current_dir(dir.path())
            .args(["--database", "nowhere.db", "run"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("does not exist"));
    }

    #[test]
    fn test_invalid_target_identifier_fails() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "[[targets]]\ntable = \"news; DROP TABLE news\"\nattributes = [\"title\"]\n",
        );
        let db = create_database(&dir);

        migrator()
            .current_dir(dir.path())
            .arg("--database")
            .arg(&db)
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid migration plan"));
    }
}

// =============================================================================
// Targets and Config Command Tests
// =============================================================================

mod targets_and_config {
    use super::*;

    #[test]
    fn test_targets_lists_defaults() {
        let dir = TempDir::new().unwrap();

        migrator()
            .current_dir(dir.path())
            .arg("targets")
            .assert()
            .success()
            .stdout(predicate::str::contains("work_packages"))
            .stdout(predicate::str::contains("wiki_content_journals"))
            .stdout(predicate::str::contains("custom_values"));
    }

    #[test]
    fn test_targets_uses_config_file() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, IDENTITY_CONFIG);

        migrator()
            .current_dir(dir.path())
            .arg("targets")
            .assert()
            .success()
            .stdout(predicate::str::contains("title, description"))
            .stdout(predicate::str::contains("work_packages").not());
    }

    #[test]
    fn test_config_init_then_show() {
        let dir = TempDir::new().unwrap();

        migrator()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created"));
        assert!(dir.path().join("migrator.toml").exists());

        migrator()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        migrator()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("pandoc"))
            .stdout(predicate::str::contains("[[targets]]"));
    }

    #[test]
    fn test_config_show_reflects_env_override() {
        let dir = TempDir::new().unwrap();

        migrator()
            .current_dir(dir.path())
            .env("MIGRATOR_CONVERTER", "/opt/pandoc/bin/pandoc")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/opt/pandoc/bin/pandoc"));
    }
}

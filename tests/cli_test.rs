//! End-to-end tests for the ralph binary.
//!
//! Every command runs with provider keys removed, the keyring disabled and
//! `RALPH_CONFIG` pointed into a temp directory, so nothing touches the
//! network or the user's real configuration.

use assert_cmd::Command;
use predicates::prelude::*;
use ralph::test_utils::{TEST_PRD_NAME, TestDir, make_test_config_toml};
use serde_json::Value;

/// Get the ralph binary command with an isolated environment.
#[allow(deprecated)]
fn ralph_cmd(dir: &TestDir) -> Command {
    let mut cmd = Command::cargo_bin("ralph").expect("ralph binary should be built");
    cmd.env_remove("ANTHROPIC_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("RALPH_MODEL")
        .env_remove("RALPH_TIMEOUT")
        .env_remove("RALPH_LOG")
        .env_remove("RALPH_LOG_FORMAT")
        .env_remove("RALPH_LOG_FILE")
        .env_remove("RUST_LOG")
        .env("RALPH_NO_KEYRING", "1")
        .env("RALPH_CONFIG", dir.file_path("config.toml"));
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    ralph::assert_json_valid!(stdout.trim())
}

// =============================================================================
// Help and quickstart
// =============================================================================

#[test]
fn help_lists_commands() {
    let dir = TestDir::new();
    ralph_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ultrathink"))
        .stdout(predicate::str::contains("prd"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn no_command_prints_quickstart() {
    let dir = TestDir::new();
    ralph_cmd(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("QUICK START"));
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn config_path_honours_env_override() {
    let dir = TestDir::new();
    let output = ralph_cmd(&dir)
        .args(["config", "path", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["schemaVersion"], "ralph.v1");
    assert_eq!(json["command"], "config path");
    assert!(json["data"]["path"].as_str().unwrap().ends_with("config.toml"));
    assert_eq!(json["data"]["exists"], false);
}

#[test]
fn config_show_reflects_file_values() {
    let dir = TestDir::new();
    dir.create_file("config.toml", &make_test_config_toml());
    ralph_cmd(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_attempts = 4"))
        .stdout(predicate::str::contains("o3-mini"));
}

#[test]
fn corrupted_config_exits_with_parse_error() {
    let dir = TestDir::new();
    dir.create_file("config.toml", "[rate_limit\nbase_delay_ms = ");
    ralph_cmd(&dir)
        .args(["config", "show", "--json"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("RALPH-C001"));
}

#[test]
fn config_log_level_applies_below_env() {
    let dir = TestDir::new();
    dir.create_file("config.toml", "[general]\nlog_level = \"debug\"\n");

    ralph_cmd(&dir)
        .args(["prd", "status"])
        .arg(dir.prd_path())
        .assert()
        .success()
        .stderr(predicate::str::contains("loading config file"));

    ralph_cmd(&dir)
        .env("RALPH_LOG", "error")
        .args(["prd", "status"])
        .arg(dir.prd_path())
        .assert()
        .success()
        .stderr(predicate::str::contains("loading config file").not());
}

// =============================================================================
// PRD
// =============================================================================

#[test]
fn prd_write_then_read_round_trips() {
    let dir = TestDir::new();
    let prd = dir.prd_path();

    ralph_cmd(&dir)
        .args(["prd", "write"])
        .arg(&prd)
        .args(["--content", "# Tasks\n- [ ] lock writes\n"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    ralph_cmd(&dir)
        .args(["prd", "read"])
        .arg(&prd)
        .assert()
        .success()
        .stdout(predicate::str::contains("- [ ] lock writes"));

    assert!(dir.temp_files().is_empty());
}

#[test]
fn prd_write_from_stdin_reports_json_outcome() {
    let dir = TestDir::new();
    let output = ralph_cmd(&dir)
        .args(["prd", "write", "--json"])
        .arg(dir.prd_path())
        .write_stdin("# From stdin\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["command"], "prd write");
    assert_eq!(json["data"]["success"], true);
    assert_eq!(json["data"]["retriesUsed"], 0);
    assert_eq!(dir.read_file(TEST_PRD_NAME).unwrap(), "# From stdin\n");
}

#[test]
fn prd_write_from_file() {
    let dir = TestDir::new();
    let draft = dir.create_file("draft.md", "# Draft\n");
    ralph_cmd(&dir)
        .args(["prd", "write"])
        .arg(dir.prd_path())
        .arg("--from")
        .arg(&draft)
        .assert()
        .success();
    assert_eq!(dir.read_file(TEST_PRD_NAME).unwrap(), "# Draft\n");
}

#[test]
fn prd_write_into_missing_directory_fails() {
    let dir = TestDir::new();
    ralph_cmd(&dir)
        .args(["prd", "write"])
        .arg(dir.file_path("missing/prd.md"))
        .args(["--content", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed"));
}

#[test]
fn prd_status_is_unlocked_outside_a_write() {
    let dir = TestDir::new();
    ralph_cmd(&dir)
        .args(["prd", "status"])
        .arg(dir.prd_path())
        .args(["--format", "md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- locked: false"))
        .stdout(predicate::str::contains("- queue_depth: 0"));
}

// =============================================================================
// Ultrathink
// =============================================================================

#[test]
fn ultrathink_without_credentials_falls_back() {
    let dir = TestDir::new();
    let output = ralph_cmd(&dir)
        .args([
            "ultrathink",
            "--title",
            "Add retry to the PRD writer",
            "--concern",
            "writes can interleave",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["command"], "ultrathink");
    assert_eq!(json["data"]["usedExtendedThinking"], false);
    ralph::assert_contains!(
        json["data"]["reasoningSummary"].as_str().unwrap(),
        "No reasoning provider configured"
    );
}

#[test]
fn ultrathink_rejects_unknown_effort() {
    let dir = TestDir::new();
    ralph_cmd(&dir)
        .args(["ultrathink", "--title", "t", "--effort", "extreme", "--json"])
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("\"error_code\":\"RALPH-C011\""));
}

#[test]
fn ultrathink_rejects_blank_title() {
    let dir = TestDir::new();
    ralph_cmd(&dir)
        .args(["ultrathink", "--title", "   "])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("RALPH-C002"));
}

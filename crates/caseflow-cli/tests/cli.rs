// crates/caseflow-cli/tests/cli.rs
// ============================================================================
// Module: CLI Integration Tests
// Description: Exercises the compiled `caseflow` binary end to end for the
//              subcommands that need no live ServiceNow/Slack/LLM backend.
// Purpose: Confirm exit codes and basic stdout/stderr shape without
//          depending on an external environment.
// Dependencies: tempfile
// ============================================================================

use std::io::Write as _;
use std::process::Command;

fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_caseflow")
}

#[test]
fn config_check_accepts_a_valid_config() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    write!(
        file,
        r#"
[providers]
fail_closed = true

[escalation]
default_channel_id = "C000INCIDENTS"

[escalation.business_intelligence]
escalation_score_threshold = 0.8

[[escalation.routing_rules]]
name = "default"
priority = 0
channel = "C000INCIDENTS"
"#
    )
    .expect("write fixture");

    let output = Command::new(binary())
        .args(["config", "check", "--path"])
        .arg(file.path())
        .output()
        .expect("run caseflow config check");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn config_check_rejects_a_missing_file() {
    let output = Command::new(binary())
        .args(["config", "check", "--path", "/does/not/exist.toml"])
        .output()
        .expect("run caseflow config check");

    assert!(!output.status.success());
}

#[test]
fn migrate_succeeds_against_a_fresh_path() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db_path = dir.path().join("caseflow.db");

    let output = Command::new(binary())
        .args(["migrate", "--sqlite-path"])
        .arg(&db_path)
        .output()
        .expect("run caseflow migrate");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(db_path.exists());
}

#[test]
fn dry_run_reports_a_missing_case_file() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut config_path = dir.path().to_path_buf();
    config_path.push("caseflow.toml");
    std::fs::write(
        &config_path,
        r#"
[providers]
fail_closed = true

[escalation]
default_channel_id = "C000INCIDENTS"

[escalation.business_intelligence]
escalation_score_threshold = 0.8

[[escalation.routing_rules]]
name = "default"
priority = 0
channel = "C000INCIDENTS"
"#,
    )
    .expect("write config fixture");

    let output = Command::new(binary())
        .args(["dry-run", "--case", "/does/not/exist.json", "--config"])
        .arg(&config_path)
        .output()
        .expect("run caseflow dry-run");

    assert!(!output.status.success());
}

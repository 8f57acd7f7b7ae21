// crates/caseflow-cli/src/tests.rs
// ============================================================================
// Module: CLI Unit Tests
// Description: Unit coverage for the JSON-reading helper and the error
//              display strings each subcommand can surface.
// ============================================================================

use std::io::Write as _;

use super::*;

#[test]
fn read_json_parses_a_valid_case() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    write!(file, r#"{{"id":"c-1","number":"CS0000001","short_description":"VPN down","long_description":null,"priority":1,"urgency":1,"company":"Acme","assignment_group":null,"account":null,"current_category":null}}"#)
        .expect("write fixture");
    let case: caseflow_core::Case = read_json(file.path()).expect("parse case");
    assert_eq!(case.number, "CS0000001");
}

#[test]
fn read_json_reports_missing_file() {
    let err = read_json::<caseflow_core::Case>(Path::new("/does/not/exist.json")).unwrap_err();
    assert!(matches!(err, CliError::ReadFile { .. }));
}

#[test]
fn read_json_reports_malformed_json() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    write!(file, "not json").expect("write fixture");
    let err = read_json::<caseflow_core::Case>(file.path()).unwrap_err();
    assert!(matches!(err, CliError::ParseJson { .. }));
}

#[test]
fn config_check_rejects_a_missing_file() {
    let err = command_config_check(Path::new("/does/not/exist.toml")).unwrap_err();
    assert!(matches!(err, CliError::Config(_)));
}

#[test]
fn migrate_opens_and_reports_a_fresh_store() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("caseflow.db");
    command_migrate(Some(path.clone())).expect("migrate fresh store");
    assert!(path.exists());
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Integration tests for the yangcat CLI commands

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// yangcat command bound to an isolated data directory
fn yangcat(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("yangcat").unwrap();
    cmd.env("YANGCAT_DATA_DIR", data_dir.path().join("store"))
        .env("NO_COLOR", "1")
        .env_remove("YANGCAT_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

const MODULES: &str = r#"{
    "modules": {"module": [
        {"name": "ietf-a", "revision": "2020-01-01", "organization": "ietf",
         "compilation-status": "passed"},
        {"name": "ietf-b", "revision": "2021-01-01", "organization": "ietf",
         "dependencies": [{"name": "ietf-a", "revision": "2020-01-01"}]},
        {"name": "ietf-c", "revision": "2021-01-01", "organization": "ietf",
         "dependents": [{"name": "ietf-d"}]},
        {"name": "ietf-d", "revision": "2021-01-01", "organization": "ietf"}
    ]}
}"#;

const VENDORS: &str = r#"{
    "vendors": {"vendor": [{"name": "fujitsu", "platforms": {"platform": [
        {"name": "T100", "software-versions": {"software-version": [
            {"name": "1.0", "software-flavors": {"software-flavor": [
                {"name": "base", "protocols": {"protocol": [{"name": "netconf"}]},
                 "modules": {"module": [
                    {"name": "fujitsu-a", "revision": "2020-01-01", "organization": "fujitsu"}
                 ]}}
            ]}}
        ]}}
    ]}}]}
}"#;

fn populated(data_dir: &TempDir) {
    let modules = write_file(data_dir, "modules.json", MODULES);
    yangcat(data_dir)
        .args(["populate", "--modules"])
        .arg(&modules)
        .assert()
        .success()
        .stdout(predicate::str::contains("populated 4 modules"));
}

#[test]
fn test_populate_then_get_module() {
    let data_dir = TempDir::new().unwrap();
    populated(&data_dir);

    yangcat(&data_dir)
        .args(["get", "module", "ietf-a@2020-01-01/ietf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"compilation-status\": \"passed\""));
}

#[test]
fn test_get_missing_module_prints_empty_object() {
    let data_dir = TempDir::new().unwrap();

    yangcat(&data_dir)
        .args(["get", "module", "nothing@2020-01-01/ietf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("{}"));
}

#[test]
fn test_populate_requires_input() {
    let data_dir = TempDir::new().unwrap();

    yangcat(&data_dir)
        .arg("populate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to populate"));
}

#[test]
fn test_overlay_applied_on_populate() {
    let data_dir = TempDir::new().unwrap();
    let modules = write_file(&data_dir, "modules.json", MODULES);
    let overlay = write_file(
        &data_dir,
        "overlay.json",
        r#"{"ietf-a@2020-01-01/ietf": {"maturity-level": "ratified"}}"#,
    );

    yangcat(&data_dir)
        .args(["populate", "--modules"])
        .arg(&modules)
        .arg("--overlay")
        .arg(&overlay)
        .assert()
        .success()
        .stdout(predicate::str::contains("Staged 1 overlay record(s)"));

    yangcat(&data_dir)
        .args(["get", "module", "ietf-a@2020-01-01/ietf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"maturity-level\": \"ratified\""));
}

#[test]
fn test_delete_referenced_module_is_partial() {
    let data_dir = TempDir::new().unwrap();
    populated(&data_dir);

    yangcat(&data_dir)
        .args(["delete-modules", "ietf-a@2020-01-01/ietf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("In progress"))
        .stdout(predicate::str::contains(
            "ietf-a@2020-01-01/ietf (referenced by ietf-b@2021-01-01/ietf in dependencies)",
        ));

    yangcat(&data_dir)
        .args(["get", "module", "ietf-a@2020-01-01/ietf"])
        .assert()
        .stdout(predicate::str::contains("ietf-a"));
}

#[test]
fn test_delete_modules_json_output() {
    let data_dir = TempDir::new().unwrap();
    populated(&data_dir);

    yangcat(&data_dir)
        .args([
            "--json",
            "delete-modules",
            "ietf-a@2020-01-01/ietf",
            "ietf-b@2021-01-01/ietf",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"success\""))
        .stdout(predicate::str::contains("\"ietf-b@2021-01-01/ietf\""));
}

#[test]
fn test_delete_modules_from_file_updates_dependents() {
    let data_dir = TempDir::new().unwrap();
    populated(&data_dir);
    let request = write_file(
        &data_dir,
        "delete.json",
        r#"[{"name": "ietf-d", "revision": "2021-01-01", "organization": "ietf"}]"#,
    );

    yangcat(&data_dir)
        .args(["delete-modules", "--file"])
        .arg(&request)
        .assert()
        .success()
        .stdout(predicate::str::contains("Dependents updated: ietf-c@2021-01-01/ietf"));
}

#[test]
fn test_delete_absent_revision_keeps_dependents() {
    let data_dir = TempDir::new().unwrap();
    populated(&data_dir);

    yangcat(&data_dir)
        .args(["delete-modules", "ietf-d@2099-01-01/ietf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not stored: ietf-d@2099-01-01/ietf"))
        .stdout(predicate::str::contains("Dependents updated").not());

    yangcat(&data_dir)
        .args(["get", "module", "ietf-c@2021-01-01/ietf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ietf-d"));
}

#[test]
fn test_delete_modules_rejects_bad_key() {
    let data_dir = TempDir::new().unwrap();

    yangcat(&data_dir)
        .args(["delete-modules", "not-a-key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid module key"));
}

#[test]
fn test_vendor_populate_and_delete() {
    let data_dir = TempDir::new().unwrap();
    let vendors = write_file(&data_dir, "vendors.json", VENDORS);

    yangcat(&data_dir)
        .args(["populate", "--vendors"])
        .arg(&vendors)
        .assert()
        .success()
        .stdout(predicate::str::contains("populated 1 vendor branches"));

    yangcat(&data_dir)
        .args(["get", "branch", "fujitsu/T100/1.0/base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fujitsu-a"));

    yangcat(&data_dir)
        .args(["delete-vendor", "--vendor", "fujitsu", "--platform", "T100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vendor branches removed: 1"));
}

#[test]
fn test_delete_vendor_rejects_gapped_selector() {
    let data_dir = TempDir::new().unwrap();

    yangcat(&data_dir)
        .args(["delete-vendor", "--vendor", "fujitsu", "--software-flavor", "base"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid vendor selector"));
}

#[test]
fn test_reload_cache_and_get_all_modules() {
    let data_dir = TempDir::new().unwrap();
    populated(&data_dir);

    yangcat(&data_dir)
        .arg("get")
        .arg("all-modules")
        .assert()
        .success()
        .stdout(predicate::str::contains("Modules cache is empty"));

    yangcat(&data_dir)
        .arg("reload-cache")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cached 4 module(s) and 0 vendor(s)"));

    yangcat(&data_dir)
        .args(["get", "all-modules"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ietf-d@2021-01-01/ietf"));
}

#[test]
fn test_job_listing_and_dispatch() {
    let data_dir = TempDir::new().unwrap();
    populated(&data_dir);

    yangcat(&data_dir)
        .arg("job")
        .assert()
        .success()
        .stdout(predicate::str::contains("delete-vendor"))
        .stdout(predicate::str::contains("reload-cache"));

    yangcat(&data_dir)
        .args(["job", "delete-modules", r#"["ietf-d@2021-01-01/ietf"]"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("Finished successfully"));
}

#[test]
fn test_unknown_job_fails() {
    let data_dir = TempDir::new().unwrap();

    yangcat(&data_dir)
        .args(["job", "no-such-job"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown job: no-such-job"));
}

#[test]
fn test_config_shows_database_layout() {
    let data_dir = TempDir::new().unwrap();

    yangcat(&data_dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("modules_db = 1"))
        .stdout(predicate::str::contains("vendors_db = 4"));
}

#[test]
fn test_store_survives_between_runs() {
    let data_dir = TempDir::new().unwrap();
    populated(&data_dir);

    assert!(data_dir.path().join("store").join("db1.json").exists());
}

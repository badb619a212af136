use std::path::PathBuf;
use std::process::Command;

fn charon_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_charon"))
}

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn analyze_sample_project_reports_graph_and_metrics() {
    let output = charon_cmd()
        .args(["analyze", &fixture("sample-python-project")])
        .output()
        .expect("failed to run charon analyze");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "charon analyze failed: stdout={stdout}, stderr={stderr}");
    assert!(stdout.contains("Nodes"), "should print node summary: {stdout}");
    assert!(stdout.contains("Coupling"), "should print coupling section: {stdout}");
}

#[test]
fn analyze_json_output_is_valid_and_round_trips_through_fitness_check() {
    let tmp = tempfile::tempdir().unwrap();
    let graph_path = tmp.path().join("graph.json");

    let analyze_output = charon_cmd()
        .args([
            "analyze",
            &fixture("sample-python-project"),
            "--format",
            "json",
            "--output",
            graph_path.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run charon analyze");
    assert!(analyze_output.status.success());

    let graph_json = std::fs::read_to_string(&graph_path).expect("artifact should be written");
    let parsed: serde_json::Value = serde_json::from_str(&graph_json).expect("artifact should be valid JSON");
    assert!(parsed.get("graph").is_some());
    assert!(parsed.get("global_metrics").is_some());

    let check_output = charon_cmd()
        .args([
            "fitness-check",
            "--rules",
            &fixture("no-ui-to-db.json"),
            "--graph",
            graph_path.to_str().unwrap(),
            "--fail-on-error",
        ])
        .output()
        .expect("failed to run charon fitness-check");

    let check_stdout = String::from_utf8_lossy(&check_output.stdout);
    assert_eq!(check_output.status.code(), Some(1), "ui->db import should violate the rule: {check_stdout}");
    assert!(check_stdout.contains("no-ui-to-db"), "should name the violated rule: {check_stdout}");
    assert!(check_stdout.contains("CHECK FAILED"), "should report failure: {check_stdout}");
}

#[test]
fn fitness_check_json_output_has_exit_code_field() {
    let tmp = tempfile::tempdir().unwrap();
    let graph_path = tmp.path().join("graph.json");

    charon_cmd()
        .args([
            "analyze",
            &fixture("sample-python-project"),
            "--format",
            "json",
            "--output",
            graph_path.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run charon analyze");

    let output = charon_cmd()
        .args([
            "fitness-check",
            "--rules",
            &fixture("no-ui-to-db.json"),
            "--graph",
            graph_path.to_str().unwrap(),
            "--fail-on-error",
            "--json-output",
        ])
        .output()
        .expect("failed to run charon fitness-check");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("should emit valid JSON");
    assert_eq!(parsed["exit_code"], 1);
    assert_eq!(parsed["passed"], false);
}

#[test]
fn fitness_check_save_history_appends_to_storage_path() {
    let tmp = tempfile::tempdir().unwrap();
    let graph_path = tmp.path().join("graph.json");
    let storage_path = tmp.path().join("history");

    charon_cmd()
        .args([
            "analyze",
            &fixture("sample-python-project"),
            "--format",
            "json",
            "--output",
            graph_path.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run charon analyze");

    let output = charon_cmd()
        .args([
            "fitness-check",
            "--rules",
            &fixture("no-ui-to-db.json"),
            "--graph",
            graph_path.to_str().unwrap(),
            "--save-history",
            "--project-name",
            "sample-python-project",
            "--storage-path",
            storage_path.to_str().unwrap(),
            "--quiet",
        ])
        .output()
        .expect("failed to run charon fitness-check");

    assert!(output.status.success());
    let history_file: PathBuf = storage_path.join("sample-python-project").join("fitness_history.jsonl");
    assert!(history_file.exists(), "history file should have been written to {}", history_file.display());
    let content = std::fs::read_to_string(&history_file).unwrap();
    assert_eq!(content.lines().count(), 1);
}

#[test]
fn init_creates_default_config() {
    let tmp = tempfile::tempdir().unwrap();
    let output = charon_cmd()
        .args(["init"])
        .current_dir(tmp.path())
        .output()
        .expect("failed to run charon init");

    assert!(output.status.success());
    assert!(tmp.path().join(".charon.toml").exists());
}

#[test]
fn analyze_rejects_nonexistent_path() {
    let output = charon_cmd().args(["analyze", "/no/such/path/at/all"]).output().expect("failed to run charon analyze");
    assert_eq!(output.status.code(), Some(2));
}

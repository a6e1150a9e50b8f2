//! CLI integration tests for the flowport command-line interface.
//!
//! Each test runs the binary inside its own temporary directory with an
//! explicit `--config-dir` and `--database`, so no user configuration or
//! data is touched.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use flowport_types::{ImageBlob, content_hash};
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// A flowport command bound to this workspace.
    fn flowport(&self) -> Command {
        let mut cmd = Command::cargo_bin("flowport").unwrap();
        cmd.current_dir(self.dir.path())
            .env_remove("FLOWPORT_DATABASE")
            .env_remove("FLOWPORT_CONFIG_DIR")
            .arg("--config-dir")
            .arg(self.path("config"))
            .arg("--database")
            .arg(self.path("data/flowport.db"));
        cmd
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, contents).unwrap();
        path
    }
}

fn sample_document() -> String {
    let blob = ImageBlob::new("image/png", b"tiny png".to_vec());
    json!({
        "version": 3,
        "workflows": [
            {"id": 1, "name": "Morning", "workspaceXml": "<xml/>", "uuid": "u-1",
             "images": {"sun": blob.hash()}},
            {"id": 2, "name": "Evening", "workspaceXml": "<xml/>", "uuid": "u-2"}
        ],
        "images": {(blob.hash()): flowport_exchange::to_data_uri(&blob)}
    })
    .to_string()
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).unwrap()
}

fn import_json(ws: &Workspace, file: &Path, mode: &str) -> Value {
    let output = ws
        .flowport()
        .args(["--json", "import", "--mode", mode])
        .arg(file)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    stdout_json(&output)
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Parsing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("flowport")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    Command::cargo_bin("flowport")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("flowport"));
}

#[test]
fn test_import_rejects_unknown_mode() {
    Command::cargo_bin("flowport")
        .unwrap()
        .args(["import", "doc.json", "--mode", "turbo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_import_requires_file() {
    Command::cargo_bin("flowport")
        .unwrap()
        .arg("import")
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Import / List / Export
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_import_then_list() {
    let ws = Workspace::new();
    let doc = ws.write("doc.json", &sample_document());

    let summary = import_json(&ws, &doc, "stream");
    assert_eq!(summary["version"], 3);
    assert_eq!(summary["workflow_ids"].as_array().unwrap().len(), 2);
    assert_eq!(summary["images_stored"], 1);

    let output = ws
        .flowport()
        .args(["--json", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listed = stdout_json(&output);
    let entries = listed.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "Morning");
    assert_eq!(entries[0]["images"], 1);
    assert_eq!(entries[1]["uuid"], "u-2");
}

#[test]
fn test_batch_import_human_output() {
    let ws = Workspace::new();
    let doc = ws.write("doc.json", &sample_document());

    ws.flowport()
        .args(["import", "--mode", "batch", "--quiet"])
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 workflow(s)"));
}

#[test]
fn test_import_from_stdin() {
    let ws = Workspace::new();

    let output = ws
        .flowport()
        .args(["--json", "import", "-"])
        .write_stdin(sample_document())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(stdout_json(&output)["images_stored"], 1);
}

#[test]
fn test_failed_import_leaves_store_empty() {
    let ws = Workspace::new();
    let declared = content_hash(b"expected");
    let bad = json!({
        "version": 3,
        "workflows": [{"id": 1, "name": "A", "workspaceXml": "", "uuid": "a",
                       "images": {"x": declared}}],
        "images": {(declared.clone()): flowport_exchange::to_data_uri(
            &ImageBlob::new("image/png", b"actual".to_vec()))}
    });
    let doc = ws.write("bad.json", &bad.to_string());

    ws.flowport()
        .args(["import", "--quiet"])
        .arg(&doc)
        .assert()
        .failure()
        .stderr(predicate::str::contains("hash"));

    ws.flowport()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No workflows stored."));
}

#[test]
fn test_study_mode_requires_uuid() {
    let ws = Workspace::new();
    let doc = ws.write(
        "doc.json",
        r#"{"version": 3, "workflows": [{"id": 1, "name": "A", "workspaceXml": ""}]}"#,
    );

    ws.flowport()
        .args(["import", "--quiet"])
        .arg(&doc)
        .assert()
        .success();

    ws.flowport()
        .args(["import", "--quiet", "--study-mode"])
        .arg(&doc)
        .assert()
        .failure()
        .stderr(predicate::str::contains("uuid"));
}

#[test]
fn test_export_roundtrip() {
    let ws = Workspace::new();
    let doc = ws.write("doc.json", &sample_document());
    let summary = import_json(&ws, &doc, "batch");
    let first_id = summary["workflow_ids"][0].as_i64().unwrap();

    let exported = ws.path("out.json");
    ws.flowport()
        .arg("export")
        .arg(first_id.to_string())
        .arg("--output")
        .arg(&exported)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 workflow(s)"));

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&exported).unwrap()).unwrap();
    assert_eq!(written["workflows"].as_array().unwrap().len(), 1);
    assert_eq!(written["images"].as_object().unwrap().len(), 1);

    // The exported document imports cleanly into a fresh store.
    let fresh = Workspace::new();
    let copied = fresh.write("doc.json", &std::fs::read_to_string(&exported).unwrap());
    let summary = import_json(&fresh, &copied, "stream");
    assert_eq!(summary["images_stored"], 1);
}

#[test]
fn test_export_unknown_id_fails() {
    let ws = Workspace::new();
    ws.flowport()
        .args(["export", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("42"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_init_and_which() {
    let ws = Workspace::new();

    ws.flowport()
        .args(["config", "which"])
        .assert()
        .success()
        .stdout(predicate::str::contains("· not found"));

    ws.flowport()
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));
    assert!(ws.path("config/config.toml").exists());

    ws.flowport()
        .args(["config", "which"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ loaded"));
}

#[test]
fn test_config_show_reflects_file() {
    let ws = Workspace::new();
    std::fs::create_dir_all(ws.path("config")).unwrap();
    ws.write("config/config.toml", "[import]\nschema_version = 7\n");

    let output = ws
        .flowport()
        .args(["--json", "config", "show"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let shown = stdout_json(&output);
    assert_eq!(shown["import"]["schema_version"], 7);
    assert!(
        shown["database"]
            .as_str()
            .unwrap()
            .ends_with("flowport.db")
    );
}

#[test]
fn test_config_path_uses_config_dir() {
    let ws = Workspace::new();
    ws.flowport()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

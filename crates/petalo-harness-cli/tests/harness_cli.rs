#![cfg(unix)]

use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// Stand-in simulator: follows the staged scripts to the output stem and
// writes a JSON table there with the sensor ids given in SENSOR_IDS.
const FAKE_SIMULATOR: &str = r#"#!/bin/sh
echo "$@" >> "$PETALODIR/invocations.txt"
if [ -n "$FAIL_WITH" ]; then
  exit "$FAIL_WITH"
fi
init="$4"
config=$(sed -n 's#^/nexus/RegisterMacro ##p' "$init")
out=$(sed -n 's#^/petalosim/persistency/output_file ##p' "$config")
positions=""
response=""
for id in $SENSOR_IDS; do
  positions="$positions{\"sensor_id\": $id, \"x\": 0.0, \"y\": 0.0, \"z\": 1.0, \"sensor_name\": \"SiPMpet\"},"
  response="$response{\"event_id\": 0, \"sensor_id\": $id, \"charge\": 2.0},"
done
cat > "$out.json" <<EOF
{"MC/particles": [],
 "MC/sns_positions": [${positions%,}],
 "MC/sns_response": [${response%,}]}
EOF
"#;

struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().expect("tempdir should be created");
        let bin = temp.path().join("bin");
        fs::create_dir_all(&bin).expect("bin dir");
        let executable = bin.join("petalo");
        fs::write(&executable, FAKE_SIMULATOR).expect("simulator written");
        let mut permissions = fs::metadata(&executable).expect("metadata").permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&executable, permissions).expect("simulator executable");
        Self { temp }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_petalo-harness"));
        command
            .current_dir(self.root())
            .env("PETALODIR", self.root())
            .env_remove("FAIL_WITH")
            .env_remove("RUST_LOG");
        command
    }

    fn run_scenario(&self, scenario: &str, sensor_ids: &str) -> Output {
        self.command()
            .env("SENSOR_IDS", sensor_ids)
            .args(["run", "--scenario", scenario])
            .arg("--staging-dir")
            .arg(self.path("staging"))
            .arg("--output-dir")
            .arg(self.path("output"))
            .arg("--report")
            .arg(self.path("report/report.json"))
            .output()
            .expect("command should run")
    }
}

#[test]
fn run_command_passes_when_sensor_ids_decode() {
    let workspace = Workspace::new();
    let output = workspace.run_scenario("ring_tiles", "1000 1032 120000");

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Suite status: PASS"), "stdout: {stdout}");
    assert!(stdout.contains("Scenario ring_tiles: PASS (3/3 checks, 20 events)"));

    let invocations =
        fs::read_to_string(workspace.path("invocations.txt")).expect("simulator was invoked");
    assert_eq!(
        invocations.trim_end(),
        format!(
            "-b -n 20 {}",
            workspace.path("staging/ring_tiles.init.mac").display()
        )
    );

    let parsed: Value = serde_json::from_str(
        &fs::read_to_string(workspace.path("report/report.json"))
            .expect("report should be readable"),
    )
    .expect("report JSON should parse");
    assert_eq!(parsed["passed"], Value::Bool(true));
    assert_eq!(parsed["runs"][0]["scenario_name"], "ring_tiles");
}

#[test]
fn run_command_exits_one_when_a_check_fails() {
    let workspace = Workspace::new();
    let output = workspace.run_scenario("ring_tiles", "1000 1033");

    assert_eq!(
        output.status.code(),
        Some(1),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Suite status: FAIL"));
    assert!(stdout.contains("first failure: sensor_id_decoding"));
    assert!(workspace.path("report/report.json").exists());
}

#[test]
fn simulator_failure_is_fatal_and_names_the_scenario() {
    let workspace = Workspace::new();
    let output = workspace
        .command()
        .env("FAIL_WITH", "3")
        .args(["run", "--scenario", "petit"])
        .output()
        .expect("command should run");

    assert_eq!(output.status.code(), Some(4));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("ERROR: [RUN.SIMULATION_FAILED] scenario 'petit'"),
        "stderr: {stderr}"
    );
    assert!(stderr.contains("FATAL EXIT CODE: 4"));

    let parsed: Value = serde_json::from_str(
        &fs::read_to_string(workspace.path("artifacts/report.json"))
            .expect("partial report should be written"),
    )
    .expect("report JSON should parse");
    assert_eq!(parsed["passed"], Value::Bool(false));
    assert_eq!(parsed["runs"][0]["scenario_name"], "petit");
    assert_eq!(parsed["runs"][0]["status"], "FAILED");
    assert_eq!(parsed["runs"][0]["exit_status"], 3);
}

#[test]
fn missing_installation_root_is_an_input_error() {
    let workspace = Workspace::new();
    let output = workspace
        .command()
        .env_remove("PETALODIR")
        .args(["run", "--scenario", "petit"])
        .output()
        .expect("command should run");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[INPUT.ENVIRONMENT]"));
}

#[test]
fn macros_command_runs_each_example_once() {
    let workspace = Workspace::new();
    let macros = workspace.path("macros");
    fs::create_dir_all(macros.join("old")).expect("macros dir");
    fs::write(
        macros.join("PETit_ring_lutable.init.mac"),
        "/nexus/RegisterMacro macros/PETit_ring_lutable.config.mac\n",
    )
    .expect("init written");
    fs::write(
        macros.join("PETit_ring_lutable.config.mac"),
        "/petalosim/persistency/output_file PETit_ring_lutable\n",
    )
    .expect("config written");
    fs::write(macros.join("old/legacy.init.mac"), "/run/verbose 0\n").expect("old written");

    let output = workspace
        .command()
        .env("SENSOR_IDS", "1 2")
        .arg("macros")
        .output()
        .expect("command should run");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Ran PETit_ring_lutable.init.mac (1 events)"));
    assert!(stdout.contains("Example macros: 1 run"));
    assert!(
        workspace
            .path("artifacts/output/PETit_ring_lutable.json")
            .exists()
    );
}

#[test]
fn list_command_prints_catalog_order() {
    let workspace = Workspace::new();
    let output = workspace
        .command()
        .arg("list")
        .output()
        .expect("command should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let names = stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .collect::<Vec<_>>();
    assert_eq!(names.first(), Some(&"full_body"));
    assert_eq!(names.last(), Some(&"phantom"));
    assert_eq!(names.len(), 11);
    assert!(stdout.contains("BOARD_PACKED"));
}

#[test]
fn decode_command_prints_decoded_ids_and_rejects_malformed_ones() {
    let workspace = Workspace::new();
    let output = workspace
        .command()
        .args(["decode", "ring_tiles", "1005", "120032"])
        .output()
        .expect("command should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1005: board=1 offset=5"));
    assert!(stdout.contains("120032: board=120 offset=32"));

    let output = workspace
        .command()
        .args(["decode", "ring_tiles", "121000"])
        .output()
        .expect("command should run");
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[RUN.MALFORMED_SENSOR_ID]"));
}

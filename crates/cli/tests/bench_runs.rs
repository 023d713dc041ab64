// SocketBench - Multi-IC Socket Tester
// Copyright (C) 2026 The SocketBench Authors
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! End-to-end runs of the `socketbench` binary against the simulated
//! socket: exit codes, report contents and plan-gated expectations.

use std::path::PathBuf;
use std::process::Command;

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("socketbench-{}-{}", std::process::id(), name))
}

#[test]
fn healthy_memory_run_passes_and_writes_a_report() {
    let report_path = temp_file("healthy-report.json");

    let output = Command::new(env!("CARGO_BIN_EXE_socketbench"))
        .args([
            "test",
            "--device",
            "sram",
            "--size",
            "8KiB",
            "--report",
            report_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "run failed: {:?}", output);

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["result_schema_version"], "1.0");
    assert_eq!(report["status"], "pass");
    assert_eq!(report["size_bytes"], 8192);
    assert_eq!(report["coverage"], "sampled");
    // Random pattern excluded by default: tests 1-6 only.
    assert_eq!(report["outcomes"].as_array().unwrap().len(), 6);
    assert!(report["failing_patterns"].as_array().unwrap().is_empty());

    std::fs::remove_file(&report_path).ok();
}

#[test]
fn include_random_runs_all_seven_patterns() {
    let report_path = temp_file("random-report.json");

    let output = Command::new(env!("CARGO_BIN_EXE_socketbench"))
        .args([
            "test",
            "--device",
            "sram",
            "--size",
            "8KiB",
            "--include-random",
            "--report",
            report_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["outcomes"].as_array().unwrap().len(), 7);

    std::fs::remove_file(&report_path).ok();
}

#[test]
fn plan_with_matching_expectation_gates_green() {
    let plan_path = temp_file("expected-fault-plan.yaml");
    let report_path = temp_file("expected-fault-report.json");
    // An address line stuck low aliases addresses; walking-address (2) and
    // address-equals-data (6) catch it, the constant patterns do not.
    std::fs::write(
        &plan_path,
        r#"
device: sram
size: 32KiB
faults:
  - kind: stuck_address
    bit: 7
    high: false
expect:
  failing_patterns: [2, 6]
"#,
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_socketbench"))
        .args([
            "test",
            "--plan",
            plan_path.to_str().unwrap(),
            "--report",
            report_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");
    assert!(
        output.status.success(),
        "expected failures should gate green: {:?}",
        output
    );

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["status"], "pass");
    assert_eq!(report["failing_patterns"], serde_json::json!([2, 6]));

    std::fs::remove_file(&plan_path).ok();
    std::fs::remove_file(&report_path).ok();
}

#[test]
fn unexpected_failure_exits_with_test_failure() {
    let plan_path = temp_file("unexpected-fault-plan.yaml");
    std::fs::write(
        &plan_path,
        r#"
device: sram
size: 32KiB
faults:
  - kind: stuck_address
    bit: 7
    high: false
"#,
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_socketbench"))
        .args(["test", "--plan", plan_path.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(1));

    std::fs::remove_file(&plan_path).ok();
}

#[test]
fn invalid_plan_exits_with_config_error() {
    let plan_path = temp_file("bad-plan.yaml");
    std::fs::write(&plan_path, "device: 8080\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_socketbench"))
        .args(["test", "--plan", plan_path.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(2));

    std::fs::remove_file(&plan_path).ok();
}

#[test]
fn oversize_memory_exits_with_config_error() {
    // Power of two, but past what 16 address lines can reach.
    let output = Command::new(env!("CARGO_BIN_EXE_socketbench"))
        .args(["test", "--device", "sram", "--size", "128KiB"])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cpu_device_is_rejected_for_pattern_tests() {
    let output = Command::new(env!("CARGO_BIN_EXE_socketbench"))
        .args(["test", "--device", "z80"])
        .output()
        .expect("Failed to execute command");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn patterns_subcommand_lists_the_catalogue() {
    let output = Command::new(env!("CARGO_BIN_EXE_socketbench"))
        .arg("patterns")
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1. Basic Read/Write"));
    assert!(stdout.contains("2. Walking Ones Address"));
    assert!(stdout.contains("7. Random Pattern"));
}

#[test]
fn status_subcommand_shows_the_shared_strobe_line() {
    for device in ["z80", "6502", "sram"] {
        let output = Command::new(env!("CARGO_BIN_EXE_socketbench"))
            .args(["status", "--device", device])
            .output()
            .expect("Failed to execute command");
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        // Pin 39 carries /RD, R/W or /OE depending on the class.
        assert!(stdout.contains("pin 39"), "{}: {}", device, stdout);
    }
}

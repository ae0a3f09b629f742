//! Runs the `spdk-nvme-queues` binary and checks its output streams and exit
//! status.

use std::process::{Command, Output};

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_spdk-nvme-queues"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to run spdk-nvme-queues")
}

#[test]
fn test_success_prints_bandwidth_only() {
    let output = run(&["--simulate", "-q", "2", "-n", "256"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let line = stdout
        .strip_prefix("bandwidth: ")
        .and_then(|rest| rest.strip_suffix(" B/s\n"))
        .unwrap_or_else(|| panic!("unexpected stdout: {:?}", stdout));
    assert!(line.parse::<u64>().unwrap() > 0);
    assert!(output.stderr.is_empty());
}

#[test]
fn test_failure_reported_with_logging_off() {
    // 3 blocks cannot be split into 2-block writes.
    let output = run(&["--simulate", "-n", "3", "-b", "2"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(stderr.lines().count(), 1, "stderr: {:?}", stderr);
    assert!(stderr.contains("not a multiple of 2 blocks per write"));
    assert!(!stderr.contains("bandwidth:"));
}

#[test]
fn test_no_color_when_not_a_terminal() {
    let output = Command::new(env!("CARGO_BIN_EXE_spdk-nvme-queues"))
        .args(["--simulate", "-n", "3", "-b", "2"])
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to run spdk-nvme-queues");
    assert_eq!(output.status.code(), Some(1));
    assert!(!output.stderr.contains(&0x1b));
}

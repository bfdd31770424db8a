#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/gpuremote-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("socket {path:?} never appeared");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn serve(path: &Path, sessions: usize) -> Child {
    let child = Command::new(env!("CARGO_BIN_EXE_gpuremote"))
        .args(["--log-level", "error", "--format", "json", "serve"])
        .arg(path)
        .args(["--sessions", &sessions.to_string()])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");
    wait_for_socket(path, Duration::from_secs(3));
    child
}

#[test]
fn demo_round_trip_against_serve() {
    let dir = unique_temp_dir("demo");
    let sock = dir.join("host.sock");
    let host = serve(&sock, 1);

    let output = Command::new(env!("CARGO_BIN_EXE_gpuremote"))
        .args(["--log-level", "error", "--format", "json", "demo"])
        .arg(&sock)
        .args(["--stream", "2", "--size", "32"])
        .output()
        .expect("demo should run");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "demo failed: {stdout}");
    assert!(stdout.contains("\"passed\":true"));
    assert!(stdout.contains("\"step\":\"request_adapter\",\"ok\":true"));
    assert!(stdout.contains("\"step\":\"verify_copy\",\"ok\":true"));
    assert!(stdout.contains("\"faults\":[]"));

    let host = host.wait_with_output().expect("serve should exit");
    assert!(host.status.success());
    let report = String::from_utf8_lossy(&host.stdout);
    assert!(report.contains("\"session_id\":\"session-1\""));
    assert!(report.contains("\"end\":\"shutdown requested\""));
    assert!(report.contains("\"faults\":0"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn info_reports_negotiated_streams() {
    let dir = unique_temp_dir("info");
    let sock = dir.join("host.sock");
    let host = serve(&sock, 1);

    let output = Command::new(env!("CARGO_BIN_EXE_gpuremote"))
        .args(["--log-level", "error", "--format", "json", "info"])
        .arg(&sock)
        .args(["--streams", "3"])
        .output()
        .expect("info should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"connected\":true"));
    assert!(stdout.contains("\"streams\":[\"stream-1\",\"stream-2\",\"stream-3\"]"));

    let host = host.wait_with_output().expect("serve should exit");
    assert!(host.status.success());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn info_timeout_returns_124() {
    let missing = unique_temp_dir("missing").join("none.sock");

    let output = Command::new(env!("CARGO_BIN_EXE_gpuremote"))
        .arg("info")
        .arg(&missing)
        .args(["--timeout", "1s"])
        .output()
        .expect("info should run");

    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn demo_rejects_unaligned_size() {
    let output = Command::new(env!("CARGO_BIN_EXE_gpuremote"))
        .args(["demo", "/tmp/unused.sock", "--size", "6"])
        .output()
        .expect("demo should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn serve_rejects_zero_queue_depth() {
    let sock = unique_temp_dir("depth").join("host.sock");
    let output = Command::new(env!("CARGO_BIN_EXE_gpuremote"))
        .arg("serve")
        .arg(&sock)
        .args(["--queue-depth", "0"])
        .output()
        .expect("serve should run");

    assert_eq!(output.status.code(), Some(64));
    assert!(!sock.exists());
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_gpuremote"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("gpuremote {}", env!("CARGO_PKG_VERSION")));
}

use std::{net::TcpListener, path::Path, process::Child, time::Duration};

use assert_cmd::Command;
use predicates::prelude::*;

const FAKE_WEED: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../weedctl-core/tests/fixtures/weed"
);

fn weedctl(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("weedctl").unwrap();
    cmd.env_clear()
        .env("PATH", std::env::var("PATH").unwrap_or_default())
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn dead_pid() -> u32 {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

fn fake_master(port: u16) -> Child {
    let child = std::process::Command::new("bash")
        .arg(FAKE_WEED)
        .arg("master")
        .arg(format!("-port={port}"))
        .stdout(std::process::Stdio::null())
        .spawn()
        .unwrap();
    // Let bash replace the forked test binary before anyone reads its cmdline.
    std::thread::sleep(Duration::from_millis(200));
    child
}

#[test]
fn status_of_an_empty_data_dir_is_nothing_tracked() {
    let dir = tempfile::tempdir().unwrap();

    weedctl(dir.path())
        .arg("status")
        .assert()
        .code(7)
        .stdout(predicate::str::contains("0/0 services running"));
}

#[test]
fn status_reports_a_recorded_service_that_is_running() {
    let dir = tempfile::tempdir().unwrap();
    let mut master = fake_master(19533);
    std::fs::write(dir.path().join("master.pid"), format!("{}\n", master.id())).unwrap();

    let assert = weedctl(dir.path())
        .args(["status", "--master-port", "19533"])
        .assert();

    master.kill().unwrap();
    master.wait().unwrap();
    assert
        .code(0)
        .stdout(predicate::str::contains("master  running"))
        .stdout(predicate::str::contains("1/1 services running"));
}

#[test]
fn status_treats_a_reused_pid_as_down() {
    let dir = tempfile::tempdir().unwrap();
    let mut other = std::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .unwrap();
    std::fs::write(dir.path().join("volume.pid"), format!("{}\n", other.id())).unwrap();

    let assert = weedctl(dir.path()).arg("status").assert();

    other.kill().unwrap();
    other.wait().unwrap();
    assert
        .code(6)
        .stdout(predicate::str::contains("volume  down"))
        .stdout(predicate::str::contains("0/1 services running"));
}

#[test]
fn stop_twice_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("master.pid"), format!("{}\n", dead_pid())).unwrap();

    weedctl(dir.path())
        .arg("stop")
        .assert()
        .success()
        .stderr(predicate::str::contains("stale"));
    assert!(!dir.path().join("master.pid").exists());

    weedctl(dir.path())
        .arg("stop")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing was running"))
        .stderr(predicate::str::contains("master has no PID file"));
}

#[test]
fn stop_kills_a_recorded_service() {
    let dir = tempfile::tempdir().unwrap();
    let mut master = fake_master(19633);
    std::fs::write(dir.path().join("master.pid"), format!("{}\n", master.id())).unwrap();

    weedctl(dir.path())
        .args(["stop", "--stop-timeout", "3", "--master-port", "19633"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stopped master"));

    assert!(master.wait().unwrap().success());
    assert!(!dir.path().join("master.pid").exists());
}

#[test]
fn stop_without_the_launch_flags_uses_the_recorded_argv() {
    let dir = tempfile::tempdir().unwrap();
    let mut master = fake_master(19733);
    std::fs::write(
        dir.path().join("master.pid"),
        format!("{}\nbash\n{FAKE_WEED}\nmaster\n-port=19733\n", master.id()),
    )
    .unwrap();

    weedctl(dir.path())
        .args(["stop", "--stop-timeout", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stopped master"));

    assert!(master.wait().unwrap().success());
    assert!(!dir.path().join("master.pid").exists());
}

#[test]
fn stop_leaves_a_reused_pid_running() {
    let dir = tempfile::tempdir().unwrap();
    let mut other = std::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .unwrap();
    std::fs::write(dir.path().join("master.pid"), format!("{}\n", other.id())).unwrap();

    let assert = weedctl(dir.path()).arg("stop").assert();

    let survived = other.try_wait().unwrap().is_none();
    other.kill().unwrap();
    other.wait().unwrap();
    assert!(survived, "stop killed an unrelated process");
    assert
        .success()
        .stdout(predicate::str::contains("Nothing was running"))
        .stderr(predicate::str::contains("stale"));
}

#[test]
fn stop_clears_malformed_pid_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("filer.pid"), "garbage").unwrap();

    weedctl(dir.path())
        .arg("stop")
        .assert()
        .success()
        .stderr(predicate::str::contains("removed unreadable pid file"));
    assert!(!dir.path().join("filer.pid").exists());
}

#[test]
fn missing_binary_exits_before_launching() {
    let dir = tempfile::tempdir().unwrap();

    weedctl(dir.path())
        .args(["start", "--binary", "/nonexistent/weed"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("/nonexistent/weed"));

    assert!(!dir.path().join("master.pid").exists());
}

#[test]
fn conflicting_ports_are_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();

    weedctl(dir.path())
        .args(["status", "--volume-port", "9333"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("9333"));
}

#[test]
fn disabling_master_alone_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    weedctl(dir.path())
        .args(["status", "--master=false"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("requires master"));
}

#[test]
fn busy_port_fails_preflight() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    // The listener's ephemeral port may be too high to leave room for gRPC.
    if port > 55535 {
        return;
    }

    weedctl(dir.path())
        .args(["start", "--volume=false", "--filer=false"])
        .arg("--binary")
        .arg(FAKE_WEED)
        .arg("--master-port")
        .arg(port.to_string())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already in use"));

    assert!(!dir.path().join("master.pid").exists());
}

#[test]
fn readiness_timeout_shows_the_log_tail() {
    let dir = tempfile::tempdir().unwrap();

    weedctl(dir.path())
        .args([
            "start",
            "--volume=false",
            "--filer=false",
            "--master-port",
            "19433",
            "--startup-timeout",
            "1",
            "--health-timeout",
            "1",
            "--poll-interval-ms",
            "200",
        ])
        .arg("--binary")
        .arg(FAKE_WEED)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("fake weed starting master"));

    assert!(!dir.path().join("master.pid").exists());
}

#![cfg(all(unix, feature = "cli"))]

use std::io::Read;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread;

use bytes::BytesMut;
use groundlink_frame::{decode_packet, RawPacket};

const MISSION_CLEAR_ALL: u32 = 45;
const SET_POSITION_TARGET_LOCAL_NED: u32 = 84;

fn groundlink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_groundlink"));
    for var in [
        "GROUNDLINK_MODE",
        "GROUNDLINK_SERIAL_PATH",
        "GROUNDLINK_BAUD",
        "GROUNDLINK_TCP_HOST",
        "GROUNDLINK_TCP_PORT",
        "GROUNDLINK_LOG_LEVEL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn run_against(port: u16, args: &[&str]) -> Output {
    groundlink()
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .args(["--format", "json", "--connect-timeout", "3s"])
        .args(args)
        .output()
        .expect("groundlink should run")
}

/// Accept one connection and collect the packets written until EOF.
fn fake_vehicle() -> (u16, thread::JoinHandle<Vec<RawPacket>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should work");
    let port = listener.local_addr().expect("local addr").port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept should work");
        let mut bytes = Vec::new();
        let _ = stream.read_to_end(&mut bytes);
        let mut buf = BytesMut::from(&bytes[..]);
        let mut packets = Vec::new();
        while let Some(packet) = decode_packet(&mut buf) {
            packets.push(packet);
        }
        packets
    });
    (port, handle)
}

fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should work");
    listener.local_addr().expect("local addr").port()
}

fn temp_file(tag: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "groundlink-{tag}-{}-{}.json",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::write(&path, contents).expect("temp file should be writable");
    path
}

#[test]
fn version_prints_name() {
    let output = groundlink().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("groundlink "));
}

#[test]
fn refused_connect_returns_transport_error() {
    let port = unused_port();
    let output = run_against(port, &["mission", "clear"]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"));
}

#[test]
fn unknown_mode_is_usage_error() {
    let output = groundlink()
        .args(["--mode", "udp", "params"])
        .output()
        .expect("groundlink should run");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn unknown_command_fails_before_connecting() {
    let port = unused_port();
    let output = run_against(port, &["command", "NOT_A_COMMAND"]);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NOT_A_COMMAND"));
}

#[test]
fn fractional_command_int_coordinate_fails_before_connecting() {
    let port = unused_port();
    let output = run_against(
        port,
        &[
            "command",
            "DO_REPOSITION",
            "--int",
            "--params",
            "0,0,0,0,47.3977,8.5456,30",
        ],
    );
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("param5"));
}

#[test]
fn invalid_mission_file_is_data_invalid() {
    let path = temp_file("bad-plan", "{\"0\": {\"type\": \"WAYPOINT\"");
    let port = unused_port();
    let output = run_against(port, &["mission", "upload", path.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(60));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn mission_clear_reaches_vehicle() {
    let (port, vehicle) = fake_vehicle();
    let output = run_against(port, &["mission", "clear"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let summary: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("dispatch summary should be json");
    assert_eq!(summary["action"], "mission-clear");
    assert_eq!(summary["target"], "1/1");

    let packets = vehicle.join().expect("vehicle thread");
    let ids: Vec<u32> = packets.iter().map(|p| p.message_id).collect();
    assert_eq!(ids, [MISSION_CLEAR_ALL]);
    assert_eq!(packets[0].system_id, 254);
}

#[test]
fn goto_local_sends_position_target() {
    let (port, vehicle) = fake_vehicle();
    let output = run_against(port, &["goto-local", "5", "0", "-10"]);
    assert!(output.status.success());

    let packets = vehicle.join().expect("vehicle thread");
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].message_id, SET_POSITION_TARGET_LOCAL_NED);
}

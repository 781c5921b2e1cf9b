#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};

use codrone::frame::{DeviceType, Frame, FrameReader, FrameWriter, Received};
use codrone::link::{Ack, MessageKind, Payload, State};

fn unique_sock(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "codrone-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir.join("bridge.sock")
}

fn codrone(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_codrone"))
        .args(["--log-level", "error"])
        .args(args)
        .output()
        .expect("codrone should run")
}

fn wire(kind: MessageKind, payload: &[u8]) -> Vec<u8> {
    let frame = Frame::new(kind, DeviceType::Drone, DeviceType::Base, payload.to_vec())
        .expect("frame should build");
    let mut writer = FrameWriter::new(Vec::new());
    writer.write_frame(&frame).expect("frame should encode");
    writer.into_inner()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Accepts one connection and acknowledges Commands unless `silent`.
/// Returns the kinds it received.
fn fake_drone(listener: UnixListener, silent: bool) -> JoinHandle<Vec<MessageKind>> {
    thread::spawn(move || {
        let (socket, _) = listener.accept().expect("accept should succeed");
        let mut writer = socket.try_clone().expect("clone should succeed");
        let mut reader = FrameReader::new(socket);
        let mut seen = Vec::new();

        while let Ok(received) = reader.read_frame() {
            let Received::Frame(frame) = received else {
                continue;
            };
            seen.push(frame.kind());
            if silent || frame.kind() != MessageKind::Command {
                continue;
            }
            let ack = Ack::new(MessageKind::Command).to_bytes();
            if writer.write_all(&wire(MessageKind::Ack, &ack)).is_err() {
                break;
            }
        }
        seen
    })
}

#[test]
fn encode_prints_wire_bytes() {
    let output = codrone(&[
        "--format", "json", "encode", "--kind", "request", "--hex", "40",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"bytes\":\"0a5504017010400d6c\""), "{stdout}");
    assert!(stdout.contains("\"kind\":\"Request\""));
}

#[test]
fn encode_rejects_oversized_payload() {
    let payload = "00".repeat(256);
    let output = codrone(&["encode", "--kind", "0x86", "--hex", &payload]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn decode_skips_noise_and_corrupt_frames() {
    let state = State {
        battery: 55,
        ..State::default()
    };
    let mut corrupt = wire(MessageKind::State, &state.to_bytes());
    corrupt[8] ^= 0xFF;

    let mut capture = vec![0x00, 0x0A, 0x13];
    capture.extend(&corrupt);
    capture.extend(wire(MessageKind::State, &state.to_bytes()));
    capture.extend(wire(MessageKind::Rssi, &[0xC4]));

    let output = codrone(&["--format", "json", "decode", "--hex", &hex(&capture)]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();
    assert_eq!(lines.len(), 3, "{stdout}");
    assert_eq!(lines[0]["kind"], "State");
    assert_eq!(lines[0]["message"]["battery"], 55);
    assert_eq!(lines[1]["kind"], "Rssi");
    assert_eq!(lines[2]["frames"], 2);
    assert_eq!(lines[2]["checksum_errors"], 1);
}

#[test]
fn confirmed_send_succeeds_when_acknowledged() {
    let sock = unique_sock("confirm");
    let listener = UnixListener::bind(&sock).expect("bind should succeed");
    let drone = fake_drone(listener, false);

    let output = codrone(&[
        "--format",
        "json",
        "send",
        sock.to_str().expect("utf-8 path"),
        "--kind",
        "command",
        "--hex",
        "0100",
        "--confirm",
    ]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"confirmed\":true"));
    assert_eq!(drone.join().expect("drone thread"), vec![MessageKind::Command]);

    let _ = std::fs::remove_file(&sock);
}

#[test]
fn unacknowledged_send_exits_124_after_retries() {
    let sock = unique_sock("silent");
    let listener = UnixListener::bind(&sock).expect("bind should succeed");
    let drone = fake_drone(listener, true);

    let output = codrone(&[
        "send",
        sock.to_str().expect("utf-8 path"),
        "--kind",
        "command",
        "--hex",
        "0100",
        "--confirm",
        "--retries",
        "2",
        "--ack-timeout",
        "100ms",
    ]);

    assert_eq!(output.status.code(), Some(124));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("after 2 attempts"), "{stderr}");
    assert_eq!(
        drone.join().expect("drone thread"),
        vec![MessageKind::Command, MessageKind::Command]
    );

    let _ = std::fs::remove_file(&sock);
}

#[test]
fn missing_bridge_exits_with_transport_error() {
    let sock = unique_sock("missing");
    let output = codrone(&[
        "send",
        sock.to_str().expect("utf-8 path"),
        "--kind",
        "ping",
    ]);

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is the bridge running"), "{stderr}");
}

#[test]
fn monitor_prints_filtered_frames() {
    let sock = unique_sock("monitor");
    let listener = UnixListener::bind(&sock).expect("bind should succeed");
    let drone = thread::spawn(move || {
        let (mut socket, _) = listener.accept().expect("accept should succeed");
        let mut bytes = wire(MessageKind::Rssi, &[0xC4]);
        bytes.extend(wire(
            MessageKind::State,
            &State {
                battery: 77,
                ..State::default()
            }
            .to_bytes(),
        ));
        socket.write_all(&bytes).expect("write should succeed");
        // Keep the socket open until the monitor hangs up.
        let mut sink = Vec::new();
        let _ = std::io::Read::read_to_end(&mut socket, &mut sink);
    });

    let output = codrone(&[
        "--format",
        "json",
        "monitor",
        sock.to_str().expect("utf-8 path"),
        "--kinds",
        "state",
        "--count",
        "1",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("one JSON line expected");
    assert_eq!(line["kind"], "State");
    assert_eq!(line["message"]["battery"], 77);
    drone.join().expect("drone thread");

    let _ = std::fs::remove_file(&sock);
}

#[test]
fn version_prints_name() {
    let output = codrone(&["version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("codrone "));
}

#![cfg(unix)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/sfu-signal-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn write_config(dir: &Path, num_workers: u32) -> PathBuf {
    let config = format!(
        r#"{{
            "https": {{"listenIp": "127.0.0.1", "listenPort": 0}},
            "mediasoup": {{
                "numWorkers": {num_workers},
                "workerPath": "{dir}/no-such-worker",
                "unixPath": "{dir}/sockets",
                "startupTimeoutMs": 500,
                "routerOptions": {{"mediaCodecs": [
                    {{"kind": "audio", "mimeType": "audio/opus", "clockRate": 48000, "channels": 2}},
                    {{"kind": "video", "mimeType": "video/VP8", "clockRate": 90000}}
                ]}},
                "webRtcTransportOptions": {{"listenIps": [{{"ip": "127.0.0.1"}}]}}
            }}
        }}"#,
        dir = dir.display()
    );
    let path = dir.join("config.json");
    std::fs::write(&path, config).expect("config should be writable");
    path
}

fn netstring(payload: &[u8]) -> Vec<u8> {
    let mut out = format!("{}:", payload.len()).into_bytes();
    out.extend_from_slice(payload);
    out.push(b',');
    out
}

fn cli() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sfu-signal"));
    command.arg("--log-level").arg("error");
    command.env_remove("SFU_SIGNAL_CONFIG");
    command
}

fn stdout_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect()
}

#[test]
fn version_prints_name_and_version() {
    let output = cli().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("sfu-signal {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn extended_version_as_json() {
    let output = cli()
        .args(["--format", "json", "version", "--extended"])
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let lines = stdout_lines(&output);
    assert_eq!(lines[0]["name"], "sfu-signal");
    assert!(lines[0]["target"].is_string());
}

#[test]
fn caps_lists_router_codecs() {
    let dir = unique_temp_dir("caps");
    let config = write_config(&dir, 1);

    let output = cli()
        .args(["--format", "json", "caps", "--config"])
        .arg(&config)
        .output()
        .expect("caps should run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let caps = &stdout_lines(&output)[0];
    let codecs = caps["codecs"].as_array().expect("codecs array");
    assert_eq!(codecs[0]["mimeType"], "audio/opus");
    assert_eq!(codecs[0]["preferredPayloadType"], 100);
    assert_eq!(codecs[1]["mimeType"], "video/VP8");
    assert_eq!(codecs[2]["mimeType"], "video/rtx");
    assert_eq!(codecs[2]["parameters"]["apt"], codecs[1]["preferredPayloadType"]);
    assert!(!caps["headerExtensions"].as_array().unwrap().is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn caps_reads_config_path_from_env() {
    let dir = unique_temp_dir("caps-env");
    let config = write_config(&dir, 1);

    let output = cli()
        .env("SFU_SIGNAL_CONFIG", &config)
        .args(["--format", "pretty", "caps"])
        .output()
        .expect("caps should run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("video/VP8"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_config_exits_with_config_code() {
    let dir = unique_temp_dir("bad-config");
    let config = write_config(&dir, 0);

    let output = cli()
        .args(["caps", "--config"])
        .arg(&config)
        .output()
        .expect("caps should run");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("numWorkers"));

    let missing = cli()
        .args(["serve", "--config"])
        .arg(dir.join("missing.json"))
        .output()
        .expect("serve should run");
    assert_eq!(missing.status.code(), Some(2));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn serve_fails_when_worker_cannot_start() {
    let dir = unique_temp_dir("serve");
    let config = write_config(&dir, 1);

    let output = cli()
        .args(["serve", "--listen", "127.0.0.1:0", "--config"])
        .arg(&config)
        .output()
        .expect("serve should run");
    assert_eq!(output.status.code(), Some(10));
    assert!(String::from_utf8_lossy(&output.stderr).contains("worker"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_classifies_captured_frames() {
    let dir = unique_temp_dir("decode");
    let capture = dir.join("capture.bin");
    let mut bytes = Vec::new();
    bytes.extend(netstring(br#"{"id":1,"method":"worker.dump"}"#));
    bytes.extend(netstring(br#"{"id":1,"accepted":true,"data":{"pid":42}}"#));
    bytes.extend(netstring(br#"{"targetId":"c1","event":"producerpause"}"#));
    bytes.extend(netstring(b"Dchannel ready"));
    std::fs::write(&capture, bytes).expect("capture should be writable");

    let output = cli()
        .args(["--format", "json", "decode"])
        .arg(&capture)
        .output()
        .expect("decode should run");
    assert!(output.status.success());

    let frames = stdout_lines(&output);
    let kinds: Vec<&str> = frames.iter().map(|f| f["kind"].as_str().unwrap()).collect();
    assert_eq!(kinds, ["request", "response", "notification", "log"]);
    assert_eq!(frames[1]["payload"]["data"]["pid"], 42);
    assert_eq!(frames[3]["summary"], "debug: channel ready");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn decode_reads_stdin_and_reports_truncation() {
    let mut child = cli()
        .args(["--format", "json", "decode"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("decode should start");

    let mut bytes = netstring(br#"{"event":"running","targetId":"1234"}"#);
    bytes.extend_from_slice(b"20:{\"id\":2");
    {
        let mut stdin = child.stdin.take().expect("stdin should be piped");
        stdin.write_all(&bytes).expect("stdin should accept input");
    }

    let output = child.wait_with_output().expect("decode should finish");
    assert_eq!(output.status.code(), Some(60));
    let frames = stdout_lines(&output);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["summary"], "target=1234 event=running");
    assert!(String::from_utf8_lossy(&output.stderr).contains("frame 1"));
}

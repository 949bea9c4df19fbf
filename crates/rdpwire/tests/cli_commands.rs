#![cfg(all(unix, feature = "cli"))]

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use rdpwire::peer::{Connection, Protocol, ProtocolConfig};
use rdpwire::transport::Endpoint;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/rdpwire-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_connect(path: &Path, config: ProtocolConfig, timeout: Duration) -> io::Result<Connection> {
    let endpoint = Endpoint::Unix(path.to_path_buf());
    let start = Instant::now();
    loop {
        match Protocol::with_config(config.clone()).connect(&endpoint) {
            Ok(connection) => return Ok(connection),
            Err(err) => {
                if start.elapsed() >= timeout {
                    return Err(io::Error::other(format!("connect timeout: {err}")));
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

/// Start the echo server and wait until it accepts connections.
fn spawn_echo(sock_path: &Path, extra: &[&str]) -> Child {
    let child = Command::new(env!("CARGO_BIN_EXE_rdpwire"))
        .arg("--log-level")
        .arg("error")
        .arg("echo")
        .arg(sock_path)
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("echo command should start");

    wait_for_connect(sock_path, ProtocolConfig::default(), Duration::from_secs(3))
        .expect("echo server should accept")
        .close()
        .expect("probe connection should close");
    child
}

fn stop(mut child: Child, dir: &Path) {
    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}

fn run_with_stdin(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_rdpwire"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("command should start");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin)
        .expect("stdin should accept input");
    child.wait_with_output().expect("command should finish")
}

#[test]
fn encode_then_decode_roundtrip() {
    let encoded = run_with_stdin(&["encode"], br#"{"to":"root","type":"listTabs"} [1,2]"#);
    assert!(encoded.status.success());
    assert_eq!(
        encoded.stdout,
        br#"31:{"to":"root","type":"listTabs"}5:[1,2]"#
    );

    let decoded = run_with_stdin(&["--format", "json", "decode"], &encoded.stdout);
    assert!(decoded.status.success());
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&decoded.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["kind"], "packet");
    assert_eq!(lines[0]["body"]["type"], "listTabs");
    assert_eq!(lines[1]["body"], serde_json::json!([1, 2]));
}

#[test]
fn decode_raw_prints_payload_lines() {
    let output = run_with_stdin(&["--format", "raw", "decode"], b"4:true2:{}");
    assert!(output.status.success());
    assert_eq!(output.stdout, b"true\n{}\n");
}

#[test]
fn decode_truncated_input_is_data_invalid() {
    let output = run_with_stdin(&["decode"], b"12:{\"from\"");
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn decode_strict_rejects_malformed_header() {
    let output = run_with_stdin(&["decode", "--strict"], b"abc:{}");
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid length"));
}

#[test]
fn send_wait_prints_echoed_reply() {
    let dir = unique_temp_dir("send");
    let sock_path = dir.join("echo.sock");
    let child = spawn_echo(&sock_path, &[]);

    let output = Command::new(env!("CARGO_BIN_EXE_rdpwire"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("send")
        .arg(&sock_path)
        .arg("--to")
        .arg("root")
        .arg("--type")
        .arg("listTabs")
        .arg("--wait")
        .output()
        .expect("send should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let reply: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("reply should be json");
    assert_eq!(reply["kind"], "reply");
    assert_eq!(reply["body"]["type"], "listTabs");

    stop(child, &dir);
}

#[test]
fn listen_prints_event_after_greeting() {
    let dir = unique_temp_dir("listen");
    let sock_path = dir.join("echo.sock");
    let child = spawn_echo(
        &sock_path,
        &["--greeting", "--event", r#"{"from":"root","type":"tabListChanged"}"#],
    );

    let output = Command::new(env!("CARGO_BIN_EXE_rdpwire"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("raw")
        .arg("listen")
        .arg(&sock_path)
        .arg("--greeting")
        .arg("--count")
        .arg("1")
        .output()
        .expect("listen should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        r#"{"from":"root","type":"tabListChanged"}"#
    );

    stop(child, &dir);
}

#[test]
fn library_client_talks_to_echo_binary() {
    let dir = unique_temp_dir("library");
    let sock_path = dir.join("echo.sock");
    let child = spawn_echo(&sock_path, &["--greeting"]);

    let connection = wait_for_connect(
        &sock_path,
        ProtocolConfig::default().with_greeting(),
        Duration::from_secs(3),
    )
    .expect("client should connect");
    let reply = connection
        .protocol()
        .request::<_, serde_json::Value>(&serde_json::json!({"to": "root", "type": "echo", "n": 7}))
        .expect("request should send");
    assert_eq!(reply.wait().expect("reply should arrive")["n"], 7);
    connection.close().expect("connection should close");

    stop(child, &dir);
}

#[test]
fn send_wait_reports_close_before_reply() {
    let dir = unique_temp_dir("hangup");
    let sock_path = dir.join("hangup.sock");
    let listener =
        std::os::unix::net::UnixListener::bind(&sock_path).expect("socket should bind");
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("client should connect");
        let mut request = [0u8; 8];
        let _ = std::io::Read::read(&mut stream, &mut request);
    });

    let started = Instant::now();
    let output = Command::new(env!("CARGO_BIN_EXE_rdpwire"))
        .arg("send")
        .arg(&sock_path)
        .arg("--json")
        .arg("{}")
        .arg("--wait")
        .arg("--wait-timeout")
        .arg("30s")
        .output()
        .expect("send should run");
    server.join().expect("server thread should finish");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connection closed before reply"));
    assert!(started.elapsed() < Duration::from_secs(30));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_to_missing_socket_fails() {
    let dir = unique_temp_dir("missing");
    let output = Command::new(env!("CARGO_BIN_EXE_rdpwire"))
        .arg("send")
        .arg(dir.join("nobody.sock"))
        .arg("--json")
        .arg("{}")
        .output()
        .expect("send should run");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_rdpwire"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("rdpwire {}", env!("CARGO_PKG_VERSION"))
    );
}

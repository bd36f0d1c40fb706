// crates/stoney-cli/tests/common/mod.rs
// ============================================================================
// Module: Common CLI Test Fixtures
// Description: Binary invocation, suite files, and local HTTP targets.
// Purpose: Provide reusable infrastructure for CLI tests.
// Dependencies: serde_json, tempfile, tiny_http
// ============================================================================

//! ## Overview
//! Every invocation runs in its own temporary working directory with the
//! `STONEY_*` and `JIRA_*` variables removed, so the host environment and any
//! `stoney.toml` on disk never influence a test.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;
use std::thread;

use serde_json::Value;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Binary
// ============================================================================

/// Variables cleared before every invocation.
const CLEARED_VARS: &[&str] = &[
    "STONEY_CONFIG",
    "STONEY_BASE_URL",
    "STONEY_TIMEOUT_MS",
    "STONEY_RETRIES",
    "STONEY_BACKOFF_MS",
    "STONEY_EVENTS",
    "STONEY_EVENTS_PATH",
    "JIRA_BASE_URL",
    "JIRA_EMAIL",
    "JIRA_API_TOKEN",
];

pub fn stoney_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_stoney"))
}

/// Builds a `stoney` command rooted at `dir` with a clean environment.
pub fn stoney(dir: &Path) -> Command {
    let mut command = Command::new(stoney_bin());
    command.current_dir(dir);
    for name in CLEARED_VARS {
        command.env_remove(name);
    }
    command
}

pub fn run(command: &mut Command) -> Output {
    command.output().expect("run stoney")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// ============================================================================
// SECTION: Files
// ============================================================================

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

pub fn read_report(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read report")).expect("report json")
}

/// Suite with one passing process scenario.
pub const ECHO_SUITE: &str = "\
version: 1
suite: cli-smoke
contracts:
  - name: shell
    scenarios:
      - id: echo
        steps:
          - exec: { run: echo hello }
            expect: { stdout_contains: hello }
";

/// Suite with one passing and one failing process scenario.
pub const MIXED_SUITE: &str = "\
version: 1
suite: cli-mixed
contracts:
  - name: shell
    scenarios:
      - id: echo
        exec: { run: echo hello }
        expect: { stdout_contains: hello }
      - id: broken
        exec: { run: exit 3 }
";

/// Suite with one HTTP scenario.
pub const HEALTH_SUITE: &str = "\
version: 1
suite: cli-http
contracts:
  - name: health
    scenarios:
      - id: ping
        http: { method: GET, path: /health }
        expect: { status: 200, json: { status: ok } }
";

// ============================================================================
// SECTION: HTTP Targets
// ============================================================================

/// Serves `body` as JSON with `status` for every request; returns the base URL.
pub fn spawn_json_server(status: u16, body: Value) -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    thread::spawn(move || {
        for request in server.incoming_requests() {
            let header =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response =
                Response::from_string(body.to_string()).with_status_code(status).with_header(header);
            let _ = request.respond(response);
        }
    });
    format!("http://{addr}")
}

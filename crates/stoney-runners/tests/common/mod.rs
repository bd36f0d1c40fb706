// crates/stoney-runners/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared HTTP targets, event capture, and suite builders.
// Purpose: Provide reusable infrastructure for runner tests.
// Dependencies: stoney-core, stoney-runners, tiny_http
// ============================================================================

//! ## Overview
//! Local `tiny_http` targets on `127.0.0.1:0`, an in-memory event sink, and
//! fast retry defaults so timeout and retry tests finish quickly.

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

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use stoney_core::StaticEnv;
use stoney_core::SuiteDocument;
use stoney_core::load_suite_value;
use stoney_runners::CancelSignal;
use stoney_runners::RunEvent;
use stoney_runners::RunEventSink;
use stoney_runners::RunnerDefaults;
use stoney_runners::StepContext;
use tiny_http::Header;
use tiny_http::Request;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Sink that keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn tags(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|event| serde_json::to_value(event).unwrap()["event"].as_str().unwrap().to_string())
            .collect()
    }
}

impl RunEventSink for RecordingSink {
    fn record(&self, event: &RunEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Contexts
// ============================================================================

/// Defaults with short timeouts and backoff.
pub fn fast_defaults() -> RunnerDefaults {
    RunnerDefaults {
        timeout: Duration::from_secs(5),
        http_retries: 0,
        backoff: Duration::from_millis(10),
    }
}

/// Builds a context over borrowed collaborators.
pub fn context<'a>(
    defaults: &'a RunnerDefaults,
    cancel: &'a CancelSignal,
    events: &'a RecordingSink,
) -> StepContext<'a> {
    StepContext {
        defaults,
        cancel,
        events,
    }
}

// ============================================================================
// SECTION: HTTP Targets
// ============================================================================

/// Running local HTTP target.
pub struct TestServer {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serves every request with `handler` on a background thread.
pub fn spawn_server<F>(handler: F) -> TestServer
where
    F: Fn(Request) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        for request in server.incoming_requests() {
            counter.fetch_add(1, Ordering::SeqCst);
            handler(request);
        }
    });
    TestServer {
        base_url: format!("http://{addr}"),
        hits,
    }
}

/// Responds with a JSON body.
pub fn respond_json(request: Request, status: u16, body: &Value) {
    let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
    let response =
        Response::from_string(body.to_string()).with_status_code(status).with_header(header);
    let _ = request.respond(response);
}

/// Holds every request open for `delay` before answering.
pub fn spawn_slow_server(delay: Duration) -> TestServer {
    spawn_server(move |request| {
        thread::spawn(move || {
            thread::sleep(delay);
            let _ = request.respond(Response::from_string("late"));
        });
    })
}

// ============================================================================
// SECTION: Suites
// ============================================================================

/// Loads a suite document with an empty environment.
pub fn suite(document: &Value) -> SuiteDocument {
    load_suite_value(document, &StaticEnv::new()).unwrap()
}

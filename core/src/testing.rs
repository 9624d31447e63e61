//! Test doubles shared by the unit tests.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::http::{Headers, HttpRequest, HttpResponse};
use crate::plugin::{CallContext, Plugin};
use crate::serializer::RawResponse;
use crate::transport::Transport;

/// Answers every request with the same response or error.
#[derive(Debug)]
pub(crate) struct CannedTransport {
    outcome: Result<HttpResponse, TransportError>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl CannedTransport {
    pub(crate) fn ok(status: u16, body: &'static str) -> Self {
        Self::respond(HttpResponse {
            status,
            headers: Headers::new(),
            body: Bytes::from_static(body.as_bytes()),
        })
    }

    pub(crate) fn respond(response: HttpResponse) -> Self {
        Self {
            outcome: Ok(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(error: TransportError) -> Self {
        Self {
            outcome: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Transport for CannedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.outcome.clone()
    }
}

/// Never answers. Records whether an in-flight exchange was dropped.
#[derive(Debug, Default)]
pub(crate) struct HangingTransport {
    started: AtomicUsize,
    aborted: Arc<AtomicBool>,
}

impl HangingTransport {
    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for HangingTransport {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let _guard = SetOnDrop(self.aborted.clone());
        std::future::pending::<()>().await;
        Err(TransportError::Timeout)
    }
}

/// Logs every hook it sees as `"<name>:<hook>"`.
#[derive(Debug, Clone)]
pub(crate) struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub(crate) fn new(name: &'static str) -> Self {
        Self::sharing(name, Arc::default())
    }

    pub(crate) fn sharing(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { name, log }
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Events with the plugin name stripped.
    pub(crate) fn hooks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| event.split_once(':').map(|(_, hook)| hook.to_string()))
            .collect()
    }

    fn record(&self, hook: &str) {
        self.log.lock().unwrap().push(format!("{}:{hook}", self.name));
    }
}

impl Plugin for Recorder {
    fn will_send(&self, _ctx: &CallContext) {
        self.record("will_send");
    }

    fn will_send_materialized(&self, _ctx: &CallContext, _request: &HttpRequest) {
        self.record("will_send_materialized");
    }

    fn did_send(&self, _ctx: &CallContext, _request: &HttpRequest) {
        self.record("did_send");
    }

    fn will_process_response(&self, _ctx: &CallContext, _raw: &RawResponse) {
        self.record("will_process_response");
    }

    fn did_parse_success(&self, _ctx: &CallContext, _raw: &RawResponse, _model: &dyn Any) {
        self.record("did_parse_success");
    }

    fn did_receive_error(&self, _ctx: &CallContext, _raw: &RawResponse, _error: &dyn std::error::Error) {
        self.record("did_receive_error");
    }
}

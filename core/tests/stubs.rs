//! Stubbed calls exercised through the public API only.
//!
//! # Design
//! The transport here panics on use: any test that reaches the network has
//! failed to stub. Delays run on tokio's paused clock.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use typed_http::{
    serializer, CallContext, CallPhase, Empty, Endpoint, EndpointConfig, HttpRequest, HttpResponse,
    Inline, MultipartForm, Plugin, RawResponse, SerialQueue, Stub, Transport, TransportError,
};

struct Unreachable;

#[async_trait]
impl Transport for Unreachable {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        panic!("stubbed call reached the transport: {}", request.url);
    }
}

fn endpoint() -> Arc<Endpoint> {
    Endpoint::builder("https://httpbin.org")
        .transport(Arc::new(Unreachable))
        .executor(Arc::new(Inline))
        .stubbing_enabled(true)
        .build()
        .unwrap()
}

#[derive(Debug, Deserialize, PartialEq)]
struct Title {
    title: String,
}

/// Counts the hooks that every call must reach.
#[derive(Default)]
struct Completeness {
    will_send: AtomicUsize,
    successes: AtomicUsize,
    errors: AtomicUsize,
}

impl Completeness {
    fn counts(&self) -> (usize, usize, usize) {
        (
            self.will_send.load(Ordering::SeqCst),
            self.successes.load(Ordering::SeqCst),
            self.errors.load(Ordering::SeqCst),
        )
    }
}

impl Plugin for Completeness {
    fn will_send(&self, _ctx: &CallContext) {
        self.will_send.fetch_add(1, Ordering::SeqCst);
    }

    fn did_parse_success(&self, _ctx: &CallContext, _raw: &RawResponse, _model: &dyn Any) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn did_receive_error(&self, _ctx: &CallContext, _raw: &RawResponse, _error: &dyn std::error::Error) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn get_stub_delivers_text_on_the_main_queue() {
    let (main, mut runner) = SerialQueue::new();
    let delivered = Arc::new(Mutex::new(None));

    let sink = delivered.clone();
    let handle = endpoint()
        .get("get")
        .stub(Stub::success("{}"))
        .text()
        .executor(Arc::new(main))
        .perform(move |text| *sink.lock().unwrap() = Some(text), |err| panic!("{err}"));

    assert!(runner.run_next().await);
    assert_eq!(delivered.lock().unwrap().as_deref(), Some("{}"));
    assert_eq!(handle.phase(), CallPhase::Completed);
}

#[tokio::test(start_paused = true)]
async fn multipart_stub_decodes_model() {
    let model = endpoint()
        .upload("post", MultipartForm::new())
        .parameter("foo", "bar")
        .stub(Stub::success(r#"{"title":"not empty"}"#))
        .json::<Title>()
        .await
        .unwrap();
    assert_eq!(model.title, "not empty");
}

#[tokio::test(start_paused = true)]
async fn stub_delivers_only_after_its_delay() {
    let delivered = Arc::new(AtomicBool::new(false));
    let flag = delivered.clone();
    endpoint()
        .get("get")
        .stub(Stub::success("{}").delay(Duration::from_millis(200)))
        .perform_collecting(move |_| flag.store(true, Ordering::SeqCst));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!delivered.load(Ordering::SeqCst));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(delivered.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn stub_bytes_go_through_the_request_serializer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let serializer = serializer::from_fn(move |bytes: &[u8]| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(bytes.len())
    });

    let len = endpoint()
        .get("get")
        .stub(Stub::success("12345"))
        .serializer(serializer)
        .await
        .unwrap();
    assert_eq!(len, 5);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_model_succeeds_on_any_body() {
    for body in ["", "not json at all", "{}"] {
        let model = endpoint().get("empty").stub(Stub::success(body)).empty().await.unwrap();
        assert_eq!(model, Empty);
    }
}

#[tokio::test(start_paused = true)]
async fn every_call_reaches_exactly_one_terminal_hook() {
    let plugin = Arc::new(Completeness::default());
    let endpoint = endpoint();
    endpoint.add_plugin(plugin.clone());

    endpoint.get("a").stub(Stub::success("{}")).await.unwrap();
    endpoint
        .get("b")
        .stub(Stub::failure(TransportError::Timeout))
        .await
        .unwrap_err();
    endpoint.get("c").stub(Stub::success("nope")).json::<Title>().await.unwrap_err();

    assert_eq!(plugin.counts(), (3, 1, 2));
}

#[tokio::test(start_paused = true)]
async fn failing_stub_reports_its_error() {
    let err = endpoint()
        .get("status/500")
        .stub(Stub::failure(TransportError::Connect("refused".into())))
        .text()
        .await
        .unwrap_err();
    assert_eq!(err.transport_error(), Some(&TransportError::Connect("refused".into())));
}

#[tokio::test(start_paused = true)]
async fn stubbing_follows_endpoint_configuration() {
    let endpoint = Endpoint::builder("https://httpbin.org")
        .transport(Arc::new(Unreachable))
        .build()
        .unwrap();
    assert!(!endpoint.stubbing_enabled());
    let request = endpoint.get("get").stub(Stub::success("{}"));
    assert!(!request.is_stubbing());

    let config = EndpointConfig {
        stubbing_enabled: true,
        stub_delay_ms: 0,
        ..EndpointConfig::new("https://httpbin.org")
    };
    let configured = Endpoint::from_config(&config, Some(Arc::new(Unreachable))).unwrap();
    let start = tokio::time::Instant::now();
    configured.get("get").stub(Stub::success("{}")).await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn misconfigured_stub_never_completes() {
    let handle = endpoint()
        .get("get")
        .stub(Stub::new(true))
        .perform(|_| panic!("success"), |_| panic!("failure"));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.phase(), CallPhase::Skipped);
}

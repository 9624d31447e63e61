//! The body of one dispatched call.
//!
//! Runs, in order: will-send, materialization, will-send-materialized, then
//! either the stub engine or the transport (followed by did-send and
//! validation), the optional download write, will-process-response, parsing,
//! and exactly one of did-parse-success or did-receive-error. Every step
//! for one call happens on a single task, so hooks never interleave.

use std::path::Path;
use std::time::Duration;

use uuid::Uuid;

use crate::call::{CallState, Response};
use crate::error::TransportError;
use crate::http::HttpRequest;
use crate::plugin::{CallContext, PluginSet};
use crate::request::Request;
use crate::serializer::{ErrorSerializer, RawResponse, ResponseMeta, ResponseSerializer};
use crate::stub::Stub;

struct Call {
    ctx: CallContext,
    plugins: PluginSet,
}

impl Call {
    fn new<M, E>(request: &Request<M, E>, id: Uuid, stubbed: bool) -> Self {
        Self {
            ctx: CallContext {
                id,
                method: request.method,
                path: request.path.clone(),
                parameters: request.parameters.clone(),
                headers: request.headers.clone(),
                auth: request.auth,
                stubbed,
            },
            plugins: PluginSet::new(&request.plugins, &request.global_plugins),
        }
    }
}

pub(crate) async fn run<M, E>(request: Request<M, E>, id: Uuid, state: &CallState) -> Response<M, E>
where
    M: Send + 'static,
    E: std::error::Error + Send + 'static,
{
    let stub = request.active_stub().cloned();
    let call = Call::new(&request, id, stub.is_some());
    call.plugins.notify("will_send", |p| p.will_send(&call.ctx));

    let (mut raw, forced_failure) = match request.materialize() {
        Err(error) => (settle(state, RawResponse::failed(None, error)), false),
        Ok(http) => {
            call.plugins
                .notify("will_send_materialized", |p| p.will_send_materialized(&call.ctx, &http));
            match stub {
                Some(stub) => perform_stub(http, &stub, request.endpoint.stub_delay(), state).await,
                None => (perform_live(&request, &call, http, state).await, false),
            }
        }
    };
    if let (Some(destination), false) = (&request.destination, forced_failure) {
        save_download(destination, &mut raw).await;
    }

    process(&call, &request.serializer, &request.error_serializer, raw, forced_failure)
}

/// Complete a call that cannot be driven by a runtime.
pub(crate) fn run_detached<M, E>(request: Request<M, E>, id: Uuid, state: &CallState) -> Response<M, E>
where
    M: 'static,
    E: std::error::Error + 'static,
{
    let call = Call::new(&request, id, request.active_stub().is_some());
    call.plugins.notify("will_send", |p| p.will_send(&call.ctx));
    let raw = settle(
        state,
        RawResponse::failed(request.materialize().ok(), TransportError::NoRuntime),
    );
    process(&call, &request.serializer, &request.error_serializer, raw, false)
}

/// Mark the call completed, or swap in a cancellation if it lost the race.
fn settle(state: &CallState, raw: RawResponse) -> RawResponse {
    if state.complete() {
        raw
    } else {
        RawResponse::failed(raw.request, TransportError::Cancelled)
    }
}

async fn perform_stub(
    http: HttpRequest,
    stub: &Stub,
    fallback_delay: Duration,
    state: &CallState,
) -> (RawResponse, bool) {
    let delay = stub.delay_or(fallback_delay);
    tracing::debug!(?delay, successful = stub.is_successful(), "stub armed");
    tokio::select! {
        biased;
        _ = state.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
    if !state.complete() {
        return (RawResponse::failed(Some(http), TransportError::Cancelled), false);
    }
    (stub.canned(http), !stub.is_successful())
}

async fn perform_live<M, E>(request: &Request<M, E>, call: &Call, http: HttpRequest, state: &CallState) -> RawResponse {
    let transport = request.endpoint.transport();
    let pending = transport.execute(http.clone());
    call.plugins.notify("did_send", |p| p.did_send(&call.ctx, &http));
    tracing::debug!(url = %http.url, "request sent");

    let outcome = tokio::select! {
        biased;
        _ = state.cancelled() => None,
        outcome = pending => Some(outcome),
    };
    let response = match (state.complete(), outcome) {
        (true, Some(Ok(response))) => response,
        (true, Some(Err(error))) => return RawResponse::failed(Some(http), error),
        _ => return RawResponse::failed(Some(http), TransportError::Cancelled),
    };

    RawResponse {
        request: Some(http),
        response: Some(ResponseMeta {
            status: response.status,
            headers: response.headers.clone(),
        }),
        error: request.validation.check(&response).err(),
        body: Some(response.body),
        file: None,
    }
}

/// Move a successful body, live or stubbed, into the download destination.
async fn save_download(destination: &Path, raw: &mut RawResponse) {
    if raw.error.is_some() {
        return;
    }
    let body = raw.body.take().unwrap_or_default();
    match tokio::fs::write(destination, &body).await {
        Ok(()) => raw.file = Some(destination.to_path_buf()),
        Err(error) => {
            raw.body = Some(body);
            raw.error = Some(TransportError::Io(error.to_string()));
        }
    }
}

fn process<M, E>(
    call: &Call,
    serializer: &ResponseSerializer<M>,
    error_serializer: &ErrorSerializer<E>,
    raw: RawResponse,
    forced_failure: bool,
) -> Response<M, E>
where
    M: 'static,
    E: std::error::Error + 'static,
{
    call.plugins
        .notify("will_process_response", |p| p.will_process_response(&call.ctx, &raw));

    let result = if raw.error.is_some() || forced_failure {
        Err(error_serializer(&raw, None))
    } else {
        serializer(&raw).map_err(|parse| error_serializer(&raw, Some(parse)))
    };

    match &result {
        Ok(model) => call
            .plugins
            .notify("did_parse_success", |p| p.did_parse_success(&call.ctx, &raw, model)),
        Err(error) => call
            .plugins
            .notify("did_receive_error", |p| p.did_receive_error(&call.ctx, &raw, error)),
    }
    tracing::debug!(success = result.is_ok(), status = ?raw.status(), "call finished");

    Response {
        raw,
        result,
        stubbed: call.ctx.stubbed,
    }
}

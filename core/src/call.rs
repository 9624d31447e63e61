//! Dispatching a request and delivering its one result.
//!
//! # Design
//! Every dispatch shape funnels into the same internal dispatch: one call
//! id, one pipeline task, one delivery. The shapes only differ in where the
//! finished [`Response`] goes:
//!
//! - [`Request::perform`] and [`Request::perform_collecting`] hand it to the
//!   request's [`Executor`](crate::Executor).
//! - [`Request::send`] (and `.await` on a request) resolves a future.
//! - [`Request::stream`] yields it as the single item of a stream.
//!
//! Cancellation is a race between the call's [`CallHandle`] and the
//! transport or stub delay. Whichever side flips the call phase first wins,
//! so a cancelled call never delivers a transport result and a completed
//! call never reports a cancellation.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::TransportError;
use crate::pipeline;
use crate::request::Request;
use crate::serializer::{ErrorSerializer, RawResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    InFlight,
    Completed,
    Cancelled,
    /// Never started because its stub was misconfigured.
    Skipped,
}

impl CallPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => CallPhase::InFlight,
            1 => CallPhase::Completed,
            2 => CallPhase::Cancelled,
            _ => CallPhase::Skipped,
        }
    }
}

#[derive(Debug)]
pub(crate) struct CallState {
    phase: AtomicU8,
    wake: Notify,
}

impl CallState {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(CallPhase::InFlight as u8),
            wake: Notify::new(),
        }
    }

    pub(crate) fn phase(&self) -> CallPhase {
        CallPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn transition(&self, to: CallPhase) -> bool {
        self.phase
            .compare_exchange(CallPhase::InFlight as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the result for delivery. False if the call was cancelled first.
    pub(crate) fn complete(&self) -> bool {
        self.transition(CallPhase::Completed)
    }

    fn cancel(&self) -> bool {
        let won = self.transition(CallPhase::Cancelled);
        if won {
            self.wake.notify_waiters();
        }
        won
    }

    fn skip(&self) {
        self.transition(CallPhase::Skipped);
    }

    /// Resolves once the call is cancelled.
    pub(crate) async fn cancelled(&self) {
        let notified = self.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.phase() == CallPhase::Cancelled {
            return;
        }
        notified.await;
    }
}

/// Identifies one dispatched call and lets the caller cancel it.
#[derive(Debug, Clone)]
pub struct CallHandle {
    id: Uuid,
    state: Arc<CallState>,
}

impl CallHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> CallPhase {
        self.state.phase()
    }

    pub fn is_finished(&self) -> bool {
        self.phase() != CallPhase::InFlight
    }

    /// Cancel the call if it is still in flight. Returns whether this
    /// cancellation took effect.
    pub fn cancel(&self) -> bool {
        let cancelled = self.state.cancel();
        if cancelled {
            tracing::debug!(call = %self.id, "call cancelled");
        }
        cancelled
    }
}

/// Everything a finished call produced.
#[derive(Debug)]
pub struct Response<M, E> {
    pub raw: RawResponse,
    pub result: Result<M, E>,
    pub stubbed: bool,
}

impl<M, E> Response<M, E> {
    pub fn status(&self) -> Option<u16> {
        self.raw.status()
    }

    pub fn into_result(self) -> Result<M, E> {
        self.result
    }
}

type Sink<M, E> = Box<dyn FnOnce(Response<M, E>) + Send + 'static>;

/// Hands a call's response to its sink exactly once. Dropped undelivered,
/// as when the runtime shut down before the call task ran, it reports a
/// failure through the error serializer instead.
struct Delivery<M, E> {
    id: Uuid,
    sink: Option<Sink<M, E>>,
    state: Arc<CallState>,
    error_serializer: ErrorSerializer<E>,
    stubbed: bool,
}

impl<M, E> Delivery<M, E> {
    fn deliver(mut self, response: Response<M, E>) {
        if let Some(sink) = self.sink.take() {
            sink(response);
        }
    }
}

impl<M, E> Drop for Delivery<M, E> {
    fn drop(&mut self) {
        let Some(sink) = self.sink.take() else {
            return;
        };
        let error = if self.state.complete() {
            TransportError::NoRuntime
        } else if self.state.phase() == CallPhase::Cancelled {
            TransportError::Cancelled
        } else {
            TransportError::Other("call ended before delivering a response".to_string())
        };
        tracing::warn!(call = %self.id, %error, "call dropped undelivered");
        let raw = RawResponse::failed(None, error);
        let result = Err((self.error_serializer)(&raw, None));
        sink(Response {
            raw,
            result,
            stubbed: self.stubbed,
        });
    }
}

fn dispatch<M, E>(request: Request<M, E>, sink: Sink<M, E>) -> CallHandle
where
    M: Send + 'static,
    E: std::error::Error + Send + 'static,
{
    let id = Uuid::new_v4();
    let state = Arc::new(CallState::new());
    let handle = CallHandle {
        id,
        state: state.clone(),
    };
    let span = tracing::info_span!("call", id = %id, method = %request.method, path = %request.path);

    if let Some(Err(problem)) = request.active_stub().map(|stub| stub.check()) {
        let _enter = span.enter();
        tracing::warn!(%problem, "stub misconfigured, call skipped");
        state.skip();
        return handle;
    }

    let delivery = Delivery {
        id,
        sink: Some(sink),
        state: state.clone(),
        error_serializer: request.error_serializer.clone(),
        stubbed: request.active_stub().is_some(),
    };
    match request.endpoint.runtime().or_else(|| Handle::try_current().ok()) {
        Some(runtime) => {
            runtime.spawn(
                async move {
                    let response = pipeline::run(request, id, &state).await;
                    delivery.deliver(response);
                }
                .instrument(span),
            );
        }
        None => {
            let _enter = span.enter();
            tracing::warn!("no tokio runtime available to drive the call");
            delivery.deliver(pipeline::run_detached(request, id, &state));
        }
    }
    handle
}

impl<M, E> Request<M, E>
where
    M: Send + 'static,
    E: std::error::Error + Send + 'static,
{
    /// Dispatch the call with one callback per outcome. Exactly one of the
    /// two runs, on the request's executor.
    pub fn perform<S, F>(self, on_success: S, on_failure: F) -> CallHandle
    where
        S: FnOnce(M) + Send + 'static,
        F: FnOnce(E) + Send + 'static,
    {
        self.perform_collecting(move |response| match response.result {
            Ok(model) => on_success(model),
            Err(error) => on_failure(error),
        })
    }

    /// Dispatch the call and receive the full [`Response`], raw data
    /// included, on the request's executor.
    pub fn perform_collecting<C>(self, on_response: C) -> CallHandle
    where
        C: FnOnce(Response<M, E>) + Send + 'static,
    {
        let executor = self.executor.clone();
        dispatch(
            self,
            Box::new(move |response| executor.execute(Box::new(move || on_response(response)))),
        )
    }

    /// Dispatch the call and await its result.
    pub fn send(self) -> PendingResponse<M, E> {
        let error_serializer = self.error_serializer.clone();
        let (tx, rx) = oneshot::channel();
        let handle = dispatch(
            self,
            Box::new(move |response| {
                let _ = tx.send(response);
            }),
        );
        PendingResponse {
            handle,
            receiver: rx,
            error_serializer,
        }
    }

    /// Dispatch the call and observe it as a stream of at most one item.
    pub fn stream(self) -> ResponseStream<M, E> {
        ResponseStream {
            pending: Some(self.send()),
        }
    }
}

impl<M, E> IntoFuture for Request<M, E>
where
    M: Send + 'static,
    E: std::error::Error + Send + 'static,
{
    type Output = Result<M, E>;
    type IntoFuture = PendingResponse<M, E>;

    fn into_future(self) -> Self::IntoFuture {
        self.send()
    }
}

/// Future returned by [`Request::send`]. Dropping it cancels the call.
pub struct PendingResponse<M, E> {
    handle: CallHandle,
    receiver: oneshot::Receiver<Response<M, E>>,
    error_serializer: ErrorSerializer<E>,
}

impl<M, E> PendingResponse<M, E> {
    pub fn handle(&self) -> CallHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }
}

impl<M, E> Future for PendingResponse<M, E> {
    type Output = Result<M, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(response)) => Poll::Ready(response.result),
            // The call was skipped or its task died before delivering.
            Poll::Ready(Err(_)) => Poll::Ready(Err((this.error_serializer)(
                &RawResponse::failed(None, TransportError::Cancelled),
                None,
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<M, E> Drop for PendingResponse<M, E> {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

impl<M, E> fmt::Debug for PendingResponse<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResponse").field("handle", &self.handle).finish_non_exhaustive()
    }
}

/// Stream returned by [`Request::stream`].
pub struct ResponseStream<M, E> {
    pending: Option<PendingResponse<M, E>>,
}

impl<M, E> ResponseStream<M, E> {
    /// The call behind this stream, until its item has been yielded.
    pub fn handle(&self) -> Option<CallHandle> {
        self.pending.as_ref().map(PendingResponse::handle)
    }
}

impl<M, E> Stream for ResponseStream<M, E> {
    type Item = Result<M, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(pending) = this.pending.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(pending).poll(cx) {
            Poll::Ready(item) => {
                this.pending = None;
                Poll::Ready(Some(item))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::from(self.pending.is_some());
        (left, Some(left))
    }
}

impl<M, E> fmt::Debug for ResponseStream<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream").field("pending", &self.pending).finish()
    }
}

//! Lifecycle observers.
//!
//! # Design
//! Every hook has a no-op default, so a plugin implements only what it
//! cares about. Hooks return nothing and cannot influence the call. A
//! panicking hook is caught and logged; the call carries on.
//!
//! Invocation order is fixed: the request's own plugins first, then the
//! endpoint's plugins, each list in insertion order.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::encoding::Parameters;
use crate::headers::AuthRequirement;
use crate::http::{Headers, HttpMethod, HttpRequest};
use crate::serializer::RawResponse;

/// The logical description of a call, as configured by the caller.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub id: Uuid,
    pub method: HttpMethod,
    pub path: String,
    pub parameters: Parameters,
    /// Per-request header overrides, before composition.
    pub headers: Headers,
    pub auth: AuthRequirement,
    pub stubbed: bool,
}

pub trait Plugin: Send + Sync {
    /// The call is about to be materialized and sent.
    fn will_send(&self, _ctx: &CallContext) {}

    /// URL, headers and body have been resolved.
    fn will_send_materialized(&self, _ctx: &CallContext, _request: &HttpRequest) {}

    /// The transport accepted the request. Not called for stubbed calls.
    fn did_send(&self, _ctx: &CallContext, _request: &HttpRequest) {}

    fn will_process_response(&self, _ctx: &CallContext, _raw: &RawResponse) {}

    /// The response serializer produced a model. `model` can be downcast to
    /// the request's model type.
    fn did_parse_success(&self, _ctx: &CallContext, _raw: &RawResponse, _model: &dyn Any) {}

    fn did_receive_error(&self, _ctx: &CallContext, _raw: &RawResponse, _error: &dyn std::error::Error) {}
}

/// Ordered fan-out over local then global plugins.
#[derive(Clone, Default)]
pub(crate) struct PluginSet {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginSet {
    pub(crate) fn new(local: &[Arc<dyn Plugin>], global: &[Arc<dyn Plugin>]) -> Self {
        Self {
            plugins: local.iter().chain(global).cloned().collect(),
        }
    }

    pub(crate) fn notify(&self, hook: &'static str, call: impl Fn(&dyn Plugin)) {
        for plugin in &self.plugins {
            if catch_unwind(AssertUnwindSafe(|| call(plugin.as_ref()))).is_err() {
                tracing::error!(hook, "plugin panicked; continuing");
            }
        }
    }
}

impl fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSet").field("len", &self.plugins.len()).finish()
    }
}

/// Logs every lifecycle point through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPlugin;

impl Plugin for TracingPlugin {
    fn will_send(&self, ctx: &CallContext) {
        tracing::debug!(call = %ctx.id, method = %ctx.method, path = %ctx.path, stubbed = ctx.stubbed, "will send");
    }

    fn will_send_materialized(&self, ctx: &CallContext, request: &HttpRequest) {
        tracing::debug!(call = %ctx.id, url = %request.url, headers = request.headers.len(), "request materialized");
    }

    fn did_send(&self, ctx: &CallContext, request: &HttpRequest) {
        tracing::debug!(call = %ctx.id, url = %request.url, "request sent");
    }

    fn will_process_response(&self, ctx: &CallContext, raw: &RawResponse) {
        tracing::debug!(call = %ctx.id, status = ?raw.status(), bytes = raw.body_bytes().len(), "processing response");
    }

    fn did_parse_success(&self, ctx: &CallContext, _raw: &RawResponse, _model: &dyn Any) {
        tracing::info!(call = %ctx.id, path = %ctx.path, "call succeeded");
    }

    fn did_receive_error(&self, ctx: &CallContext, raw: &RawResponse, error: &dyn std::error::Error) {
        tracing::warn!(call = %ctx.id, path = %ctx.path, status = ?raw.status(), %error, "call failed");
    }
}

type ActivityFn = Arc<dyn Fn(bool) + Send + Sync>;

/// Tracks how many calls are in flight and reports busy/idle transitions.
#[derive(Clone, Default)]
pub struct ActivityPlugin {
    in_flight: Arc<AtomicUsize>,
    on_change: Option<ActivityFn>,
}

impl ActivityPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// `on_change(true)` fires when the first call starts, `on_change(false)`
    /// when the last one finishes.
    pub fn on_change<F>(mut self, on_change: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(on_change));
        self
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn finish(&self) {
        let previous = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        if previous == 1 {
            if let Some(on_change) = &self.on_change {
                on_change(false);
            }
        }
    }
}

impl fmt::Debug for ActivityPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityPlugin")
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl Plugin for ActivityPlugin {
    fn will_send(&self, _ctx: &CallContext) {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(on_change) = &self.on_change {
                on_change(true);
            }
        }
    }

    fn did_parse_success(&self, _ctx: &CallContext, _raw: &RawResponse, _model: &dyn Any) {
        self.finish();
    }

    fn did_receive_error(&self, _ctx: &CallContext, _raw: &RawResponse, _error: &dyn std::error::Error) {
        self.finish();
    }
}

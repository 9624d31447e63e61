//! Typed HTTP client layer.
//!
//! # Overview
//! An [`Endpoint`] holds the shared configuration for one API: base URL,
//! default headers, parameter encoding, transport, plugins and the stubbing
//! toggle. Each [`Request`] it creates describes one planned call and is
//! typed by the model its response serializer produces. Dispatching a
//! request yields exactly one result, through callbacks, a future or a
//! single-item stream.
//!
//! # Design
//! - Requests are values. Configuration consumes and returns them, and a
//!   dispatched request cannot be touched again. Cloning and re-dispatching
//!   is a second call.
//! - The network sits behind the [`Transport`] trait. `ReqwestTransport`
//!   is the default (feature `reqwest`); tests plug in their own.
//! - Stubs replace only the transport. Stubbed bytes go through the same
//!   serializers, plugin hooks and delivery as a live response.
//! - Plugins observe every call but cannot change its outcome; a panicking
//!   plugin is logged and skipped.

pub mod call;
pub mod config;
pub mod encoding;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod headers;
pub mod http;
pub mod multipart;
mod pipeline;
pub mod plugin;
pub mod request;
pub mod serializer;
pub mod stub;
pub mod transport;
pub mod url_builder;
pub mod validation;

#[cfg(test)]
mod testing;

pub use call::{CallHandle, CallPhase, PendingResponse, Response, ResponseStream};
pub use config::{ConfigError, EndpointConfig};
pub use encoding::{ParameterEncoding, Parameters};
pub use endpoint::{Endpoint, EndpointBuilder};
pub use error::{ErrorKind, ParseError, ResponseError, TransportError};
pub use executor::{Executor, Inline, QueueRunner, SerialQueue, Spawn};
pub use headers::{AuthRequirement, BearerAuth, DefaultHeaders, HeaderComposer, RequestAdapter};
pub use http::{Headers, HttpMethod, HttpRequest, HttpResponse};
pub use multipart::{MultipartForm, Part};
pub use plugin::{ActivityPlugin, CallContext, Plugin, TracingPlugin};
pub use request::Request;
pub use serializer::{Empty, ErrorSerializer, RawResponse, ResponseMeta, ResponseSerializer};
pub use stub::{Stub, StubMisconfiguration, DEFAULT_STUB_DELAY};
pub use transport::Transport;
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use url_builder::{RequestUrl, UrlBehavior, UrlBuilder, UrlMode};
pub use validation::Validation;

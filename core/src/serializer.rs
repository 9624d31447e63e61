//! Response and error serializers.
//!
//! # Design
//! A serializer is a shared closure over [`RawResponse`]. The live pipeline
//! and the stub engine hold the very same `Arc`, so a stubbed body and a
//! live body go through identical parsing. Every historical flavour of
//! decoding (JSON, text, raw bytes, custom byte parsers) is an adapter onto
//! the one contract `parse(bytes) -> Result<Model, ParseError>`.
//!
//! Error serializers cannot fail: they are the catch-all that turns any raw
//! output into the caller's typed error.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{ParseError, ResponseError, TransportError};
use crate::http::{Headers, HttpRequest};

/// Status line and headers of a received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    pub status: u16,
    pub headers: Headers,
}

/// Everything the transport (or a stub) produced for one call.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    /// The materialized request; absent when materialization itself failed.
    pub request: Option<HttpRequest>,
    pub response: Option<ResponseMeta>,
    pub body: Option<Bytes>,
    /// Destination of a completed download.
    pub file: Option<PathBuf>,
    pub error: Option<TransportError>,
}

impl RawResponse {
    pub fn failed(request: Option<HttpRequest>, error: TransportError) -> Self {
        Self {
            request,
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|meta| meta.status)
    }

    /// Body bytes, or an empty slice when there is no body.
    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }
}

pub type ResponseSerializer<M> = Arc<dyn Fn(&RawResponse) -> Result<M, ParseError> + Send + Sync>;

pub type ErrorSerializer<E> = Arc<dyn Fn(&RawResponse, Option<ParseError>) -> E + Send + Sync>;

/// Model for responses that carry no content (204, HEAD and the like).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Empty;

/// Adapt a byte parser into a response serializer. A missing body is
/// handed to the parser as an empty slice.
pub fn from_fn<M, F>(parse: F) -> ResponseSerializer<M>
where
    M: 'static,
    F: Fn(&[u8]) -> Result<M, ParseError> + Send + Sync + 'static,
{
    Arc::new(move |raw: &RawResponse| parse(raw.body_bytes()))
}

/// Decode the body as JSON into `T`.
pub fn json<T: DeserializeOwned + 'static>() -> ResponseSerializer<T> {
    from_fn(|bytes| Ok(serde_json::from_slice(bytes)?))
}

/// Decode the body as UTF-8 text.
pub fn text() -> ResponseSerializer<String> {
    from_fn(|bytes| Ok(std::str::from_utf8(bytes)?.to_string()))
}

/// Hand back the body untouched.
pub fn bytes() -> ResponseSerializer<Bytes> {
    Arc::new(|raw: &RawResponse| Ok(raw.body.clone().unwrap_or_default()))
}

/// Succeed with [`Empty`] without looking at the body.
pub fn empty() -> ResponseSerializer<Empty> {
    Arc::new(|_: &RawResponse| Ok(Empty))
}

/// Yield the path of a completed download.
pub fn file() -> ResponseSerializer<PathBuf> {
    Arc::new(|raw: &RawResponse| raw.file.clone().ok_or(ParseError::MissingFile))
}

/// The default error serializer, producing [`ResponseError`].
pub fn response_error() -> ErrorSerializer<ResponseError> {
    Arc::new(ResponseError::from_raw)
}

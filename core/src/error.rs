//! Error types for the request pipeline.
//!
//! # Design
//! Failures converge on one channel. Transport failures, response
//! validation failures, encoding failures and cancellation are all a
//! [`TransportError`] and skip the response serializer entirely. A
//! serializer that cannot build its model produces a [`ParseError`]. The
//! error serializer folds either into the caller's typed error; the default
//! one builds a [`ResponseError`] that keeps the raw request, status,
//! headers and body for inspection.

use bytes::Bytes;
use thiserror::Error;

use crate::http::{Headers, HttpRequest};
use crate::serializer::RawResponse;

/// Failure reported before a response body could be handed to a serializer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid request URL for path {0:?}")]
    InvalidUrl(String),

    #[error("parameter encoding failed: {0}")]
    Encoding(String),

    #[error("credentials required but none are available")]
    MissingCredentials,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    /// Response validation rejected the status code.
    #[error("unacceptable status code {0}")]
    UnacceptableStatus(u16),

    /// Response validation rejected the content type.
    #[error("unacceptable content type {0:?}")]
    UnacceptableContentType(Option<String>),

    #[error("no async runtime available to dispatch the request")]
    NoRuntime,

    #[error("i/o error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TransportError::UnacceptableStatus(_) | TransportError::UnacceptableContentType(_)
        )
    }
}

/// A response serializer could not build its model.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response has no body")]
    MissingBody,

    #[error("response was not downloaded to a file")]
    MissingFile,

    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("JSON decoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Transport(TransportError),

    #[error(transparent)]
    Parse(ParseError),
}

/// Default typed error produced by [`ResponseError::from_raw`].
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct ResponseError {
    pub request: Option<HttpRequest>,
    pub status: Option<u16>,
    pub headers: Headers,
    pub body: Option<Bytes>,
    #[source]
    pub kind: ErrorKind,
}

impl ResponseError {
    /// Build an error from raw transport output. Never fails: a parse
    /// failure wins over the transport error, and when neither is present
    /// the status (or a generic message) describes the failure.
    pub fn from_raw(raw: &RawResponse, parse: Option<ParseError>) -> Self {
        let status = raw.response.as_ref().map(|meta| meta.status);
        let kind = match (parse, &raw.error) {
            (Some(parse), _) => ErrorKind::Parse(parse),
            (None, Some(error)) => ErrorKind::Transport(error.clone()),
            (None, None) => ErrorKind::Transport(match status {
                Some(status) => TransportError::UnacceptableStatus(status),
                None => TransportError::Other("request failed without an underlying error".to_string()),
            }),
        };
        Self {
            request: raw.request.clone(),
            status,
            headers: raw
                .response
                .as_ref()
                .map(|meta| meta.headers.clone())
                .unwrap_or_default(),
            body: raw.body.clone(),
            kind,
        }
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        match &self.kind {
            ErrorKind::Transport(error) => Some(error),
            ErrorKind::Parse(_) => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.transport_error().is_some_and(TransportError::is_cancelled)
    }

    /// The raw body as UTF-8, if there is one and it decodes.
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref().and_then(|body| std::str::from_utf8(body).ok())
    }
}

//! Canned responses that bypass the transport.
//!
//! # Design
//! Whether a stub succeeds is declared up front with the `successful` flag,
//! never inferred from which fields happen to be set. A successful stub
//! feeds its bytes to the request's own response serializer, the same
//! closure a live call would use. A failing stub goes straight to the error
//! serializer.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::error::TransportError;
use crate::http::{Headers, HttpRequest};
use crate::serializer::{RawResponse, ResponseMeta};

/// Delay applied when neither the stub nor the endpoint sets one. Non-zero
/// so stubbed completions are never synchronous.
pub const DEFAULT_STUB_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stub {
    successful: bool,
    data: Option<Bytes>,
    status: Option<u16>,
    headers: Headers,
    error: Option<TransportError>,
    delay: Option<Duration>,
    enabled: bool,
}

/// A stub that cannot produce the branch it declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StubMisconfiguration {
    #[error("successful stub has no response data")]
    MissingData,

    #[error("failing stub has neither an error nor response data")]
    MissingFailure,
}

impl Stub {
    pub fn new(successful: bool) -> Self {
        Self {
            successful,
            data: None,
            status: None,
            headers: Headers::new(),
            error: None,
            delay: None,
            enabled: true,
        }
    }

    pub fn success(data: impl Into<Bytes>) -> Self {
        Self::new(true).data(data)
    }

    pub fn failure(error: TransportError) -> Self {
        Self::new(false).error(error)
    }

    /// A successful stub whose body is `value` serialized as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::success(body).header("Content-Type", "application/json"))
    }

    /// A successful stub whose body is read from a fixture file.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::success(std::fs::read(path)?))
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn error(mut self, error: TransportError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_successful(&self) -> bool {
        self.successful
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn delay_or(&self, fallback: Duration) -> Duration {
        self.delay.unwrap_or(fallback)
    }

    pub fn check(&self) -> Result<(), StubMisconfiguration> {
        match (self.successful, &self.data, &self.error) {
            (true, None, _) => Err(StubMisconfiguration::MissingData),
            (false, None, None) => Err(StubMisconfiguration::MissingFailure),
            _ => Ok(()),
        }
    }

    /// The raw output this stub stands in for.
    pub(crate) fn canned(&self, request: HttpRequest) -> RawResponse {
        let status = self.status.or(self.successful.then_some(200));
        RawResponse {
            request: Some(request),
            response: status.map(|status| ResponseMeta {
                status,
                headers: self.headers.clone(),
            }),
            body: self.data.clone(),
            file: None,
            error: if self.successful { None } else { self.error.clone() },
        }
    }
}

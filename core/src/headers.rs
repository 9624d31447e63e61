//! Header composition and authorization adapters.
//!
//! # Design
//! The composer only merges header sets. The authorization requirement is
//! passed through so custom composers can act on it, but the default one
//! ignores it: credentials are injected by a [`RequestAdapter`] that runs
//! on the materialized request.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::http::{Headers, HttpRequest};

/// Whether a request needs, accepts or refuses credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthRequirement {
    #[default]
    None,
    Allowed,
    Required,
}

pub trait HeaderComposer: Send + Sync {
    /// Produce the final header set for one request.
    fn compose(&self, auth: AuthRequirement, overrides: &Headers) -> Headers;
}

/// Endpoint defaults overlaid with per-request overrides.
#[derive(Debug, Clone, Default)]
pub struct DefaultHeaders {
    defaults: Headers,
}

impl DefaultHeaders {
    pub fn new(defaults: Headers) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &Headers {
        &self.defaults
    }
}

impl HeaderComposer for DefaultHeaders {
    fn compose(&self, _auth: AuthRequirement, overrides: &Headers) -> Headers {
        let mut headers = self.defaults.clone();
        headers.merge(overrides);
        headers
    }
}

/// Last-step hook over a materialized request, typically for credentials.
pub trait RequestAdapter: Send + Sync {
    fn adapt(&self, request: &mut HttpRequest, auth: AuthRequirement) -> Result<(), TransportError>;
}

type TokenFn = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Adds `Authorization: Bearer <token>` to requests that allow or require
/// credentials.
#[derive(Clone)]
pub struct BearerAuth {
    token: TokenFn,
}

impl BearerAuth {
    pub fn new<F>(token: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        Self { token: Arc::new(token) }
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        let token = token.into();
        Self::new(move || Some(token.clone()))
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth").finish_non_exhaustive()
    }
}

impl RequestAdapter for BearerAuth {
    fn adapt(&self, request: &mut HttpRequest, auth: AuthRequirement) -> Result<(), TransportError> {
        if auth == AuthRequirement::None || request.headers.contains("authorization") {
            return Ok(());
        }
        match (self.token)() {
            Some(token) => {
                request.headers.insert("Authorization", format!("Bearer {token}"));
                Ok(())
            }
            None if auth == AuthRequirement::Required => Err(TransportError::MissingCredentials),
            None => Ok(()),
        }
    }
}

//! Response validation applied to live responses before parsing.
//!
//! A rejected response arrives at the error serializer exactly like a
//! transport failure, with the received status, headers and body attached.

use std::ops::Range;

use crate::error::TransportError;
use crate::http::HttpResponse;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    statuses: Option<Range<u16>>,
    content_types: Option<Vec<String>>,
}

impl Default for Validation {
    fn default() -> Self {
        Self {
            statuses: Some(200..300),
            content_types: None,
        }
    }
}

impl Validation {
    /// Accept every response.
    pub fn none() -> Self {
        Self {
            statuses: None,
            content_types: None,
        }
    }

    pub fn statuses(mut self, statuses: Range<u16>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    /// Accept only these MIME types; `type/*` and `*/*` wildcards match.
    pub fn content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn check(&self, response: &HttpResponse) -> Result<(), TransportError> {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&response.status) {
                return Err(TransportError::UnacceptableStatus(response.status));
            }
        }
        if let Some(acceptable) = &self.content_types {
            // Nothing to interpret without a body.
            if response.body.is_empty() {
                return Ok(());
            }
            let received = response.content_type();
            let matched = received
                .map(essence)
                .is_some_and(|mime| acceptable.iter().any(|pattern| mime_matches(pattern, &mime)));
            if !matched {
                return Err(TransportError::UnacceptableContentType(received.map(str::to_string)));
            }
        }
        Ok(())
    }
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn mime_matches(pattern: &str, mime: &str) -> bool {
    let pattern = essence(pattern);
    if pattern == "*/*" || pattern == mime {
        return true;
    }
    match (pattern.split_once('/'), mime.split_once('/')) {
        (Some((pattern_type, "*")), Some((mime_type, _))) => pattern_type == mime_type,
        _ => false,
    }
}

//! Absolute URL construction from an endpoint base and a request path.
//!
//! # Design
//! Building never fails loudly. A result that does not parse becomes the
//! invalid [`RequestUrl`] sentinel, and the request pipeline turns that into
//! a typed error at dispatch time.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

/// Caller-supplied `(base, path) -> Url` strategy.
pub type UrlFn = Arc<dyn Fn(&str, &str) -> Option<Url> + Send + Sync>;

/// How a request path is combined with the endpoint base URL.
#[derive(Clone, Default)]
pub enum UrlBehavior {
    /// `base + "/" + path`, with duplicate slashes in the path collapsed.
    #[default]
    Append,
    /// Standard relative reference resolution; absolute paths win.
    RelativeMerge,
    Custom(UrlFn),
}

impl fmt::Debug for UrlBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlBehavior::Append => f.write_str("Append"),
            UrlBehavior::RelativeMerge => f.write_str("RelativeMerge"),
            UrlBehavior::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Serializable subset of [`UrlBehavior`] used by configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlMode {
    #[default]
    Append,
    RelativeMerge,
}

impl From<UrlMode> for UrlBehavior {
    fn from(mode: UrlMode) -> Self {
        match mode {
            UrlMode::Append => UrlBehavior::Append,
            UrlMode::RelativeMerge => UrlBehavior::RelativeMerge,
        }
    }
}

/// Result of URL building: a parsed URL or the invalid sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl(Option<Url>);

impl RequestUrl {
    pub fn invalid() -> Self {
        Self(None)
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    /// The URL text, or `""` for the invalid sentinel.
    pub fn as_str(&self) -> &str {
        self.0.as_ref().map_or("", Url::as_str)
    }

    pub fn as_url(&self) -> Option<&Url> {
        self.0.as_ref()
    }

    pub fn into_url(self) -> Option<Url> {
        self.0
    }
}

impl fmt::Display for RequestUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct UrlBuilder {
    base: String,
    behavior: UrlBehavior,
}

impl UrlBuilder {
    pub fn new(base: impl Into<String>, behavior: UrlBehavior) -> Self {
        Self {
            base: base.into(),
            behavior,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn behavior(&self) -> &UrlBehavior {
        &self.behavior
    }

    pub fn build(&self, path: &str) -> RequestUrl {
        let url = match &self.behavior {
            UrlBehavior::Append => append(&self.base, path),
            UrlBehavior::RelativeMerge => Url::parse(&self.base).ok().and_then(|base| base.join(path).ok()),
            UrlBehavior::Custom(build) => build(&self.base, path),
        };
        RequestUrl(url)
    }
}

fn append(base: &str, path: &str) -> Option<Url> {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    let joined = if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    };
    Url::parse(&collapse_slashes(&joined)).ok()
}

/// Collapse runs of `/` after the scheme separator and before the query.
fn collapse_slashes(raw: &str) -> String {
    let (scheme, rest) = match raw.find("://") {
        Some(index) => raw.split_at(index + 3),
        None => ("", raw),
    };
    let (path, query) = match rest.find(['?', '#']) {
        Some(index) => rest.split_at(index),
        None => (rest, ""),
    };

    let mut out = String::with_capacity(raw.len());
    out.push_str(scheme);
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        out.push(c);
    }
    out.push_str(query);
    out
}

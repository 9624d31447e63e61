//! HTTP transport types for the host-does-IO boundary.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! request pipeline materializes an `HttpRequest`, hands it to a
//! [`Transport`](crate::transport::Transport), and receives an `HttpResponse`
//! back. Nothing here touches the network, which keeps stubbing and tests
//! free of I/O.
//!
//! Bodies use [`Bytes`] so a response can be shared between the serializer,
//! the error serializer and plugins without copying.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Whether URL-style parameter encoding puts parameters in the query
    /// string for this method rather than in a form body.
    pub fn encodes_in_query(&self) -> bool {
        matches!(
            self,
            HttpMethod::Get | HttpMethod::Head | HttpMethod::Delete | HttpMethod::Options
        )
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered header list with case-insensitive names.
///
/// Inserting a name that is already present replaces the value in place, so
/// the first insertion decides the position and the last one decides the
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.0[index].1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Insert only if `name` is not already present.
    pub fn insert_default(&mut self, name: &str, value: &str) {
        if !self.contains(name) {
            self.0.push((name.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| self.0[index].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|index| self.0.remove(index).1)
    }

    /// Overlay `other` on top of `self`; values from `other` win.
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// An HTTP request described as plain data.
///
/// Produced by [`Request::materialize`](crate::Request::materialize): the URL
/// is absolute, headers are composed and parameters are already encoded
/// into the URL or the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
}

/// An HTTP response described as plain data.
///
/// Returned by a transport for every response the server produced, whatever
/// its status; status interpretation belongs to validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_case_insensitively_in_place() {
        let mut headers = Headers::new();
        headers.insert("Accept", "application/json");
        headers.insert("X-Trace", "1");
        headers.insert("accept", "text/plain");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("ACCEPT"), Some("text/plain"));
        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Accept", "X-Trace"]);
    }

    #[test]
    fn insert_default_keeps_existing_value() {
        let mut headers: Headers = [("Content-Type", "text/csv")].into_iter().collect();
        headers.insert_default("content-type", "application/json");
        assert_eq!(headers.get("Content-Type"), Some("text/csv"));
    }

    #[test]
    fn remove_returns_value() {
        let mut headers: Headers = [("A", "1"), ("B", "2")].into_iter().collect();
        assert_eq!(headers.remove("a").as_deref(), Some("1"));
        assert!(!headers.contains("A"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn query_methods() {
        assert!(HttpMethod::Get.encodes_in_query());
        assert!(HttpMethod::Delete.encodes_in_query());
        assert!(!HttpMethod::Post.encodes_in_query());
        assert!(!HttpMethod::Patch.encodes_in_query());
    }

    #[test]
    fn method_serializes_uppercase() {
        let json = serde_json::to_string(&HttpMethod::Patch).unwrap();
        assert_eq!(json, "\"PATCH\"");
        assert_eq!(HttpMethod::default(), HttpMethod::Get);
    }
}

//! Parameter encoding into the URL or the request body.
//!
//! # Design
//! Parameters are a string-keyed JSON map. Encoders flatten nested values
//! the way form-style APIs expect (`user[name]=x`, `tags[]=a&tags[]=b`).
//! A `Content-Type` header is added only when the caller did not set one.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::form_urlencoded;
use url::Url;

use crate::error::TransportError;
use crate::http::{Headers, HttpMethod};

pub type Parameters = serde_json::Map<String, Value>;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterEncoding {
    /// Query string for GET, HEAD, DELETE and OPTIONS; form body otherwise.
    #[default]
    Url,
    QueryString,
    Json,
    Form,
}

/// Encode `parameters` for `method`, returning the final URL and body.
pub(crate) fn encode(
    encoding: ParameterEncoding,
    method: HttpMethod,
    mut url: Url,
    parameters: &Parameters,
    headers: &mut Headers,
) -> Result<(Url, Option<Bytes>), TransportError> {
    if parameters.is_empty() {
        return Ok((url, None));
    }
    match encoding {
        ParameterEncoding::Url if method.encodes_in_query() => {
            append_query(&mut url, parameters);
            Ok((url, None))
        }
        ParameterEncoding::QueryString => {
            append_query(&mut url, parameters);
            Ok((url, None))
        }
        ParameterEncoding::Url | ParameterEncoding::Form => {
            headers.insert_default("Content-Type", FORM_CONTENT_TYPE);
            Ok((url, Some(Bytes::from(form_body(parameters)))))
        }
        ParameterEncoding::Json => {
            let body = serde_json::to_vec(parameters).map_err(|e| TransportError::Encoding(e.to_string()))?;
            headers.insert_default("Content-Type", JSON_CONTENT_TYPE);
            Ok((url, Some(Bytes::from(body))))
        }
    }
}

/// Flatten parameters into ordered `(key, value)` pairs.
pub(crate) fn pairs(parameters: &Parameters) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (key, value) in parameters {
        flatten(key.clone(), value, &mut out);
    }
    out
}

fn flatten(key: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => out.push((key, String::new())),
        Value::Bool(b) => out.push((key, b.to_string())),
        Value::Number(n) => out.push((key, n.to_string())),
        Value::String(s) => out.push((key, s.clone())),
        Value::Array(items) => {
            for item in items {
                flatten(format!("{key}[]"), item, out);
            }
        }
        Value::Object(map) => {
            for (sub, item) in map {
                flatten(format!("{key}[{sub}]"), item, out);
            }
        }
    }
}

fn append_query(url: &mut Url, parameters: &Parameters) {
    let pairs = pairs(parameters);
    let mut query = url.query_pairs_mut();
    for (key, value) in &pairs {
        query.append_pair(key, value);
    }
}

fn form_body(parameters: &Parameters) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs(parameters))
        .finish()
}

//! Wire contract between the relay and polling workers.

use crate::RelayError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Snapshot of a relayed request, exactly as served to a polling worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    /// Header name to ordered values. Names carry the canonical lowercase
    /// form; values keep their per-name order.
    pub headers: HashMap<String, Vec<String>>,
    /// Base64 of the drained request body.
    pub body: String,
}

impl CapturedRequest {
    pub fn from_parts(parts: &Parts, body: &[u8]) -> Self {
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for name in parts.headers.keys() {
            let values = parts
                .headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect();
            headers.insert(name.as_str().to_string(), values);
        }

        CapturedRequest {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            headers,
            body: BASE64.encode(body),
        }
    }
}

/// Completion payload a worker POSTs back against its callback URL.
#[derive(Debug, Deserialize)]
pub struct Completion {
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, Vec<String>>,
    /// Base64 of the response body.
    #[serde(default)]
    pub body: String,
}

impl Completion {
    /// Decodes the envelope into a deliverable response. Any undecodable
    /// field makes the whole completion malformed; the pending entry is
    /// left for the caller to keep waiting on.
    pub fn into_response(self) -> Result<RelayResponse, RelayError> {
        let status = StatusCode::from_u16(self.status_code)
            .map_err(|_| RelayError::MalformedCompletion(format!(
                "invalid status code {}",
                self.status_code
            )))?;

        let body = BASE64
            .decode(&self.body)
            .map_err(|err| RelayError::MalformedCompletion(format!("body is not base64: {err}")))?;

        let mut headers = HeaderMap::new();
        for (name, values) in self.headers {
            let name = HeaderName::try_from(name.as_str()).map_err(|_| {
                RelayError::MalformedCompletion(format!("invalid header name {name:?}"))
            })?;
            for value in values {
                let value = HeaderValue::try_from(value.as_str()).map_err(|_| {
                    RelayError::MalformedCompletion(format!("invalid value for header {name}"))
                })?;
                headers.append(name.clone(), value);
            }
        }

        Ok(RelayResponse {
            status,
            headers,
            body: Bytes::from(body),
        })
    }
}

/// What the worker produced, delivered verbatim to the original caller.
#[derive(Debug)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

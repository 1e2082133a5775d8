use crate::work::TaskRunner;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use http::request::Parts;
use http::{Response, StatusCode};
use serde::Serialize;
use shared::http::{make_error_response, make_json_response};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-route handler that starts a named remote task.
///
/// The task name is a pure function of the route and the allow-listed
/// headers: the filtered request is re-serialized deterministically and
/// base64-encoded, so identical requests map onto the same name and the
/// task runner can use it as an idempotency key.
pub struct RunTaskHandler {
    command: String,
    expected_headers: Vec<String>,
    raw_output: bool,
    runner: Arc<dyn TaskRunner>,
}

/// Deterministic serialization of the filtered request. Headers are keyed
/// through a BTreeMap so the encoding is stable across runs; bodies are
/// excluded on purpose.
#[derive(Serialize)]
struct TaskFingerprint<'a> {
    method: &'a str,
    path: &'a str,
    headers: BTreeMap<String, Vec<String>>,
}

#[derive(Serialize)]
struct TaskStarted<'a> {
    task_guid: &'a str,
    task_name: &'a str,
}

impl RunTaskHandler {
    pub fn new(
        command: &str,
        expected_headers: &[String],
        raw_output: bool,
        runner: Arc<dyn TaskRunner>,
    ) -> Self {
        Self {
            command: command.to_string(),
            expected_headers: expected_headers
                .iter()
                .map(|name| name.to_ascii_lowercase())
                .collect(),
            raw_output,
            runner,
        }
    }

    pub async fn handle(&self, parts: &Parts) -> Response<Bytes> {
        let name = self.task_name(parts);

        match self.runner.run_task(&self.command, &name).await {
            Ok(guid) => {
                if self.raw_output {
                    Response::new(Bytes::from(guid))
                } else {
                    make_json_response(
                        StatusCode::OK,
                        &TaskStarted {
                            task_guid: &guid,
                            task_name: &name,
                        },
                    )
                }
            }
            Err(err) => {
                tracing::error!(error = %err, command = %self.command, "task runner failed");
                make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    fn task_name(&self, parts: &Parts) -> String {
        let mut headers = BTreeMap::new();
        for name in &self.expected_headers {
            let values: Vec<String> = parts
                .headers
                .get_all(name.as_str())
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect();
            headers.insert(name.clone(), values);
        }

        let fingerprint = TaskFingerprint {
            method: parts.method.as_str(),
            path: parts.uri.path(),
            headers,
        };
        // Plain strings in a BTreeMap; a serialization failure here means
        // the process state is corrupt, not that the request was bad.
        let encoded =
            serde_json::to_vec(&fingerprint).expect("task fingerprint serialization failed");
        BASE64.encode(encoded)
    }
}

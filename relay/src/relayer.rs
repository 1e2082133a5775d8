use crate::metrics_defs::{RELAY_ABANDONED, RELAY_COMPLETED, RELAY_REGISTERED, RELAY_REJECTED};
use crate::protocol::{CapturedRequest, Completion, RelayResponse};
use crate::{RelayError, Result};
use bytes::Bytes;
use http::request::Parts;
use http::{Method, Response, StatusCode};
use parking_lot::Mutex;
use shared::counter;
use shared::http::{make_error_response, make_ok_response};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use url::Url;
use uuid::Uuid;

/// Bridges a blocked inbound caller and an out-of-process worker.
///
/// `relay` snapshots the inbound request under a fresh correlation id and
/// returns a callback URL. A worker GETs that URL to read the snapshot and
/// POSTs its result back; the result is handed to whoever holds the
/// [`RelayHandle`]. The pending-entry table is the only synchronization
/// point between the two sides: insert, lookup and remove are each a single
/// critical section, and an entry leaves the table exactly once, through
/// the completion POST or through the handle being dropped.
#[derive(Clone)]
pub struct RequestRelayer {
    external_url: Url,
    prefix: String,
    pending: PendingTable,
}

type PendingTable = Arc<Mutex<HashMap<String, PendingRelay>>>;

struct PendingRelay {
    captured: CapturedRequest,
    completion: oneshot::Sender<RelayResponse>,
}

impl RequestRelayer {
    pub fn new(external_url: Url, prefix: &str) -> Self {
        Self {
            external_url,
            prefix: prefix.trim_matches('/').to_string(),
            pending: Arc::default(),
        }
    }

    /// Path namespace the relayer answers under.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Registers the request under a fresh correlation id.
    ///
    /// Returns the callback URL a worker polls, and the handle the caller
    /// waits on. Dropping the handle without a completion removes the entry,
    /// so a late worker GET or POST reports not-found.
    pub fn relay(&self, parts: &Parts, body: Bytes) -> Result<(Url, RelayHandle)> {
        let id = Uuid::new_v4().to_string();
        let callback = self
            .external_url
            .join(&format!("/{}/{}", self.prefix, id))?;

        let (tx, rx) = oneshot::channel();
        let entry = PendingRelay {
            captured: CapturedRequest::from_parts(parts, &body),
            completion: tx,
        };
        self.pending.lock().insert(id.clone(), entry);
        counter!(RELAY_REGISTERED).increment(1);

        let handle = RelayHandle {
            id,
            rx,
            pending: Arc::clone(&self.pending),
        };
        Ok((callback, handle))
    }

    /// Serves the worker side of the exchange, dispatched by method on the
    /// callback URL.
    pub async fn handle(&self, parts: &Parts, body: Bytes) -> Response<Bytes> {
        match parts.method {
            Method::GET => self.serve_snapshot(correlation_id(parts.uri.path())),
            Method::POST => self.serve_completion(correlation_id(parts.uri.path()), body),
            _ => make_error_response(StatusCode::METHOD_NOT_ALLOWED),
        }
    }

    fn serve_snapshot(&self, id: Option<&str>) -> Response<Bytes> {
        let captured = id.and_then(|id| {
            let table = self.pending.lock();
            table.get(id).map(|entry| entry.captured.clone())
        });

        match captured {
            Some(captured) => shared::http::make_json_response(StatusCode::OK, &captured),
            None => make_error_response(StatusCode::NOT_FOUND),
        }
    }

    fn serve_completion(&self, id: Option<&str>, body: Bytes) -> Response<Bytes> {
        let Some(id) = id else {
            return make_error_response(StatusCode::NOT_FOUND);
        };
        if !self.pending.lock().contains_key(id) {
            return make_error_response(StatusCode::NOT_FOUND);
        }

        let completion: Completion = match serde_json::from_slice(&body) {
            Ok(completion) => completion,
            Err(err) => {
                tracing::warn!(id, error = %err, "undecodable completion payload");
                counter!(RELAY_REJECTED).increment(1);
                return make_error_response(StatusCode::EXPECTATION_FAILED);
            }
        };
        let response = match completion.into_response() {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(id, error = %err, "rejected completion");
                counter!(RELAY_REJECTED).increment(1);
                return make_error_response(StatusCode::EXPECTATION_FAILED);
            }
        };

        // Removal decides the race against cancellation: whichever side
        // takes the entry out of the table owns the completion slot.
        let Some(entry) = self.pending.lock().remove(id) else {
            return make_error_response(StatusCode::NOT_FOUND);
        };
        counter!(RELAY_COMPLETED).increment(1);
        if entry.completion.send(response).is_err() {
            tracing::debug!(id, "caller went away between removal and delivery");
        }
        make_ok_response()
    }
}

/// The caller's side of a pending relay. Awaiting [`RelayHandle::wait`]
/// suspends until a worker completes the exchange; dropping the handle
/// (deadline elapsed, or the client hung up and hyper dropped the request
/// future) withdraws the entry.
pub struct RelayHandle {
    id: String,
    rx: oneshot::Receiver<RelayResponse>,
    pending: PendingTable,
}

impl RelayHandle {
    /// Correlation id of this pending relay.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn wait(mut self) -> Result<RelayResponse> {
        match (&mut self.rx).await {
            Ok(response) => Ok(response),
            Err(_) => Err(RelayError::Cancelled),
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        if self.pending.lock().remove(&self.id).is_some() {
            counter!(RELAY_ABANDONED).increment(1);
        }
    }
}

fn correlation_id(path: &str) -> Option<&str> {
    let id = path.trim_end_matches('/').rsplit('/').next()?;
    (!id.is_empty()).then_some(id)
}

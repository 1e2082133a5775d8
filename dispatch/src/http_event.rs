use crate::metrics_defs::RELAY_WAIT_TIMEOUT;
use crate::work::{Work, WorkSubmitter};
use bytes::Bytes;
use http::request::Parts;
use http::{Response, StatusCode};
use relay::RequestRelayer;
use shared::counter;
use shared::http::make_error_response;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Per-route handler that turns an inbound HTTP request into remotely
/// executed work.
///
/// Registers the request with the relay, hands a work descriptor to the
/// pool, and blocks until a worker posts the result or the deadline runs
/// out. The relay handle's own cleanup covers both outcomes: a timeout (or
/// a caller hanging up) drops the handle and withdraws the pending entry.
pub struct HttpEventHandler {
    command: String,
    app_name: String,
    relayer: RequestRelayer,
    submitter: Arc<dyn WorkSubmitter>,
    deadline: Duration,
}

impl HttpEventHandler {
    pub fn new(
        command: &str,
        app_name: &str,
        relayer: RequestRelayer,
        submitter: Arc<dyn WorkSubmitter>,
    ) -> Self {
        Self {
            command: command.to_string(),
            app_name: app_name.to_string(),
            relayer,
            submitter,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn handle(&self, parts: &Parts, body: Bytes) -> Response<Bytes> {
        let (callback, handle) = match self.relayer.relay(parts, body) {
            Ok(relayed) => relayed,
            Err(err) => {
                tracing::error!(error = %err, "failed to register relay");
                return make_error_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let work = Work {
            href: callback.to_string(),
            command: self.command.clone(),
            app_name: self.app_name.clone(),
        };
        let submitter = Arc::clone(&self.submitter);
        tokio::spawn(async move { submitter.submit(work).await });

        // Blocks until a worker posts the result.
        match timeout(self.deadline, handle.wait()).await {
            Ok(Ok(reply)) => {
                let mut response = Response::new(reply.body);
                *response.status_mut() = reply.status;
                *response.headers_mut() = reply.headers;
                response
            }
            Ok(Err(err)) => {
                tracing::error!(error = %err, "relayed request failed");
                make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Err(_) => {
                counter!(RELAY_WAIT_TIMEOUT).increment(1);
                tracing::error!(command = %self.command, "relayed request timed out");
                make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

use crate::DispatchError;
use crate::metrics_defs::WORK_SUBMITTED;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::counter;
use url::Url;

/// Environment variable through which an executed command discovers its
/// relay callback address. The worker exports it before invoking the
/// command so the script can GET its request and POST its result.
pub const RELAY_ADDR_ENV: &str = "FAAS_RELAY_ADDR";

/// What a worker needs to execute one relayed request: where to report,
/// what to run, and which app's droplet to run it against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    pub href: String,
    pub command: String,
    pub app_name: String,
}

/// Hands work descriptors to the worker pool. Completion is reported
/// through the relay, never through the submitter.
#[async_trait]
pub trait WorkSubmitter: Send + Sync {
    async fn submit(&self, work: Work);
}

/// Schedules a named remote task and returns its identifying guid.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_task(&self, command: &str, name: &str) -> Result<String, DispatchError>;
}

/// Transport adapter that POSTs work descriptors to the pool endpoint.
/// Delivery failures are logged and dropped; the original caller times out
/// through the relay rather than hearing about submission problems.
pub struct HttpWorkSubmitter {
    client: reqwest::Client,
    pool_url: Url,
}

impl HttpWorkSubmitter {
    pub fn new(client: reqwest::Client, pool_url: Url) -> Self {
        Self { client, pool_url }
    }
}

#[async_trait]
impl WorkSubmitter for HttpWorkSubmitter {
    async fn submit(&self, work: Work) {
        counter!(WORK_SUBMITTED).increment(1);
        match self
            .client
            .post(self.pool_url.clone())
            .json(&work)
            .send()
            .await
        {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(
                    status = %response.status(),
                    href = %work.href,
                    "worker pool rejected work"
                );
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, href = %work.href, "failed to hand work to the pool");
            }
        }
    }
}

use crate::DispatchError;
use crate::work::TaskRunner;
use async_trait::async_trait;
use capi::{Client, DropletGuidCache};
use std::sync::Arc;

/// Runs named platform tasks against an app's current droplet.
///
/// The droplet identity comes from the shared cache, so a burst of task
/// requests for one app costs a single upstream resolution instead of a
/// per-request droplet lookup.
pub struct DropletTaskRunner {
    client: Client,
    cache: Arc<DropletGuidCache>,
    app_name: String,
}

impl DropletTaskRunner {
    pub fn new(client: Client, cache: Arc<DropletGuidCache>, app_name: &str) -> Self {
        Self {
            client,
            cache,
            app_name: app_name.to_string(),
        }
    }
}

#[async_trait]
impl TaskRunner for DropletTaskRunner {
    async fn run_task(&self, command: &str, name: &str) -> Result<String, DispatchError> {
        let (_app_guid, droplet_guid) = self.cache.fetch(&self.app_name).await?;
        let droplet = (!droplet_guid.is_empty()).then_some(droplet_guid.as_str());
        let guid = self
            .client
            .create_task(command, name, droplet)
            .await
            .map_err(DispatchError::Capi)?;
        Ok(guid)
    }
}

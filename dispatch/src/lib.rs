pub mod hot_swap;
pub mod http_event;
pub mod metrics_defs;
pub mod routes;
pub mod run_task;
pub mod tasks;
pub mod work;

pub use hot_swap::HotSwap;
pub use http_event::HttpEventHandler;
pub use routes::{Route, RouteAction, RouteTable};
pub use run_task::RunTaskHandler;
pub use tasks::DropletTaskRunner;
pub use work::{HttpWorkSubmitter, RELAY_ADDR_ENV, TaskRunner, Work, WorkSubmitter};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("identity resolution failed: {0}")]
    Capi(#[from] capi::CapiError),

    #[error("task runner failed: {0}")]
    TaskRunner(String),
}

mod config;

use crate::config::{ActionConfig, Config, MetricsConfig};
use capi::DropletGuidCache;
use clap::Parser;
use dispatch::{
    DropletTaskRunner, HotSwap, HttpEventHandler, HttpWorkSubmitter, Route, RouteAction,
    RouteTable, RunTaskHandler, WorkSubmitter,
};
use metrics_exporter_statsd::StatsdBuilder;
use relay::RequestRelayer;
use shared::admin::AdminService;
use shared::http::run_http_service;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Function-as-a-service gateway: routes inbound HTTP requests to remotely
/// executed commands and relays their results back to the caller.
#[derive(Parser)]
struct Cli {
    /// Path to the gateway config file
    #[arg(short, long)]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config: {err}");
            std::process::exit(1);
        }
    };

    // The guard flushes pending events on drop; keep it for the process
    // lifetime.
    let _sentry = config.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.clone(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    if let Some(metrics) = &config.metrics {
        init_metrics(metrics);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(cli.config, config)) {
        tracing::error!(error = %err, "gateway exited with error");
        std::process::exit(1);
    }
}

async fn run(config_path: PathBuf, config: Config) -> std::io::Result<()> {
    tracing::info!("starting faas gateway");

    let http = reqwest::Client::new();
    let capi_client = capi::Client::new(
        http.clone(),
        config.capi.api_url.clone(),
        config.capi.app_guid.clone(),
        config.capi.space_guid.clone(),
    );
    let cache = Arc::new(DropletGuidCache::new(Arc::new(capi_client.clone())));

    let relay_prefix = config.relay_prefix.clone().unwrap_or_else(instance_prefix);
    let relayer = RequestRelayer::new(config.external_url.clone(), &relay_prefix);
    let submitter: Arc<dyn WorkSubmitter> = Arc::new(HttpWorkSubmitter::new(
        http.clone(),
        config.worker_pool_url.clone(),
    ));

    let table = build_route_table(&config, &relayer, &submitter, &capi_client, &cache);
    tracing::info!(
        functions = config.functions.len(),
        relay_prefix = %relay_prefix,
        "installed routing table"
    );
    let hot_swap = HotSwap::new(table);

    #[cfg(unix)]
    spawn_manifest_reload(
        config_path,
        hot_swap.clone(),
        relayer.clone(),
        Arc::clone(&submitter),
        capi_client.clone(),
        Arc::clone(&cache),
    );
    #[cfg(not(unix))]
    let _ = config_path;

    let ready = Arc::new(AtomicBool::new(true));
    let probe = Arc::clone(&ready);
    let admin = AdminService::new(move || probe.load(Ordering::Relaxed));

    tokio::try_join!(
        run_http_service(&config.listener.host, config.listener.port, hot_swap),
        run_http_service(
            &config.admin_listener.host,
            config.admin_listener.port,
            admin
        ),
    )?;
    Ok(())
}

fn build_route_table(
    config: &Config,
    relayer: &RequestRelayer,
    submitter: &Arc<dyn WorkSubmitter>,
    capi_client: &capi::Client,
    cache: &Arc<DropletGuidCache>,
) -> RouteTable {
    let mut routes = Vec::with_capacity(config.functions.len());
    for function in &config.functions {
        let methods = function
            .route
            .methods
            .iter()
            .map(http::Method::from)
            .collect();
        let action = match &function.action {
            ActionConfig::Event { command, app_name } => {
                RouteAction::Event(HttpEventHandler::new(
                    command,
                    app_name.as_deref().unwrap_or(&config.capi.app_name),
                    relayer.clone(),
                    Arc::clone(submitter),
                ))
            }
            ActionConfig::Task {
                command,
                expected_headers,
                raw_output,
            } => {
                let runner = DropletTaskRunner::new(
                    capi_client.clone(),
                    Arc::clone(cache),
                    &config.capi.app_name,
                );
                RouteAction::Task(RunTaskHandler::new(
                    command,
                    expected_headers,
                    *raw_output,
                    Arc::new(runner),
                ))
            }
        };
        routes.push(Route {
            path: function.route.path.clone(),
            methods,
            action,
        });
    }

    RouteTable::new(routes, relayer.clone())
}

/// Rebuilds and installs the routing table on SIGHUP without dropping the
/// listener. The relayer survives the swap, so in-flight relays keep their
/// callback namespace across reloads.
#[cfg(unix)]
fn spawn_manifest_reload(
    config_path: PathBuf,
    hot_swap: HotSwap<RouteTable>,
    relayer: RequestRelayer,
    submitter: Arc<dyn WorkSubmitter>,
    capi_client: capi::Client,
    cache: Arc<DropletGuidCache>,
) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(err) => {
                tracing::warn!(error = %err, "manifest reload disabled");
                return;
            }
        };

        while hangup.recv().await.is_some() {
            match Config::from_file(&config_path) {
                Ok(config) => {
                    let table =
                        build_route_table(&config, &relayer, &submitter, &capi_client, &cache);
                    hot_swap.swap(table);
                    tracing::info!(
                        functions = config.functions.len(),
                        "installed reloaded routing table"
                    );
                }
                Err(err) => {
                    tracing::error!(error = %err, "manifest reload failed, keeping active routes");
                }
            }
        }
    });
}

/// Relay callbacks live under an instance-unique namespace so instances
/// sharing infrastructure never answer each other's correlation ids.
fn instance_prefix() -> String {
    format!("_relay-{}", Uuid::new_v4().simple())
}

fn init_metrics(config: &MetricsConfig) {
    let recorder = match StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some("faas_gateway"))
    {
        Ok(recorder) => recorder,
        Err(err) => {
            tracing::warn!(error = %err, "statsd exporter disabled");
            return;
        }
    };

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("metrics recorder already installed");
        return;
    }

    for defs in [
        relay::metrics_defs::ALL_METRICS,
        dispatch::metrics_defs::ALL_METRICS,
        capi::metrics_defs::ALL_METRICS,
    ] {
        shared::metrics_defs::describe_all(defs);
    }
}

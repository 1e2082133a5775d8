use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Function route path must start with '/': {0}")]
    RoutePathNotAbsolute(String),

    #[error("Function command cannot be empty for route {0}")]
    EmptyCommand(String),

    #[error("Duplicate function route: {0}")]
    DuplicateRoute(String),

    #[error("Relay prefix cannot be empty or contain '/'")]
    InvalidRelayPrefix,
}

/// HTTP methods supported for route matching
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl From<&HttpMethod> for http::Method {
    fn from(method: &HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Delete => http::Method::DELETE,
        }
    }
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for inbound function requests
    pub listener: Listener,
    /// Admin listener for health/readiness endpoints
    pub admin_listener: Listener,
    /// Public base URL workers use to reach this instance's relay
    pub external_url: Url,
    /// Path namespace for relay callbacks; generated per instance when unset
    #[serde(default)]
    pub relay_prefix: Option<String>,
    /// Endpoint the worker pool receives work descriptors on
    pub worker_pool_url: Url,
    /// Platform API access
    pub capi: CapiConfig,
    /// Function manifest: route → remote execution
    #[serde(default)]
    pub functions: Vec<FunctionConfig>,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if let Some(prefix) = &self.relay_prefix
            && (prefix.is_empty() || prefix.contains('/'))
        {
            return Err(ValidationError::InvalidRelayPrefix);
        }

        let mut paths = HashSet::new();
        for function in &self.functions {
            let path = &function.route.path;
            if !path.starts_with('/') {
                return Err(ValidationError::RoutePathNotAbsolute(path.clone()));
            }
            if function.action.command().is_empty() {
                return Err(ValidationError::EmptyCommand(path.clone()));
            }
            if !paths.insert(path) {
                return Err(ValidationError::DuplicateRoute(path.clone()));
            }
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Platform API access configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CapiConfig {
    /// Base URL of the platform API (routed through the auth proxy)
    pub api_url: Url,
    /// Guid of the app this gateway runs as; named tasks start here
    pub app_guid: String,
    /// Space the gateway resolves app names within
    pub space_guid: String,
    /// App whose droplet runs commands when a function names none
    pub app_name: String,
}

/// One manifest entry: a route and what to execute for it
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FunctionConfig {
    pub route: RouteMatch,
    pub action: ActionConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RouteMatch {
    pub path: String,
    /// Methods the route answers; empty matches any method
    #[serde(default)]
    pub methods: Vec<HttpMethod>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Relay the request to a worker-executed command
    Event {
        command: String,
        #[serde(default)]
        app_name: Option<String>,
    },
    /// Start a named platform task
    Task {
        command: String,
        #[serde(default)]
        expected_headers: Vec<String>,
        #[serde(default)]
        raw_output: bool,
    },
}

impl ActionConfig {
    fn command(&self) -> &str {
        match self {
            ActionConfig::Event { command, .. } => command,
            ActionConfig::Task { command, .. } => command,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

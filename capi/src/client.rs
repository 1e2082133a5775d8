use crate::{CapiError, Result};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

/// HTTP client for the platform's v3 API.
///
/// Covers the three upstream operations the gateway consumes: app guid
/// lookup by name, current-droplet lookup, and named task creation. Auth
/// rides on the configured base URL (the platform routes API traffic
/// through an authenticating proxy), so no token handling happens here.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_url: Url,
    app_guid: String,
    space_guid: String,
}

#[derive(Deserialize)]
struct ResourceList {
    resources: Vec<Resource>,
}

#[derive(Deserialize)]
struct Resource {
    guid: String,
}

#[derive(Serialize)]
struct CreateTask<'a> {
    command: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    droplet_guid: Option<&'a str>,
}

impl Client {
    pub fn new(http: reqwest::Client, api_url: Url, app_guid: String, space_guid: String) -> Self {
        Self {
            http,
            api_url,
            app_guid,
            space_guid,
        }
    }

    /// Resolves an app name to its guid within the configured space.
    pub async fn app_guid(&self, app_name: &str) -> Result<String> {
        let url = self.api_url.join("/v3/apps")?;
        let response = self
            .http
            .get(url)
            .query(&[("names", app_name), ("space_guids", &self.space_guid)])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(CapiError::UnexpectedStatus {
                operation: "app lookup",
                status: response.status(),
            });
        }

        let list: ResourceList = response.json().await?;
        list.resources
            .into_iter()
            .next()
            .map(|resource| resource.guid)
            .ok_or_else(|| CapiError::AppNotFound(app_name.to_string()))
    }

    /// Resolves an app guid to the guid of its current droplet.
    pub async fn droplet_guid(&self, app_guid: &str) -> Result<String> {
        let url = self
            .api_url
            .join(&format!("/v3/apps/{app_guid}/droplets/current"))?;
        let response = self.http.get(url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let resource: Resource = response.json().await?;
                Ok(resource.guid)
            }
            StatusCode::NOT_FOUND => Err(CapiError::DropletNotFound(app_guid.to_string())),
            status => Err(CapiError::UnexpectedStatus {
                operation: "droplet lookup",
                status,
            }),
        }
    }

    /// Creates a named task on the gateway's own app, optionally pinned to
    /// a specific droplet. Returns the task guid.
    pub async fn create_task(
        &self,
        command: &str,
        name: &str,
        droplet_guid: Option<&str>,
    ) -> Result<String> {
        let url = self
            .api_url
            .join(&format!("/v3/apps/{}/tasks", self.app_guid))?;
        let response = self
            .http
            .post(url)
            .json(&CreateTask {
                command,
                name,
                droplet_guid,
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED => {
                let resource: Resource = response.json().await?;
                Ok(resource.guid)
            }
            status => Err(CapiError::UnexpectedStatus {
                operation: "task creation",
                status,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use std::convert::Infallible;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    /// Mock platform API that records the last request line and returns a
    /// canned body.
    async fn start_mock_api(
        status: StatusCode,
        body: serde_json::Value,
    ) -> (u16, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let record = Arc::clone(&record);
                let body = body.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let record = Arc::clone(&record);
                        let body = body.clone();
                        async move {
                            record
                                .lock()
                                .await
                                .push(format!("{} {}", req.method(), req.uri()));
                            let mut response =
                                Response::new(Full::new(Bytes::from(body.to_string())));
                            *response.status_mut() = status;
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        (port, seen)
    }

    fn test_client(port: u16) -> Client {
        Client::new(
            reqwest::Client::new(),
            Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
            "gateway-app-guid".to_string(),
            "space-guid".to_string(),
        )
    }

    #[tokio::test]
    async fn app_guid_queries_by_name_and_space() {
        let (port, seen) = start_mock_api(
            StatusCode::OK,
            serde_json::json!({"resources": [{"guid": "app-guid-1"}]}),
        )
        .await;

        let guid = test_client(port).app_guid("orders").await.unwrap();
        assert_eq!(guid, "app-guid-1");

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("GET /v3/apps?"));
        assert!(seen[0].contains("names=orders"));
        assert!(seen[0].contains("space_guids=space-guid"));
    }

    #[tokio::test]
    async fn app_guid_reports_missing_apps() {
        let (port, _) = start_mock_api(StatusCode::OK, serde_json::json!({"resources": []})).await;

        let err = test_client(port).app_guid("ghost").await.unwrap_err();
        assert!(matches!(err, CapiError::AppNotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn droplet_guid_maps_not_found() {
        let (port, _) = start_mock_api(StatusCode::NOT_FOUND, serde_json::json!({})).await;

        let err = test_client(port).droplet_guid("app-guid-1").await.unwrap_err();
        assert!(matches!(err, CapiError::DropletNotFound(_)));
    }

    #[tokio::test]
    async fn create_task_returns_the_task_guid() {
        let (port, seen) =
            start_mock_api(StatusCode::ACCEPTED, serde_json::json!({"guid": "task-guid"})).await;

        let guid = test_client(port)
            .create_task("./run.sh", "dGFzaw==", Some("droplet-guid"))
            .await
            .unwrap();
        assert_eq!(guid, "task-guid");

        let seen = seen.lock().await;
        assert_eq!(seen[0], "POST /v3/apps/gateway-app-guid/tasks");
    }
}

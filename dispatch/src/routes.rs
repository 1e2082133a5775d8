use crate::http_event::HttpEventHandler;
use crate::run_task::RunTaskHandler;
use bytes::Bytes;
use http::request::Parts;
use http::{Method, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::Request;
use relay::RequestRelayer;
use shared::http::make_error_response;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub enum RouteAction {
    Event(HttpEventHandler),
    Task(RunTaskHandler),
}

pub struct Route {
    pub path: String,
    /// Methods the route answers; empty matches any method.
    pub methods: Vec<Method>,
    pub action: RouteAction,
}

/// The active routing table: manifest-configured function routes plus the
/// relay's own callback namespace. Swapped wholesale on reload; never
/// mutated in place.
#[derive(Clone)]
pub struct RouteTable {
    routes: Arc<Vec<Route>>,
    relayer: RequestRelayer,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>, relayer: RequestRelayer) -> Self {
        Self {
            routes: Arc::new(routes),
            relayer,
        }
    }

    pub async fn handle(&self, parts: Parts, body: Bytes) -> Response<Bytes> {
        if self.is_relay_path(parts.uri.path()) {
            return self.relayer.handle(&parts, body).await;
        }

        match self.find_route(&parts) {
            Some(route) => match &route.action {
                RouteAction::Event(handler) => handler.handle(&parts, body).await,
                RouteAction::Task(handler) => handler.handle(&parts).await,
            },
            None => {
                tracing::warn!(
                    method = %parts.method,
                    path = %parts.uri.path(),
                    "no route matched"
                );
                make_error_response(StatusCode::NOT_FOUND)
            }
        }
    }

    fn is_relay_path(&self, path: &str) -> bool {
        path.trim_start_matches('/')
            .strip_prefix(self.relayer.prefix())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    fn find_route(&self, parts: &Parts) -> Option<&Route> {
        self.routes.iter().find(|route| {
            route.path == parts.uri.path()
                && (route.methods.is_empty() || route.methods.contains(&parts.method))
        })
    }
}

impl Service<Request<Incoming>> for RouteTable {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let table = self.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read request body");
                    return Ok(make_error_response(StatusCode::BAD_REQUEST).map(Full::new));
                }
            };
            Ok(table.handle(parts, body).await.map(Full::new))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DispatchError;
    use crate::work::TaskRunner;
    use async_trait::async_trait;
    use http::Request;
    use url::Url;

    struct StubRunner;

    #[async_trait]
    impl TaskRunner for StubRunner {
        async fn run_task(&self, _command: &str, _name: &str) -> Result<String, DispatchError> {
            Ok("task-guid".to_string())
        }
    }

    fn test_relayer() -> RequestRelayer {
        RequestRelayer::new(Url::parse("http://gateway.internal").unwrap(), "relay")
    }

    fn task_route(path: &str, methods: Vec<Method>) -> Route {
        Route {
            path: path.to_string(),
            methods,
            action: RouteAction::Task(RunTaskHandler::new(
                "./task.sh",
                &[],
                true,
                Arc::new(StubRunner),
            )),
        }
    }

    fn request_parts(method: Method, uri: &str) -> Parts {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn dispatches_to_the_matching_route() {
        let table = RouteTable::new(
            vec![task_route("/v1/reports", vec![Method::POST])],
            test_relayer(),
        );

        let response = table
            .handle(request_parts(Method::POST, "/v1/reports"), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"task-guid");
    }

    #[tokio::test]
    async fn method_mismatch_is_not_found() {
        let table = RouteTable::new(
            vec![task_route("/v1/reports", vec![Method::POST])],
            test_relayer(),
        );

        let response = table
            .handle(request_parts(Method::GET, "/v1/reports"), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_method_list_matches_any_method() {
        let table = RouteTable::new(vec![task_route("/v1/reports", vec![])], test_relayer());

        let response = table
            .handle(request_parts(Method::DELETE, "/v1/reports"), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let table = RouteTable::new(vec![], test_relayer());

        let response = table
            .handle(request_parts(Method::GET, "/nope"), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn relay_namespace_reaches_the_relayer() {
        let relayer = test_relayer();
        let table = RouteTable::new(vec![], relayer.clone());

        let parts = request_parts(Method::PUT, "/v1/some-path");
        let (callback, _handle) = relayer.relay(&parts, Bytes::new()).unwrap();

        let response = table
            .handle(request_parts(Method::GET, callback.path()), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        // 405 comes from the relayer, proving the namespace dispatch.
        let response = table
            .handle(request_parts(Method::PATCH, callback.path()), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn similar_prefixes_do_not_capture_routes() {
        let table = RouteTable::new(vec![task_route("/relayed", vec![])], test_relayer());

        // "/relayed" shares characters with the "relay" namespace but is a
        // normal route.
        let response = table
            .handle(request_parts(Method::POST, "/relayed"), Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

//! HTTP admin endpoint: introspection view, reload action, and metrics.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::{error, info};

use super::{Credentials, ManagementLink, Metrics, ReloadOutcome, ReloadTrigger};
use crate::docs::{self, ConfiguratorDoc};
use crate::engine::ConfigurationEngine;
use crate::error::AdminError;

/// JSON body of the management page.
#[derive(Debug, Serialize)]
pub struct ManagementView {
    pub display_name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub sources: Vec<String>,
    pub last_loaded: Option<DateTime<Utc>>,
    pub roots: Vec<String>,
    pub configurators: Vec<ConfiguratorDoc>,
}

impl ManagementView {
    /// Builds the view from the engine's current state.
    pub fn capture(engine: &ConfigurationEngine) -> Self {
        let state = engine.state();
        Self {
            display_name: ManagementLink::DISPLAY_NAME,
            description: ManagementLink::DESCRIPTION,
            icon: ManagementLink::ICON,
            sources: state.sources,
            last_loaded: state.last_loaded,
            roots: engine
                .root_configurators()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            configurators: docs::describe(engine),
        }
    }
}

/// HTTP server for the management page.
pub struct AdminServer {
    /// Reload trigger, which also owns the engine.
    trigger: Arc<ReloadTrigger>,
    /// Metrics instance.
    metrics: Option<Arc<Metrics>>,
    /// Address to listen on.
    addr: SocketAddr,
}

impl AdminServer {
    /// Creates a new admin server.
    pub fn new(
        trigger: Arc<ReloadTrigger>,
        metrics: Option<Arc<Metrics>>,
        addr: SocketAddr,
    ) -> Self {
        Self {
            trigger,
            metrics,
            addr,
        }
    }

    /// Starts the admin HTTP server.
    pub async fn start(self) -> Result<(), AdminError> {
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper_util::rt::TokioIo;

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| AdminError::BindFailed {
                addr: self.addr,
                source: e,
            })?;

        info!(addr = %self.addr, "Starting admin server");

        let server = Arc::new(self);

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| AdminError::Serve(e.to_string()))?;

            let io = TokioIo::new(stream);
            let server = Arc::clone(&server);

            tokio::spawn(async move {
                let service = service_fn(|req| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, hyper::Error>(server.handle(req).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!(error = %e, "Error serving connection");
                }
            });
        }
    }

    /// Routes one request. The request body is never read.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>> {
        let page = format!("/{}", ManagementLink::URL_NAME);
        let reload = format!("/{}/reload", ManagementLink::URL_NAME);
        let path = req.uri().path().trim_end_matches('/').to_string();

        if path == page {
            return match *req.method() {
                Method::GET => self.view(),
                _ => method_not_allowed("GET"),
            };
        }

        if path == reload {
            if req.method() != Method::POST {
                return method_not_allowed("POST");
            }
            let credentials = Credentials::from_authorization(
                req.headers()
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok()),
            );
            return self.reload(credentials).await;
        }

        if path == "/metrics" && req.method() == Method::GET {
            return self.metrics();
        }

        respond(StatusCode::NOT_FOUND, "text/plain", "Not Found")
    }

    fn view(&self) -> Response<Full<Bytes>> {
        let view = ManagementView::capture(self.trigger.engine());
        match serde_json::to_string_pretty(&view) {
            Ok(body) => respond(StatusCode::OK, "application/json", body),
            Err(e) => internal_error(e),
        }
    }

    async fn reload(&self, credentials: Credentials) -> Response<Full<Bytes>> {
        let trigger = Arc::clone(&self.trigger);
        let outcome = tokio::task::spawn_blocking(move || trigger.reload(&credentials)).await;

        match outcome {
            Ok(Ok(ReloadOutcome::Reloaded { redirect, .. })) => {
                let mut response = respond(StatusCode::SEE_OTHER, "text/plain", "");
                if let Ok(location) = HeaderValue::from_str(&redirect) {
                    response.headers_mut().insert(LOCATION, location);
                }
                response
            }
            Ok(Ok(ReloadOutcome::Denied)) => respond(StatusCode::OK, "text/plain", ""),
            Ok(Err(e)) => internal_error(e),
            Err(e) => internal_error(e),
        }
    }

    fn metrics(&self) -> Response<Full<Bytes>> {
        let Some(metrics) = &self.metrics else {
            return respond(StatusCode::NOT_FOUND, "text/plain", "Not Found");
        };
        match metrics.gather() {
            Ok(body) => respond(StatusCode::OK, "text/plain; version=0.0.4", body),
            Err(e) => internal_error(e),
        }
    }
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn method_not_allowed(allow: &'static str) -> Response<Full<Bytes>> {
    let mut response = respond(StatusCode::METHOD_NOT_ALLOWED, "text/plain", "Method Not Allowed");
    response
        .headers_mut()
        .insert(hyper::header::ALLOW, HeaderValue::from_static(allow));
    response
}

fn internal_error(e: impl std::fmt::Display) -> Response<Full<Bytes>> {
    error!(error = %e, "Admin request failed");
    respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::TokenAuthorizer;
    use crate::config::{FixedProperties, SourceResolver};
    use crate::configurator::{Attribute, RegistryBuilder, SectionConfigurator};
    use http_body_util::BodyExt;
    use tempfile::TempDir;

    fn server(dir: &TempDir) -> AdminServer {
        let registry = RegistryBuilder::new()
            .root(
                SectionConfigurator::<serde_yaml::Value>::new("system")
                    .attribute(Attribute::of::<String>("message")),
            )
            .build()
            .unwrap();
        let metrics = Arc::new(Metrics::new().unwrap());
        let engine =
            ConfigurationEngine::new(Arc::new(registry), Arc::new(FixedProperties::new()))
                .with_resolver(
                    SourceResolver::new().with_default_path(dir.path().join("casc.yaml")),
                )
                .with_metrics(Arc::clone(&metrics));
        let trigger = ReloadTrigger::new(
            Arc::new(engine),
            Arc::new(TokenAuthorizer::new(Some("letmein".to_string()))),
        );

        AdminServer::new(Arc::new(trigger), Some(metrics), ([127, 0, 0, 1], 0).into())
    }

    fn request(method: Method, path: &str, token: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(()).unwrap()
    }

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn authorized_reload_redirects_to_page() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("casc.yaml"), "system:\n  message: hi\n").unwrap();
        let server = server(&dir);

        let response = server
            .handle(request(Method::POST, "/configuration-as-code/reload", Some("letmein")))
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/configuration-as-code/"
        );
        assert_eq!(server.trigger.engine().sources(), vec!["casc.yaml".to_string()]);
    }

    #[tokio::test]
    async fn unauthorized_reload_is_a_silent_no_op() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("casc.yaml"), "system: {}\n").unwrap();
        let server = server(&dir);

        for token in [None, Some("wrong")] {
            let response = server
                .handle(request(Method::POST, "/configuration-as-code/reload", token))
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_string(response).await.is_empty());
        }
        assert_eq!(server.trigger.engine().last_loaded(), None);
    }

    #[tokio::test]
    async fn failed_reload_reports_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("casc.yaml"), "unmanaged: {}\n").unwrap();
        let server = server(&dir);

        let response = server
            .handle(request(Method::POST, "/configuration-as-code/reload", Some("letmein")))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.contains("'unmanaged'"));
    }

    #[tokio::test]
    async fn reload_requires_post() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir);

        let response = server
            .handle(request(Method::GET, "/configuration-as-code/reload", Some("letmein")))
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(server.trigger.engine().last_loaded(), None);
    }

    #[tokio::test]
    async fn page_lists_state_and_configurators() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir);

        let response = server
            .handle(request(Method::GET, "/configuration-as-code/", None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["display_name"], "Configuration as Code");
        assert_eq!(body["roots"], serde_json::json!(["system"]));
        assert_eq!(body["configurators"][0]["name"], "system");
        assert_eq!(body["sources"], serde_json::json!([]));
        assert!(body["last_loaded"].is_null());
    }

    #[tokio::test]
    async fn metrics_and_unknown_paths() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir);

        let response = server.handle(request(Method::GET, "/metrics", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("casc_loads_total"));

        let response = server.handle(request(Method::GET, "/elsewhere", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

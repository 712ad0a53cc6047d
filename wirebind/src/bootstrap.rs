//! Startup assembly of the serving pipeline
//!
//! [`AppBuilder`] replaces ambient registration tables: startup code
//! accumulates field resolvers, route installers, and interceptor installers
//! on the builder, then calls [`AppBuilder::build`] exactly once. The result
//! is an [`App`] whose resolver registry is frozen behind an `Arc` — nothing
//! registers anything after serving begins.
//!
//! The built router carries the baseline middleware stack (request tracing,
//! request-id generation and propagation, sensitive-header masking, panic
//! recovery) and nests every registered route under the configured base
//! path.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, RawPathParams, Request};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::header::HeaderName;
use http::StatusCode;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::resolver::FieldResolvers;

/// Headers masked in logs
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
];

/// Shared state attached to the router: the frozen registries
#[derive(Clone)]
pub struct AppState {
    resolvers: Arc<FieldResolvers>,
    config: Arc<Config>,
}

impl AppState {
    /// The process-wide field-resolver registry
    pub fn resolvers(&self) -> &Arc<FieldResolvers> {
        &self.resolvers
    }

    /// The loaded service configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            resolvers: Arc::new(FieldResolvers::default()),
            config: Arc::new(Config::default()),
        }
    }
}

/// A startup function that installs routes or middleware on the router
pub type RouterInstaller = Box<dyn FnOnce(Router<AppState>) -> Router<AppState> + Send>;

/// Accumulates startup registrations and assembles the serving pipeline
pub struct AppBuilder {
    config: Option<Config>,
    resolvers: FieldResolvers,
    routes: Vec<RouterInstaller>,
    interceptors: Vec<RouterInstaller>,
}

impl AppBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            config: None,
            resolvers: FieldResolvers::new(),
            routes: Vec::new(),
            interceptors: Vec::new(),
        }
    }

    /// Set the service configuration (optional, defaults to `Config::load()`)
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Register (or overwrite) the fallback resolver for a logical field name
    pub fn register_field<F>(mut self, name: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&RequestContext) -> Result<String> + Send + Sync + 'static,
    {
        self.resolvers.register(name, resolver);
        self
    }

    /// Register a route installer, applied in registration order
    pub fn register_route<F>(mut self, install: F) -> Self
    where
        F: FnOnce(Router<AppState>) -> Router<AppState> + Send + 'static,
    {
        self.routes.push(Box::new(install));
        self
    }

    /// Register an interceptor installer, wrapped around the whole route group
    pub fn register_interceptor<F>(mut self, install: F) -> Self
    where
        F: FnOnce(Router<AppState>) -> Router<AppState> + Send + 'static,
    {
        self.interceptors.push(Box::new(install));
        self
    }

    /// Assemble the serving pipeline
    ///
    /// Loads configuration and initializes tracing if the caller did not,
    /// freezes the resolver registry, installs all registered routes and
    /// interceptors under the configured base path, and applies the baseline
    /// middleware stack.
    pub fn build(self) -> App {
        let config = self.config.unwrap_or_else(|| {
            Config::load().unwrap_or_else(|e| {
                eprintln!("Warning: failed to load config: {e}, using defaults");
                Config::default()
            })
        });

        if let Err(e) = crate::observability::init_tracing(&config) {
            tracing::debug!("tracing already initialized: {e}");
        }

        let state = AppState {
            resolvers: Arc::new(self.resolvers),
            config: Arc::new(config.clone()),
        };

        let mut group: Router<AppState> = Router::new();
        for install in self.routes {
            group = install(group);
        }
        for install in self.interceptors {
            group = install(group);
        }

        let router = Router::new()
            .nest(&config.service.base_path, group)
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(sensitive_headers_layer())
            .layer(CatchPanicLayer::new())
            .with_state(state);

        let listener_addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.service.port));

        App {
            config,
            listener_addr,
            router,
        }
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn sensitive_headers_layer() -> SetSensitiveRequestHeadersLayer {
    SetSensitiveRequestHeadersLayer::new(
        SENSITIVE_HEADERS
            .iter()
            .filter_map(|h| h.parse::<HeaderName>().ok()),
    )
}

/// The assembled service
pub struct App {
    config: Config,
    listener_addr: std::net::SocketAddr,
    router: Router,
}

impl App {
    /// Serve with graceful shutdown (SIGTERM / ctrl-c)
    pub async fn serve(self) -> Result<()> {
        use tokio::net::TcpListener;
        use tokio::signal;

        tracing::info!("Starting service on {}", self.listener_addr);

        let listener = TcpListener::bind(&self.listener_addr).await?;

        async fn shutdown_signal() {
            let ctrl_c = async {
                signal::ctrl_c()
                    .await
                    .expect("failed to install Ctrl+C handler");
            };

            #[cfg(unix)]
            let terminate = async {
                signal::unix::signal(signal::unix::SignalKind::terminate())
                    .expect("failed to install signal handler")
                    .recv()
                    .await;
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {},
                _ = terminate => {},
            }
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// The loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The assembled router, for driving the pipeline without a listener
    pub fn into_router(self) -> Router {
        self.router
    }
}

impl FromRequest<AppState> for RequestContext {
    type Rejection = Response;

    async fn from_request(req: Request, state: &AppState) -> std::result::Result<Self, Response> {
        let (mut parts, body) = req.into_parts();

        // Absent when the route has no captures
        let path_params: Vec<(String, String)> =
            match RawPathParams::from_request_parts(&mut parts, state).await {
                Ok(params) => params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                Err(_) => Vec::new(),
            };

        // A failed read here means the peer went away or the request was
        // canceled mid-body; report it distinguishably from bad input.
        let bytes: Bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = Error::Canceled(e.to_string());
                tracing::warn!(error = %err, "request body read failed");
                let envelope = serde_json::json!({
                    "code": crate::response::DEFAULT_ERROR_CODE,
                    "msg": err.to_string(),
                    "data": serde_json::Value::Null,
                });
                return Err((StatusCode::OK, axum::Json(envelope)).into_response());
            }
        };

        let mut builder = RequestContext::builder()
            .method(parts.method.clone())
            .uri(parts.uri.clone())
            .headers(parts.headers.clone())
            .body(bytes)
            .resolvers(state.resolvers.clone());
        for (name, value) in path_params {
            builder = builder.path_param(name, value);
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{BindSchema, Binder, FieldDescriptor};
    use crate::handler::Handler;
    use crate::response::Reply;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::routing::get;
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use validator::Validate;

    #[derive(Debug, Default, Deserialize, Validate)]
    #[serde(default)]
    struct SearchParams {
        param: String,
        token: String,
    }

    impl BindSchema for SearchParams {
        fn fields() -> &'static [FieldDescriptor<Self>] {
            const FIELDS: &[FieldDescriptor<SearchParams>] = &[
                FieldDescriptor::text("param", |p, v| p.param = v, |p| p.param.is_empty()),
                FieldDescriptor::text("token", |p, v| p.token = v, |p| p.token.is_empty()),
            ];
            FIELDS
        }
    }

    #[async_trait]
    impl Handler for SearchParams {
        async fn exec(&self) -> Result<Reply> {
            Reply::data(json!({"param": self.param, "token": self.token}))
        }
    }

    #[derive(Debug, Default, Deserialize, Validate)]
    #[serde(default)]
    struct ItemParams {
        id: i64,
    }

    impl BindSchema for ItemParams {
        fn fields() -> &'static [FieldDescriptor<Self>] {
            const FIELDS: &[FieldDescriptor<ItemParams>] =
                &[FieldDescriptor::integer("id", |p, v| p.id = v, |p| p.id == 0)];
            FIELDS
        }
    }

    #[async_trait]
    impl Handler for ItemParams {
        async fn exec(&self) -> Result<Reply> {
            Reply::data(json!({"id": self.id}))
        }
    }

    async fn search(ctx: RequestContext) -> RequestContext {
        Binder::<SearchParams>::new(ctx).query(&["param", "token"]).await
    }

    async fn item(ctx: RequestContext) -> RequestContext {
        Binder::<ItemParams>::new(ctx).path(&["id"]).await
    }

    fn test_app() -> Router {
        AppBuilder::new()
            .with_config(Config::default())
            .register_field("token", |ctx: &RequestContext| {
                ctx.header("token")
                    .map(str::to_string)
                    .ok_or_else(|| Error::resolution("token头缺失"))
            })
            .register_route(|r| r.route("/search", get(search)))
            .register_route(|r| r.route("/item/{id}", get(item)))
            .build()
            .into_router()
    }

    async fn get_json(router: Router, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        let mut req = axum::http::Request::builder().uri(uri);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let response = router
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    #[tokio::test]
    async fn query_route_binds_and_dispatches_end_to_end() {
        let (status, body) =
            get_json(test_app(), "/api/search?param=foo", &[("token", "abc")]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 200);
        assert_eq!(body["msg"], "success");
        assert_eq!(body["data"]["param"], "foo");
        assert_eq!(body["data"]["token"], "abc");
    }

    #[tokio::test]
    async fn resolver_failure_surfaces_through_the_router() {
        let (status, body) = get_json(test_app(), "/api/search?param=foo", &[]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 500);
        assert_eq!(body["msg"], "token头缺失");
    }

    #[tokio::test]
    async fn path_capture_reaches_the_binder() {
        let (_, body) = get_json(test_app(), "/api/item/42", &[]).await;

        assert_eq!(body["code"], 200);
        assert_eq!(body["data"]["id"], 42);
    }

    #[tokio::test]
    async fn interceptors_wrap_the_route_group() {
        let router = AppBuilder::new()
            .with_config(Config::default())
            .register_route(|r| r.route("/ping", get(|| async { "pong" })))
            .register_interceptor(|r| {
                r.layer(axum::middleware::from_fn(
                    |req: Request, next: axum::middleware::Next| async move {
                        let mut response = next.run(req).await;
                        response
                            .headers_mut()
                            .insert("x-intercepted", "1".parse().unwrap());
                        response
                    },
                ))
            })
            .build()
            .into_router();

        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["x-intercepted"], "1");
    }
}

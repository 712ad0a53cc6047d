//! # wirebind
//!
//! Declarative request binding and polymorphic dispatch for axum services.
//!
//! A route handler names a parameter struct and an input channel; the binder
//! populates the struct from the request (JSON body, query string, path
//! captures, or multipart form), falls back to registered field resolvers for
//! anything the request left unset, validates the result, and dispatches to
//! the struct's handler implementation. Every outcome is written through a
//! uniform `{code, msg, data}` envelope with write-once semantics.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wirebind::prelude::*;
//!
//! #[derive(Debug, Default, Deserialize, Validate)]
//! #[serde(default)]
//! struct SearchParams {
//!     #[validate(length(min = 1))]
//!     param: String,
//!     token: String,
//! }
//!
//! impl BindSchema for SearchParams {
//!     fn fields() -> &'static [FieldDescriptor<Self>] {
//!         const FIELDS: &[FieldDescriptor<SearchParams>] = &[
//!             FieldDescriptor::text("param", |p, v| p.param = v, |p| p.param.is_empty()),
//!             FieldDescriptor::text("token", |p, v| p.token = v, |p| p.token.is_empty()),
//!         ];
//!         FIELDS
//!     }
//! }
//!
//! #[async_trait]
//! impl Handler for SearchParams {
//!     async fn exec(&self) -> Result<Reply> {
//!         Reply::data(serde_json::json!({ "matched": self.param }))
//!     }
//! }
//!
//! async fn search(ctx: RequestContext) -> RequestContext {
//!     Binder::<SearchParams>::new(ctx).query(&["param", "token"]).await
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     AppBuilder::new()
//!         .register_field("token", |ctx: &RequestContext| {
//!             ctx.header("token")
//!                 .map(str::to_string)
//!                 .ok_or_else(|| Error::resolution("token头缺失"))
//!         })
//!         .register_route(|r| r.route("/search", get(search)))
//!         .build()
//!         .serve()
//!         .await
//! }
//! ```

pub mod binder;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod observability;
pub mod resolver;
pub mod response;
pub mod validate;

pub mod prelude {
    pub use crate::binder::{BindParams, BindSchema, Binder, FieldDescriptor, FieldKind};
    pub use crate::bootstrap::{App, AppBuilder, AppState, RouterInstaller};
    pub use crate::config::{Config, ServiceConfig};
    pub use crate::context::{
        MultipartForm, RequestContext, RequestContextBuilder, UploadedFile, AUDIT_MAX_CHARS,
        REQUEST_PARAMS, RESPONSE_BODY, RESPONSE_ERR,
    };
    pub use crate::error::{Error, Result};
    pub use crate::handler::Handler;
    pub use crate::observability::init_tracing;
    pub use crate::resolver::{FieldResolver, FieldResolvers};
    pub use crate::response::{
        error, param_error, success, Envelope, PageEnvelope, Reply, TreeNode, DEFAULT_ERROR_CODE,
        SUCCESS_CODE,
    };
    pub use crate::validate::validate;

    pub use axum::{
        extract::State,
        http::{HeaderMap, HeaderValue, StatusCode},
        response::{IntoResponse, Json, Response},
        routing::{delete, get, post, put},
        Router,
    };

    pub use serde::{Deserialize, Serialize};
    pub use validator::Validate;

    pub use tracing::{debug, error as log_error, info, instrument, trace, warn};

    pub use tokio;

    pub use async_trait::async_trait;

    pub use anyhow::{self, Context as AnyhowContext};
    pub use thiserror::Error as ThisError;

    pub use http::{Method, Uri};
}

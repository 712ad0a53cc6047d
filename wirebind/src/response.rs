//! Uniform response envelope and the success/error formatter
//!
//! Every request answered by this layer carries exactly one JSON envelope
//! `{code, msg, data}` (or its paginated variant). The formatter records
//! truncated audit copies of what it wrote on the request context so that
//! surrounding logging middleware can pick them up.
//!
//! The HTTP status line is 200 for success and error alike; the application
//! code lives inside the envelope.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::{truncate_chars, RequestContext, AUDIT_MAX_CHARS, RESPONSE_BODY, RESPONSE_ERR};
use crate::error::{Error, Result};

/// Envelope code reported on success
pub const SUCCESS_CODE: i64 = 200;

/// Envelope code reported for errors unless the caller overrides it
pub const DEFAULT_ERROR_CODE: i64 = 500;

/// Standard response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    /// Application code (200 on success, 500 default on error)
    pub code: i64,
    /// Human-readable message
    pub msg: String,
    /// Payload
    pub data: T,
}

impl<T> Envelope<T> {
    /// Success envelope around `data`
    pub fn success(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            msg: "success".to_string(),
            data,
        }
    }
}

impl Envelope<Value> {
    fn into_value(self) -> Value {
        serde_json::json!({
            "code": self.code,
            "msg": self.msg,
            "data": self.data,
        })
    }
}

/// Paginated response envelope
///
/// Carries the page bookkeeping at the top level alongside the base triple,
/// matching the wire shape `{code, msg, data, currentPage, pageSize,
/// pageCount, totalCount}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEnvelope<T = Value> {
    /// Base envelope
    #[serde(flatten)]
    pub envelope: Envelope<T>,
    /// Current page, 1-based
    #[serde(rename = "currentPage")]
    pub current_page: u64,
    /// Items per page
    #[serde(rename = "pageSize")]
    pub page_size: u64,
    /// Total number of pages
    #[serde(rename = "pageCount")]
    pub page_count: u64,
    /// Total number of items
    #[serde(rename = "totalCount")]
    pub total_count: u64,
}

impl<T> PageEnvelope<T> {
    /// Success envelope around one page of `data`
    pub fn new(data: T, current_page: u64, page_size: u64, total_count: u64) -> Self {
        Self {
            envelope: Envelope::success(data),
            current_page,
            page_size,
            page_count: total_count.div_ceil(page_size.max(1)),
            total_count,
        }
    }
}

impl PageEnvelope<Value> {
    fn into_value(self) -> Value {
        serde_json::json!({
            "code": self.envelope.code,
            "msg": self.envelope.msg,
            "data": self.envelope.data,
            "currentPage": self.current_page,
            "pageSize": self.page_size,
            "pageCount": self.page_count,
            "totalCount": self.total_count,
        })
    }
}

/// Tree-shaped payload: one node and its immediate children
///
/// Serialized as `{"node": …, "childList": […]}`, for endpoints returning
/// hierarchical data (menus, category trees). Goes inside a normal success
/// envelope via [`Reply::data`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode<T = Value> {
    /// The node's own payload
    pub node: T,
    /// Children, empty for a leaf
    #[serde(rename = "childList")]
    pub child_list: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    /// A node with no children
    pub fn leaf(node: T) -> Self {
        Self {
            node,
            child_list: Vec::new(),
        }
    }

    /// A node with the given children
    pub fn with_children(node: T, child_list: Vec<TreeNode<T>>) -> Self {
        Self { node, child_list }
    }
}

/// What a handler hands back to the formatter
#[derive(Debug, Clone)]
pub enum Reply {
    /// No payload; becomes `{code: 200, msg: "success", data: null}`
    None,
    /// A singular value; wrapped into a success envelope
    Data(Value),
    /// An already-built page envelope; passed through without re-wrapping
    Page(PageEnvelope<Value>),
}

impl Reply {
    /// Serialize any value into a data reply
    pub fn data<T: Serialize>(value: T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Self::Data)
            .map_err(|e| Error::Internal(e.to_string()))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl From<PageEnvelope<Value>> for Reply {
    fn from(page: PageEnvelope<Value>) -> Self {
        Self::Page(page)
    }
}

/// Emit the success envelope for `reply`
///
/// `Reply::Page` is written as-is; wrapping it again would nest envelopes.
pub fn success(ctx: &mut RequestContext, reply: Reply) {
    let body = match reply {
        Reply::Page(page) => page.into_value(),
        Reply::Data(data) => Envelope::success(data).into_value(),
        Reply::None => Envelope::success(Value::Null).into_value(),
    };
    ctx.set(RESPONSE_BODY, truncate_chars(&body.to_string(), AUDIT_MAX_CHARS));
    ctx.write_json(StatusCode::OK, body);
}

/// Emit the error envelope for `err` and abort the request
///
/// The audit copy under [`RESPONSE_ERR`] is truncated to 255 characters;
/// the envelope itself carries the full message.
pub fn error(ctx: &mut RequestContext, err: &Error, code: Option<i64>) {
    tracing::error!(error = %err, "request failed");
    let msg = err.to_string();
    ctx.set(RESPONSE_ERR, truncate_chars(&msg, AUDIT_MAX_CHARS));
    let body = Envelope {
        code: code.unwrap_or(DEFAULT_ERROR_CODE),
        msg,
        data: Value::Null,
    }
    .into_value();
    ctx.write_json(StatusCode::OK, body);
    ctx.abort();
}

/// Shorthand for the generic parameter-error envelope (`参数错误`)
pub fn param_error(ctx: &mut RequestContext) {
    error(ctx, &Error::Parameter, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext::builder().build()
    }

    #[test]
    fn data_reply_is_wrapped() {
        let mut ctx = ctx();
        success(&mut ctx, Reply::Data(json!({"id": 7})));

        let (status, body) = ctx.response().unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 200);
        assert_eq!(body["msg"], "success");
        assert_eq!(body["data"]["id"], 7);
        assert!(ctx.get(RESPONSE_BODY).is_some());
    }

    #[test]
    fn page_reply_passes_through_unwrapped() {
        let mut ctx = ctx();
        let page = PageEnvelope::new(json!([1, 2, 3]), 2, 10, 25);
        success(&mut ctx, Reply::Page(page));

        let (_, body) = ctx.response().unwrap();
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"], json!([1, 2, 3]));
        assert_eq!(body["currentPage"], 2);
        assert_eq!(body["pageSize"], 10);
        assert_eq!(body["pageCount"], 3);
        assert_eq!(body["totalCount"], 25);
        // No nested envelope inside data
        assert!(body["data"].get("code").is_none());
    }

    #[test]
    fn error_truncates_audit_but_not_the_envelope() {
        let mut ctx = ctx();
        let long = "x".repeat(300);
        error(&mut ctx, &Error::Handler(long.clone()), None);

        assert_eq!(ctx.get(RESPONSE_ERR).unwrap().chars().count(), 255);
        let (_, body) = ctx.response().unwrap();
        assert_eq!(body["msg"].as_str().unwrap(), long);
        assert_eq!(body["code"], 500);
        assert!(ctx.is_aborted());
    }

    #[test]
    fn error_code_override_is_respected() {
        let mut ctx = ctx();
        error(&mut ctx, &Error::handler("denied"), Some(403));
        let (_, body) = ctx.response().unwrap();
        assert_eq!(body["code"], 403);
        assert_eq!(body["msg"], "denied");
    }

    #[test]
    fn nothing_is_written_after_an_error_envelope() {
        let mut ctx = ctx();
        param_error(&mut ctx);
        success(&mut ctx, Reply::None);

        let (_, body) = ctx.response().unwrap();
        assert_eq!(body["msg"], "参数错误");
        assert_eq!(body["code"], 500);
    }

    #[test]
    fn tree_reply_serializes_node_and_children() {
        let tree = TreeNode::with_children(
            json!({"id": 1}),
            vec![TreeNode::leaf(json!({"id": 2})), TreeNode::leaf(json!({"id": 3}))],
        );

        let mut ctx = ctx();
        success(&mut ctx, Reply::data(tree).unwrap());

        let (_, body) = ctx.response().unwrap();
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"]["node"]["id"], 1);
        assert_eq!(body["data"]["childList"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["childList"][1]["node"]["id"], 3);
        assert_eq!(body["data"]["childList"][0]["childList"], json!([]));
    }

    #[test]
    fn page_count_rounds_up() {
        let page = PageEnvelope::new(json!([]), 1, 10, 21);
        assert_eq!(page.page_count, 3);
        let page = PageEnvelope::new(json!([]), 1, 0, 5);
        assert_eq!(page.page_count, 5);
    }
}

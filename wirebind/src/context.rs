//! Request-scoped context consumed by the binder and handlers
//!
//! [`RequestContext`] is the crate's view of one inbound request: the
//! buffered raw body, a presence-aware query map, matched path segments,
//! headers, multipart access, a string key/value store for audit state, and
//! a write-once JSON response slot.
//!
//! One context exists per request and is never shared between requests. It
//! implements [`IntoResponse`], so an axum handler can simply return the
//! context it got back from the binder.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::resolver::FieldResolvers;

/// Audit key holding the `Debug` snapshot of the last bound parameter object
pub const REQUEST_PARAMS: &str = "request_params";

/// Audit key holding the serialized success envelope body
pub const RESPONSE_BODY: &str = "response_body";

/// Audit key holding the last error message
pub const RESPONSE_ERR: &str = "response_err";

/// Maximum length, in characters, of an audit slot value
pub const AUDIT_MAX_CHARS: usize = 255;

/// Truncate to at most `max` characters, never splitting a code point.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// One uploaded file from a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name, if any
    pub file_name: Option<String>,
    /// Declared content type of the part
    pub content_type: Option<String>,
    /// File contents
    pub data: Bytes,
}

/// Decoded multipart form: named file lists and named text values
#[derive(Debug, Default)]
pub struct MultipartForm {
    /// Uploaded files keyed by part name
    pub files: HashMap<String, Vec<UploadedFile>>,
    /// Text values keyed by part name
    pub values: HashMap<String, Vec<String>>,
}

/// Per-request context
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    path_params: Vec<(String, String)>,
    body: Bytes,
    resolvers: Arc<FieldResolvers>,
    store: HashMap<String, String>,
    response: Option<(StatusCode, Value)>,
    aborted: bool,
}

impl RequestContext {
    /// Start building a context manually (tests, non-axum embeddings)
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// Request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URI
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Header value as UTF-8 text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First query-string value for `name`, exact match
    ///
    /// Presence-aware: returns `Some("")` for `?name=` and `None` when the
    /// key never appears. The binder treats both as absent.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Matched path segment for `name`
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Buffered request body
    pub fn raw_body(&self) -> &Bytes {
        &self.body
    }

    /// The frozen field-resolver registry for this process
    pub fn resolvers(&self) -> &Arc<FieldResolvers> {
        &self.resolvers
    }

    /// Decode the buffered body as a multipart form
    ///
    /// Fails with [`Error::Parameter`] when the request lacks a multipart
    /// content type or the payload does not decode.
    pub async fn multipart_form(&self) -> Result<MultipartForm> {
        let content_type = self
            .header(http::header::CONTENT_TYPE.as_str())
            .ok_or(Error::Parameter)?;
        let boundary = multer::parse_boundary(content_type).map_err(|_| Error::Parameter)?;

        let stream = futures::stream::once(futures::future::ready(Ok::<_, std::io::Error>(
            self.body.clone(),
        )));
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut form = MultipartForm::default();
        while let Some(field) = multipart.next_field().await.map_err(|_| Error::Parameter)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(|m| m.to_string());
            if file_name.is_some() {
                let data = field.bytes().await.map_err(|_| Error::Parameter)?;
                form.files.entry(name).or_default().push(UploadedFile {
                    file_name,
                    content_type,
                    data,
                });
            } else {
                let text = field.text().await.map_err(|_| Error::Parameter)?;
                form.values.entry(name).or_default().push(text);
            }
        }
        Ok(form)
    }

    /// Store an audit value for surrounding logging middleware
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.store.insert(key.into(), value.into());
    }

    /// Read back an audit value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.store.get(key).map(String::as_str)
    }

    /// Write the JSON response for this request
    ///
    /// The slot is write-once: the first write wins and later attempts are
    /// dropped with a warning. Returns whether the write was accepted.
    pub fn write_json(&mut self, status: StatusCode, body: Value) -> bool {
        if self.response.is_some() {
            tracing::warn!("response already written for this request, dropping extra write");
            return false;
        }
        self.response = Some((status, body));
        true
    }

    /// Stop all further processing of this request
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Whether the request has been aborted
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// The response written so far, if any
    pub fn response(&self) -> Option<(StatusCode, &Value)> {
        self.response.as_ref().map(|(s, v)| (*s, v))
    }
}

impl IntoResponse for RequestContext {
    fn into_response(self) -> Response {
        match self.response {
            Some((status, body)) => (status, axum::Json(body)).into_response(),
            // Context-dispatched handlers may legitimately write nothing
            None => StatusCode::OK.into_response(),
        }
    }
}

/// Builder for [`RequestContext`]
///
/// The axum extractor in [`crate::bootstrap`] goes through this builder too,
/// so manually built contexts behave identically to extracted ones.
#[derive(Default)]
pub struct RequestContextBuilder {
    method: Option<Method>,
    uri: Option<Uri>,
    headers: HeaderMap,
    path_params: Vec<(String, String)>,
    body: Bytes,
    resolvers: Option<Arc<FieldResolvers>>,
}

impl RequestContextBuilder {
    /// Set the request method (defaults to GET)
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the request URI; its query string becomes the query map
    pub fn uri(mut self, uri: Uri) -> Self {
        self.uri = Some(uri);
        self
    }

    /// Replace the full header map
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Add a single header
    pub fn header(mut self, name: http::header::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a matched path segment
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    /// Set the buffered request body
    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Attach the process-wide resolver registry
    pub fn resolvers(mut self, resolvers: Arc<FieldResolvers>) -> Self {
        self.resolvers = Some(resolvers);
        self
    }

    /// Finish the context
    pub fn build(self) -> RequestContext {
        let uri = self.uri.unwrap_or_default();
        let query = uri
            .query()
            .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
            .unwrap_or_default();
        RequestContext {
            method: self.method.unwrap_or(Method::GET),
            uri,
            headers: self.headers,
            query,
            path_params: self.path_params,
            body: self.body,
            resolvers: self.resolvers.unwrap_or_default(),
            store: HashMap::new(),
            response: None,
            aborted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(uri: &str) -> RequestContext {
        RequestContext::builder().uri(uri.parse().unwrap()).build()
    }

    #[test]
    fn query_lookup_is_presence_aware() {
        let ctx = ctx("/item?id=7&empty=&dup=a&dup=b");
        assert_eq!(ctx.query_value("id"), Some("7"));
        assert_eq!(ctx.query_value("empty"), Some(""));
        assert_eq!(ctx.query_value("dup"), Some("a"));
        assert_eq!(ctx.query_value("missing"), None);
    }

    #[test]
    fn response_slot_is_write_once() {
        let mut ctx = ctx("/");
        assert!(ctx.write_json(StatusCode::OK, serde_json::json!({"code": 200})));
        assert!(!ctx.write_json(StatusCode::OK, serde_json::json!({"code": 500})));
        let (status, body) = ctx.response().unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 200);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long: String = "参".repeat(300);
        let cut = truncate_chars(&long, AUDIT_MAX_CHARS);
        assert_eq!(cut.chars().count(), 255);

        let short = truncate_chars("abc", AUDIT_MAX_CHARS);
        assert_eq!(short, "abc");
    }

    #[tokio::test]
    async fn multipart_decodes_values_and_files() {
        let body = concat!(
            "--XBOUND\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
            "hello\r\n",
            "--XBOUND\r\n",
            "Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "file-bytes\r\n",
            "--XBOUND--\r\n"
        );
        let ctx = RequestContext::builder()
            .header(
                http::header::CONTENT_TYPE,
                "multipart/form-data; boundary=XBOUND".parse().unwrap(),
            )
            .body(Bytes::from_static(body.as_bytes()))
            .build();

        let form = ctx.multipart_form().await.unwrap();
        assert_eq!(form.values["title"], vec!["hello".to_string()]);
        assert_eq!(form.files["doc"].len(), 1);
        assert_eq!(form.files["doc"][0].file_name.as_deref(), Some("a.txt"));
        assert_eq!(&form.files["doc"][0].data[..], b"file-bytes");
    }

    #[tokio::test]
    async fn multipart_without_boundary_is_a_parameter_error() {
        let ctx = ctx("/upload");
        assert!(matches!(
            ctx.multipart_form().await,
            Err(Error::Parameter)
        ));
    }
}

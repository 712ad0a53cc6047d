//! Generic parameter binder and dispatch pipeline
//!
//! [`Binder<T>`] turns untyped wire input into a validated, strongly-typed
//! call against a handler object. One binder exists per request; it owns the
//! [`RequestContext`], extracts raw values from one of four channels (body,
//! query, path, multipart form), populates a fresh parameter instance,
//! consults the field-resolver registry for anything the channel omitted,
//! then runs the shared post-binding pipeline: audit snapshot, validation,
//! polymorphic dispatch, envelope emission.
//!
//! Binding is driven by an explicit per-type descriptor table
//! ([`BindSchema`]) instead of runtime introspection: each descriptor pairs
//! a logical field name with a typed setter, so a mistyped binding is a
//! compile error and no name-mangling heuristics are involved. A requested
//! name with no descriptor is silently skipped on every channel.

use serde::de::DeserializeOwned;
use validator::Validate;

use crate::context::{
    truncate_chars, RequestContext, UploadedFile, AUDIT_MAX_CHARS, REQUEST_PARAMS,
};
use crate::error::{Error, Result};
use crate::handler::Handler;
use crate::response;

/// Declared kind of a bindable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Any signed integer width; bound through `i64`
    Integer,
    /// Either floating-point precision; bound through `f64`
    Float,
    /// UTF-8 text
    Text,
    /// Uploaded file list (form channel only)
    Files,
}

enum Setter<T> {
    Integer(fn(&mut T, i64)),
    Float(fn(&mut T, f64)),
    Text(fn(&mut T, String)),
    Files(fn(&mut T, Vec<UploadedFile>)),
}

/// One entry of a parameter type's binding table
///
/// `is_unset` is the emptiness probe the body channel uses to decide whether
/// resolver fallback applies after deserialization.
pub struct FieldDescriptor<T> {
    name: &'static str,
    setter: Setter<T>,
    is_unset: fn(&T) -> bool,
}

impl<T> FieldDescriptor<T> {
    /// Descriptor for a signed integer field
    pub const fn integer(name: &'static str, set: fn(&mut T, i64), is_unset: fn(&T) -> bool) -> Self {
        Self {
            name,
            setter: Setter::Integer(set),
            is_unset,
        }
    }

    /// Descriptor for a floating-point field
    pub const fn float(name: &'static str, set: fn(&mut T, f64), is_unset: fn(&T) -> bool) -> Self {
        Self {
            name,
            setter: Setter::Float(set),
            is_unset,
        }
    }

    /// Descriptor for a text field
    pub const fn text(
        name: &'static str,
        set: fn(&mut T, String),
        is_unset: fn(&T) -> bool,
    ) -> Self {
        Self {
            name,
            setter: Setter::Text(set),
            is_unset,
        }
    }

    /// Descriptor for an uploaded-file-list field
    pub const fn files(
        name: &'static str,
        set: fn(&mut T, Vec<UploadedFile>),
        is_unset: fn(&T) -> bool,
    ) -> Self {
        Self {
            name,
            setter: Setter::Files(set),
            is_unset,
        }
    }

    /// Logical field name, as supplied by callers and resolvers
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared kind
    pub fn kind(&self) -> FieldKind {
        match self.setter {
            Setter::Integer(_) => FieldKind::Integer,
            Setter::Float(_) => FieldKind::Float,
            Setter::Text(_) => FieldKind::Text,
            Setter::Files(_) => FieldKind::Files,
        }
    }

    /// Convert raw text to the declared kind and store it
    ///
    /// Unparseable numeric text is a [`Error::Parameter`]. File-list fields
    /// cannot be fed from text at all, so that is a [`Error::Parameter`] too;
    /// only the form channel can carry files.
    fn apply_text(&self, target: &mut T, raw: &str) -> Result<()> {
        match self.setter {
            Setter::Integer(set) => {
                set(target, raw.trim().parse::<i64>().map_err(|_| Error::Parameter)?)
            }
            Setter::Float(set) => {
                set(target, raw.trim().parse::<f64>().map_err(|_| Error::Parameter)?)
            }
            Setter::Text(set) => set(target, raw.to_string()),
            Setter::Files(_) => return Err(Error::Parameter),
        }
        Ok(())
    }

    /// Store an uploaded file list; scalar fields reject it
    fn apply_files(&self, target: &mut T, files: Vec<UploadedFile>) -> Result<()> {
        match self.setter {
            Setter::Files(set) => {
                set(target, files);
                Ok(())
            }
            _ => Err(Error::BindingType),
        }
    }
}

impl<T> std::fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Compile-time binding table of a parameter type
pub trait BindSchema: Sized {
    /// All bindable fields of this type
    fn fields() -> &'static [FieldDescriptor<Self>];

    /// The descriptor for a logical field name, if the type declares it
    fn descriptor(name: &str) -> Option<&'static FieldDescriptor<Self>> {
        Self::fields().iter().find(|d| d.name == name)
    }
}

/// Everything a bindable parameter object provides
///
/// Blanket-implemented; endpoint types derive/implement the parts:
/// `Deserialize` + `Default` for the body channel, [`BindSchema`] for the
/// named channels, `Validate` for constraints, [`Handler`] for dispatch.
pub trait BindParams:
    BindSchema
    + Handler
    + Validate
    + Default
    + DeserializeOwned
    + std::fmt::Debug
    + Send
    + Sync
    + 'static
{
}

impl<T> BindParams for T where
    T: BindSchema
        + Handler
        + Validate
        + Default
        + DeserializeOwned
        + std::fmt::Debug
        + Send
        + Sync
        + 'static
{
}

enum NamedSource {
    Query,
    Path,
}

/// Per-request binder for the parameter type `T`
pub struct Binder<T: BindParams> {
    ctx: RequestContext,
    with_context: bool,
    param: T,
}

impl<T: BindParams> Binder<T> {
    /// Take ownership of the request context and start with a fresh `T`
    pub fn new(ctx: RequestContext) -> Self {
        Self {
            ctx,
            with_context: false,
            param: T::default(),
        }
    }

    /// Dispatch through `context_exec` instead of `exec`
    pub fn with_context(mut self) -> Self {
        self.with_context = true;
        self
    }

    /// Bind from the JSON request body
    ///
    /// The payload is deserialized directly onto the parameter instance
    /// (serde field mapping; no descriptor lookup for fields the payload
    /// carries). Afterwards, each explicitly requested field that is still
    /// unset gets one resolver-fallback attempt. Fields already populated by
    /// the payload are never overwritten by a resolver.
    pub async fn body(mut self, fields: &[&str]) -> RequestContext {
        if self.ctx.raw_body().is_empty() {
            response::param_error(&mut self.ctx);
            return self.ctx;
        }
        self.param = match serde_json::from_slice(self.ctx.raw_body()) {
            Ok(param) => param,
            Err(_) => {
                response::param_error(&mut self.ctx);
                return self.ctx;
            }
        };
        for &name in fields {
            let Some(desc) = T::descriptor(name) else {
                continue;
            };
            if (desc.is_unset)(&self.param) {
                if let Err(e) = self.apply_resolver(desc) {
                    response::error(&mut self.ctx, &e, None);
                    return self.ctx;
                }
            }
        }
        self.finish().await
    }

    /// Bind the requested fields from the query string
    pub async fn query(self, fields: &[&str]) -> RequestContext {
        self.bind_named(fields, NamedSource::Query).await
    }

    /// Bind the requested fields from matched URL path segments
    pub async fn path(self, fields: &[&str]) -> RequestContext {
        self.bind_named(fields, NamedSource::Path).await
    }

    /// Bind the requested fields from a multipart form
    ///
    /// Per field: a non-empty uploaded file list wins, then form values
    /// (with scalar conversion), then resolver fallback.
    pub async fn form(mut self, fields: &[&str]) -> RequestContext {
        let form = match self.ctx.multipart_form().await {
            Ok(form) => form,
            Err(_) => {
                response::param_error(&mut self.ctx);
                return self.ctx;
            }
        };
        for &name in fields {
            let Some(desc) = T::descriptor(name) else {
                continue;
            };
            let bound = if let Some(files) = form.files.get(name).filter(|f| !f.is_empty()) {
                desc.apply_files(&mut self.param, files.clone())
            } else if let Some(value) = form
                .values
                .get(name)
                .and_then(|v| v.first())
                .filter(|v| !v.is_empty())
            {
                desc.apply_text(&mut self.param, value)
            } else {
                self.apply_resolver(desc)
            };
            if let Err(e) = bound {
                response::error(&mut self.ctx, &e, None);
                return self.ctx;
            }
        }
        self.finish().await
    }

    async fn bind_named(mut self, fields: &[&str], source: NamedSource) -> RequestContext {
        for &name in fields {
            let Some(desc) = T::descriptor(name) else {
                continue;
            };
            // Empty string counts as absent on every channel
            let raw = match source {
                NamedSource::Query => self.ctx.query_value(name),
                NamedSource::Path => self.ctx.path_param(name),
            }
            .filter(|v| !v.is_empty())
            .map(str::to_string);

            let bound = match raw {
                Some(value) => desc.apply_text(&mut self.param, &value),
                None => self.apply_resolver(desc),
            };
            if let Err(e) = bound {
                response::error(&mut self.ctx, &e, None);
                return self.ctx;
            }
        }
        self.finish().await
    }

    /// Last-resort fallback: consult the resolver registry for this field
    ///
    /// No registered resolver means the field stays at its zero value. A
    /// resolver's error is propagated unmodified.
    fn apply_resolver(&mut self, desc: &FieldDescriptor<T>) -> Result<()> {
        let Some(resolver) = self.ctx.resolvers().get(desc.name()) else {
            return Ok(());
        };
        let value = resolver(&self.ctx)?;
        desc.apply_text(&mut self.param, &value)
    }

    /// Shared post-binding pipeline: audit snapshot, validate, dispatch
    async fn finish(mut self) -> RequestContext {
        let snapshot = truncate_chars(&format!("{:?}", self.param), AUDIT_MAX_CHARS);
        self.ctx.set(REQUEST_PARAMS, snapshot);

        if let Err(e) = crate::validate::validate(&self.param) {
            response::error(&mut self.ctx, &e, None);
            return self.ctx;
        }

        if self.with_context {
            if let Err(e) = self.param.context_exec(&mut self.ctx).await {
                response::error(&mut self.ctx, &e, None);
            }
        } else {
            match self.param.exec().await {
                Ok(reply) => response::success(&mut self.ctx, reply),
                Err(e) => response::error(&mut self.ctx, &e, None),
            }
        }
        self.ctx
    }
}

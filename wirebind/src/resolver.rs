//! Named fallback resolvers for fields the primary channel cannot supply
//!
//! A field resolver derives a field's value from the request context when
//! the channel being bound yields nothing for that field's logical name.
//! The canonical example is pulling a user id out of an auth-token header.
//!
//! The registry is populated through [`crate::bootstrap::AppBuilder`] before
//! the server starts and is frozen behind an `Arc` for the lifetime of the
//! process; nothing mutates it while requests are being served.

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::Result;

/// A fallback extraction function keyed by logical field name
pub type FieldResolver = Arc<dyn Fn(&RequestContext) -> Result<String> + Send + Sync>;

/// Registry of field resolvers
#[derive(Default)]
pub struct FieldResolvers {
    entries: HashMap<String, FieldResolver>,
}

impl FieldResolvers {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the resolver for `name`
    pub fn register<F>(&mut self, name: impl Into<String>, resolver: F)
    where
        F: Fn(&RequestContext) -> Result<String> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(resolver));
    }

    /// Look up the resolver registered for `name`
    pub fn get(&self, name: &str) -> Option<FieldResolver> {
        self.entries.get(name).cloned()
    }

    /// Invoke the resolver for `name`, propagating its error unmodified
    ///
    /// Returns `None` when no resolver is registered: the binder then leaves
    /// the field at its zero value. This is a last-resort fallback path, not
    /// a default-value mechanism.
    pub fn resolve(&self, name: &str, ctx: &RequestContext) -> Option<Result<String>> {
        self.entries.get(name).map(|f| f(ctx))
    }

    /// Number of registered resolvers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for FieldResolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldResolvers")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

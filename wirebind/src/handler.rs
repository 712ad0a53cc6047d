//! The capability contract implemented by business parameter objects
//!
//! Dispatch is purely polymorphic: after binding and validation the binder
//! holds the parameter object as `&impl Handler` and invokes one of the two
//! methods depending on its context flag. Both default to
//! [`Error::NotImplemented`], so a concrete type only overrides the one it
//! serves.

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::response::Reply;

/// Business execution contract
#[async_trait]
pub trait Handler: Send + Sync {
    /// Execute without access to the request context
    ///
    /// On success the binder wraps the returned [`Reply`] into a success
    /// envelope.
    async fn exec(&self) -> Result<Reply> {
        Err(Error::NotImplemented)
    }

    /// Execute with full access to the request context
    ///
    /// A successful context handler is responsible for writing its own
    /// response through the context; the binder does not emit a success
    /// envelope on this path.
    async fn context_exec(&self, ctx: &mut RequestContext) -> Result<Reply> {
        let _ = ctx;
        Err(Error::NotImplemented)
    }
}

//! Error types shared across the binding pipeline

use thiserror::Error;

/// Result type alias using the framework error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the binding and dispatch pipeline
///
/// Every variant is terminal for the current request: nothing in this layer
/// retries. All of them surface through [`crate::response::error`] as a JSON
/// envelope with a default application code of 500.
///
/// The fixed messages for `Parameter`, `BindingType` and `NotImplemented`
/// are operator-facing Chinese text matching the validator translations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed, missing or empty raw input (bad JSON body, non-numeric
    /// text for a numeric field, invalid multipart payload)
    #[error("参数错误")]
    Parameter,

    /// One or more declared constraints violated; carries the aggregated
    /// localized message produced by [`crate::validate::validate`]
    #[error("{0}")]
    Validation(String),

    /// A field resolver itself failed (e.g. a required header was missing)
    #[error("{0}")]
    Resolution(String),

    /// Business logic returned an error from `exec`/`context_exec`
    #[error("{0}")]
    Handler(String),

    /// A raw value of one shape was offered to a field declared as another
    /// (e.g. an uploaded file for a scalar field)
    #[error("传参与结构体不一致")]
    BindingType,

    /// Neither `exec` nor `context_exec` was overridden on the handler
    #[error("接口未实现")]
    NotImplemented,

    /// The request was canceled while its body was being read
    #[error("请求已取消: {0}")]
    Canceled(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal framework error (serialization of an envelope, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a resolver failure
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Shorthand for a business-logic failure
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_messages_are_localized() {
        assert_eq!(Error::Parameter.to_string(), "参数错误");
        assert_eq!(Error::BindingType.to_string(), "传参与结构体不一致");
        assert_eq!(Error::NotImplemented.to_string(), "接口未实现");
    }

    #[test]
    fn resolution_error_keeps_message_verbatim() {
        let err = Error::resolution("header token is missing");
        assert_eq!(err.to_string(), "header token is missing");
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort an invocation.
///
/// None of these are retried: one process run performs at most one remote
/// call, and the first failure ends it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("no service named `{0}` in the loaded schemas")]
    ServiceNotFound(String),

    #[error("couldn't find method named `{method}` in service `{service}`")]
    MethodNotFound { service: String, method: String },

    #[error("parameter `{name}` has type `{ty}`, which cannot be built interactively")]
    UnsupportedType { name: String, ty: String },

    #[error("cannot decode `{text}` as `{schema}`: {reason}")]
    Decode {
        schema: String,
        text: String,
        reason: String,
    },

    #[error("`{text}` is not a symbol of enum `{enum_name}`")]
    UnknownSymbol { enum_name: String, text: String },

    #[error("parameter `{0}` is required but no value was entered")]
    MissingArgument(String),

    #[error("remote call {service}.{method} failed: {message}")]
    RemoteCall {
        service: String,
        method: String,
        message: String,
    },

    #[error("invalid schema: {0}")]
    Schema(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn decode(schema: &str, text: &str, reason: impl Into<String>) -> Self {
        Error::Decode {
            schema: schema.to_string(),
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias that carries the custom [`TypewriterError`] type.
pub type Result<T> = std::result::Result<T, TypewriterError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum TypewriterError {
    /// The target container could not be resolved while constructing a
    /// session. Fatal: no session is created.
    #[error("could not find container element `{0}`")]
    Configuration(String),
    /// A builder method received a value it cannot enqueue (zero amount,
    /// zero speed, empty cursor). Raised before anything is queued.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// A `CallFunction` callback reported failure during a tick.
    #[error("callback failed: {0}")]
    Callback(String),
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or script files that fail to parse.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl TypewriterError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a callback failure from anything printable.
    pub fn callback<T: std::fmt::Display>(reason: T) -> Self {
        Self::Callback(reason.to_string())
    }
}

impl From<&str> for TypewriterError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for TypewriterError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

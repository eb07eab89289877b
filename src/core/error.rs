//! Error types for the logging pipeline

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Unrecognized log level token
    #[error("Invalid log level: '{0}'")]
    InvalidLevel(String),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// A configuration is already installed and `reset` was not requested
    #[error("Logging is already configured; set `reset` to replace the configuration")]
    AlreadyConfigured,

    /// Synchronous teardown of something that can only be disposed asynchronously
    #[error("'{name}' can only be disposed asynchronously; use the async configuration API")]
    AsyncDisposalRequired { name: String },

    /// Another configuration change, or its disposal, has not completed yet
    #[error("Previous configuration is still being disposed or installed")]
    DisposalPending,

    /// Sink reported a failure while handling a record
    #[error("Sink '{sink}' failed: {message}")]
    Sink { sink: String, message: String },

    /// Disposer failure
    #[error("Failed to dispose '{name}': {message}")]
    Disposal { name: String, message: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an invalid level error
    pub fn invalid_level(token: impl Into<String>) -> Self {
        LoggerError::InvalidLevel(token.into())
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a sink failure
    pub fn sink(sink: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Sink {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create a disposal failure
    pub fn disposal(name: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Disposal {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }
}

use thiserror::Error;

/// Registry error codes the engine recognizes well enough to record a
/// sensible cause in the failure journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryErrorCode {
    Unauthorized,
    Denied,
    ManifestUnknown,
    BlobUnknown,
    NameUnknown,
    TooManyRequests,
    Unknown,
}

impl RegistryErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryErrorCode::Unauthorized => "unauthorized",
            RegistryErrorCode::Denied => "denied",
            RegistryErrorCode::ManifestUnknown => "manifest unknown",
            RegistryErrorCode::BlobUnknown => "blob unknown",
            RegistryErrorCode::NameUnknown => "name unknown",
            RegistryErrorCode::TooManyRequests => "too many requests",
            RegistryErrorCode::Unknown => "unknown",
        }
    }

    /// Whether a retry can reasonably succeed without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RegistryErrorCode::TooManyRequests | RegistryErrorCode::Unknown
        )
    }
}

impl std::fmt::Display for RegistryErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Airlift error types
#[derive(Error, Debug)]
pub enum MirrorError {
    /// The registry rejected or failed an operation
    #[error("registry error ({code}): {message}")]
    Registry {
        code: RegistryErrorCode,
        message: String,
    },

    /// Image reference could not be understood
    #[error("invalid image reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The update graph image could not be located
    #[error("update graph image unavailable: {0}")]
    GraphImage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl MirrorError {
    /// The registry error code, when one applies.
    pub fn registry_code(&self) -> Option<RegistryErrorCode> {
        match self {
            MirrorError::Registry { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(err: serde_json::Error) -> Self {
        MirrorError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for MirrorError {
    fn from(err: serde_yaml::Error) -> Self {
        MirrorError::Serialization(err.to_string())
    }
}

/// Result type alias for airlift operations
pub type Result<T> = std::result::Result<T, MirrorError>;

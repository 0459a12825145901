//! Error types for docchat

use thiserror::Error;

/// Result type alias using DocChatError
pub type Result<T> = std::result::Result<T, DocChatError>;

/// Error type alias for convenience
pub type Error = DocChatError;

/// Exit codes for CLI front-ends
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_INPUT: i32 = 2;
    pub const UPSTREAM_UNAVAILABLE: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 5;
}

/// Pipeline stage a failure originated from.
///
/// Attached to upstream errors so callers can tell which leg of an
/// operation failed without parsing message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embed,
    Upsert,
    Store,
    Llm,
    Cache,
    Chunk,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Embed => "embed",
            Stage::Upsert => "upsert",
            Stage::Store => "store",
            Stage::Llm => "llm",
            Stage::Cache => "cache",
            Stage::Chunk => "chunk",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for docchat
#[derive(Debug, Error)]
pub enum DocChatError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Ingestion already in progress for: {0}")]
    AlreadyIngesting(String),

    #[error("Upstream service unavailable at stage {stage}: {message}")]
    Upstream { stage: Stage, message: String },

    #[error("LLM call exceeded wall-clock timeout of {timeout_secs}s")]
    LlmTimeout { timeout_secs: u64 },

    #[error("Operation canceled")]
    Canceled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocChatError {
    /// Construct an upstream error tagged with its failing stage.
    pub fn upstream(stage: Stage, message: impl Into<String>) -> Self {
        Self::Upstream {
            stage,
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidQuery(_) | Self::Config(_) => exit_codes::INVALID_INPUT,
            Self::NotFound(_) => exit_codes::NOT_FOUND,
            Self::AlreadyExists(_) | Self::AlreadyIngesting(_) => exit_codes::CONFLICT,
            Self::Upstream { .. } | Self::LlmTimeout { .. } | Self::Http(_) => {
                exit_codes::UPSTREAM_UNAVAILABLE
            }
            _ => exit_codes::GENERAL_ERROR,
        }
    }

    /// HTTP status a transport layer should map this error to
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidQuery(_) | Self::Config(_) => 400,
            Self::NotFound(_) => 404,
            Self::AlreadyExists(_) | Self::AlreadyIngesting(_) => 409,
            Self::Upstream { .. } | Self::Http(_) => 503,
            Self::LlmTimeout { .. } => 504,
            Self::Canceled => 499,
            _ => 500,
        }
    }

    /// Whether a retry inside a client wrapper may succeed.
    ///
    /// Only transport-level transients qualify; classified errors have
    /// already been through the retry loop.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Upstream { .. } => true,
            _ => false,
        }
    }
}

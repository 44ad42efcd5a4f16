//! Unified error handling for the VaultCore client and CLI
//!
//! This module provides:
//! - Unique error codes for debugging and documentation
//! - Structured error information with context
//! - Convenient constructor methods
//! - Automatic conversions from common error types

use std::fmt;
use thiserror::Error;

/// Unified Result type for all VaultCore operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Error codes for VaultCore operations
///
/// Each error has a unique code in the format `VXXX` where:
/// - V1XX: Authentication and session errors
/// - V2XX: Network and API errors
/// - V3XX: File and I/O errors
/// - V4XX: Configuration errors
/// - V5XX: Validation and input errors
/// - V9XX: Internal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication (V1XX)
    /// V101: Session expired, refresh impossible or rejected
    SessionExpired,
    /// V102: Authentication failed (code exchange, malformed login response)
    AuthenticationFailed,

    // Network (V2XX)
    /// V201: HTTP request failed
    HttpError,
    /// V202: Connection timeout
    ConnectionTimeout,
    /// V203: Connection refused
    ConnectionRefused,
    /// V205: API returned error response
    ApiError,
    /// V206: Invalid API response format (markup instead of JSON)
    InvalidResponse,

    // File/IO (V3XX)
    /// V301: File read error
    FileReadError,
    /// V302: File write error
    FileWriteError,

    // Configuration (V4XX)
    /// V401: Configuration error
    ConfigError,
    /// V402: Invalid endpoint URL
    InvalidEndpoint,

    // Validation (V5XX)
    /// V501: Invalid input
    InvalidInput,

    // Internal (V9XX)
    /// V901: Internal error
    InternalError,
    /// V902: Serialization error
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u16 {
        match self {
            ErrorCode::SessionExpired => 101,
            ErrorCode::AuthenticationFailed => 102,

            ErrorCode::HttpError => 201,
            ErrorCode::ConnectionTimeout => 202,
            ErrorCode::ConnectionRefused => 203,
            ErrorCode::ApiError => 205,
            ErrorCode::InvalidResponse => 206,

            ErrorCode::FileReadError => 301,
            ErrorCode::FileWriteError => 302,

            ErrorCode::ConfigError => 401,
            ErrorCode::InvalidEndpoint => 402,

            ErrorCode::InvalidInput => 501,

            ErrorCode::InternalError => 901,
            ErrorCode::SerializationError => 902,
        }
    }

    /// Get the string code (e.g., "V101")
    pub fn as_str(&self) -> String {
        format!("V{}", self.code())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.code())
    }
}

/// Main error type for all VaultCore operations
#[derive(Error, Debug)]
pub enum VaultError {
    // ==================== Authentication Errors (V1XX) ====================
    /// Authentication or session failure
    #[error("[{code}] {message}")]
    Authentication {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ==================== Network Errors (V2XX) ====================
    /// HTTP/Network error
    #[error("[{code}] Network error: {message}")]
    Network {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// API error with status code
    #[error("[{code}] API error ({status}): {message}")]
    Api {
        code: ErrorCode,
        status: u16,
        message: String,
    },

    // ==================== File/IO Errors (V3XX) ====================
    /// File or IO error
    #[error("[{code}] {context}: {message}")]
    Io {
        code: ErrorCode,
        context: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // ==================== Configuration Errors (V4XX) ====================
    /// Configuration error
    #[error("[{code}] Configuration error: {message}")]
    Config {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<config::ConfigError>,
    },

    // ==================== Validation Errors (V5XX) ====================
    /// Invalid input error
    #[error("[{code}] Invalid input: {message}")]
    InvalidInput { code: ErrorCode, message: String },

    // ==================== Internal Errors (V9XX) ====================
    /// Internal/Unexpected error
    #[error("[{code}] Internal error: {message}")]
    Internal { code: ErrorCode, message: String },

    /// JSON serialization error
    #[error("[{code}] Serialization error: {message}")]
    Serialization {
        code: ErrorCode,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Timeout error
    #[error("[V202] Operation timed out")]
    Timeout,
}

// ==================== Constructor Methods ====================

impl VaultError {
    // --- Authentication ---

    /// Terminal session failure: refresh impossible, or still unauthorized
    /// after a refresh. The session has been cleared when this is returned.
    pub fn session_expired() -> Self {
        Self::Authentication {
            code: ErrorCode::SessionExpired,
            message: "Unauthorized: session expired".to_string(),
            source: None,
        }
    }

    /// Create authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::AuthenticationFailed,
            message: message.into(),
            source: None,
        }
    }

    /// Create authentication error with source
    pub fn authentication_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Authentication {
            code: ErrorCode::AuthenticationFailed,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    // --- Network ---

    /// Create network error from reqwest error
    pub fn network_from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }

        let code = if err.is_connect() {
            ErrorCode::ConnectionRefused
        } else {
            ErrorCode::HttpError
        };

        Self::Network {
            code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create API error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::ApiError,
            status,
            message: message.into(),
        }
    }

    /// Success status but the body is markup, which means the request reached
    /// something other than the API (an HTML error page, a dev server).
    pub fn invalid_response(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code: ErrorCode::InvalidResponse,
            status,
            message: message.into(),
        }
    }

    // --- File/IO ---

    /// Failure reading a file
    pub fn file_read(context: impl Into<String>, err: std::io::Error) -> Self {
        Self::io(ErrorCode::FileReadError, context, err)
    }

    /// Failure creating, writing or changing the permissions of a file
    pub fn file_write(context: impl Into<String>, err: std::io::Error) -> Self {
        Self::io(ErrorCode::FileWriteError, context, err)
    }

    fn io(code: ErrorCode, context: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            code,
            context: context.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    // --- Configuration ---

    /// Create configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration error with source
    pub fn config_from_error(err: config::ConfigError) -> Self {
        Self::Config {
            code: ErrorCode::ConfigError,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create invalid endpoint error
    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::InvalidEndpoint,
            message: message.into(),
            source: None,
        }
    }

    // --- Validation ---

    /// Create invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code: ErrorCode::InvalidInput,
            message: message.into(),
        }
    }

    // --- Internal ---

    /// Create internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: ErrorCode::InternalError,
            message: message.into(),
        }
    }

    // --- Utility Methods ---

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::Api { code, .. } => *code,
            Self::Io { code, .. } => *code,
            Self::Config { code, .. } => *code,
            Self::InvalidInput { code, .. } => *code,
            Self::Internal { code, .. } => *code,
            Self::Serialization { code, .. } => *code,
            Self::Timeout => ErrorCode::ConnectionTimeout,
        }
    }

    /// Check if this error ended the session
    pub fn is_session_expired(&self) -> bool {
        self.code() == ErrorCode::SessionExpired
    }
}

// ==================== From Implementations ====================

impl From<reqwest::Error> for VaultError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_from_reqwest(err)
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            code: ErrorCode::SerializationError,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<config::ConfigError> for VaultError {
    fn from(err: config::ConfigError) -> Self {
        Self::config_from_error(err)
    }
}

impl From<validator::ValidationErrors> for VaultError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::invalid_input(err.to_string())
    }
}

// Manual Clone implementation that drops non-cloneable sources. A single
// refresh outcome is handed to every caller waiting on it.
impl Clone for VaultError {
    fn clone(&self) -> Self {
        match self {
            Self::Authentication {
                code,
                message,
                source: _,
            } => Self::Authentication {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Network {
                code,
                message,
                source: _,
            } => Self::Network {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Api {
                code,
                status,
                message,
            } => Self::Api {
                code: *code,
                status: *status,
                message: message.clone(),
            },
            Self::Io {
                code,
                context,
                message,
                source: _,
            } => Self::Io {
                code: *code,
                context: context.clone(),
                message: message.clone(),
                source: None,
            },
            Self::Config {
                code,
                message,
                source: _,
            } => Self::Config {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::InvalidInput { code, message } => Self::InvalidInput {
                code: *code,
                message: message.clone(),
            },
            Self::Internal { code, message } => Self::Internal {
                code: *code,
                message: message.clone(),
            },
            Self::Serialization {
                code,
                message,
                source: _,
            } => Self::Serialization {
                code: *code,
                message: message.clone(),
                source: None,
            },
            Self::Timeout => Self::Timeout,
        }
    }
}

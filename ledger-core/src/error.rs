//! Unified error handling system
//!
//! Structured error types with context and proper error chaining. The HTTP
//! layer maps [`ErrorKind`] onto status codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};

pub type LedgerResult<T> = Result<T, LedgerError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error context providing additional information for debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Main error type for the ledger service
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        context: ErrorContext,
    },

    #[error("Authorization error: {message}")]
    Authorization {
        message: String,
        context: ErrorContext,
    },

    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<BoxedSource>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxedSource>,
        context: ErrorContext,
    },

    #[error("Export error: {message}")]
    Export {
        message: String,
        #[source]
        source: Option<BoxedSource>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxedSource>,
        context: ErrorContext,
    },
}

/// Coarse classification used for status mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    Internal,
}

impl LedgerError {
    pub fn validation(message: impl Into<String>, field: &str, component: &str) -> Self {
        LedgerError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
            context: ErrorContext::new(component),
        }
    }

    pub fn authentication(message: impl Into<String>, component: &str) -> Self {
        LedgerError::Authentication {
            message: message.into(),
            context: ErrorContext::new(component),
        }
    }

    pub fn forbidden(message: impl Into<String>, component: &str) -> Self {
        LedgerError::Authorization {
            message: message.into(),
            context: ErrorContext::new(component),
        }
    }

    pub fn conflict(message: impl Into<String>, component: &str) -> Self {
        LedgerError::Conflict {
            message: message.into(),
            context: ErrorContext::new(component),
        }
    }

    pub fn storage<E>(message: impl Into<String>, component: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LedgerError::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(component),
        }
    }

    pub fn export<E>(message: impl Into<String>, component: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LedgerError::Export {
            message: message.into(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(component),
        }
    }

    pub fn internal(message: impl Into<String>, component: &str) -> Self {
        LedgerError::Internal {
            message: message.into(),
            source: None,
            context: ErrorContext::new(component),
        }
    }

    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            LedgerError::Validation { context, .. }
            | LedgerError::Authentication { context, .. }
            | LedgerError::Authorization { context, .. }
            | LedgerError::NotFound { context, .. }
            | LedgerError::Conflict { context, .. }
            | LedgerError::Storage { context, .. }
            | LedgerError::Config { context, .. }
            | LedgerError::Export { context, .. }
            | LedgerError::Internal { context, .. } => Some(context),
            LedgerError::Io(_) | LedgerError::Serialization(_) => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. } => ErrorKind::Validation,
            LedgerError::Authentication { .. } => ErrorKind::Authentication,
            LedgerError::Authorization { .. } => ErrorKind::Authorization,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::Conflict { .. } => ErrorKind::Conflict,
            _ => ErrorKind::Internal,
        }
    }

    /// Client-facing message without the category prefix
    pub fn message(&self) -> String {
        match self {
            LedgerError::Validation { message, .. }
            | LedgerError::Authentication { message, .. }
            | LedgerError::Authorization { message, .. }
            | LedgerError::Conflict { message, .. }
            | LedgerError::Storage { message, .. }
            | LedgerError::Config { message, .. }
            | LedgerError::Export { message, .. }
            | LedgerError::Internal { message, .. } => message.clone(),
            LedgerError::NotFound { resource, .. } => format!("{} not found", resource),
            LedgerError::Io(e) => e.to_string(),
            LedgerError::Serialization(e) => e.to_string(),
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str());
        match self.kind() {
            ErrorKind::Internal => {
                error!(
                    error_id = ?error_id,
                    error = %self,
                    source = ?std::error::Error::source(self).map(|s| s.to_string()),
                    "Internal error occurred"
                );
            }
            ErrorKind::Authentication | ErrorKind::Authorization => {
                warn!(error_id = ?error_id, error = %self, "Access denied");
            }
            _ => {
                tracing::debug!(error_id = ?error_id, error = %self, "Request rejected");
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::error::LedgerError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::error::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! not_found_error {
    ($resource:expr, $component:expr) => {
        $crate::error::LedgerError::NotFound {
            resource: $resource.to_string(),
            context: $crate::error::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::error::LedgerError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::error::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::error::LedgerError::Config {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::error::ErrorContext::new($component),
        }
    };
}

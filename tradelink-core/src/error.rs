//! Unified error handling system
//!
//! Classifies every failure the session core can meet so the request executor
//! knows what to retry and the session manager knows what to recover from

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type TradelinkResult<T> = Result<T, TradelinkError>;

/// Error context providing additional information for debugging and recovery
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
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
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

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the tradelink session core
#[derive(Error, Debug)]
pub enum TradelinkError {
    /// Transport failure with no HTTP status at all
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// 5xx response
    #[error("{message}")]
    Server {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    /// Non-2xx, non-5xx response
    #[error("{message}")]
    Client {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    #[error("Access token expired: {message}")]
    AuthExpired {
        message: String,
        context: ErrorContext,
    },

    #[error("Token refresh failed: {message}")]
    RefreshFailed {
        message: String,
        #[source]
        source: Option<Box<TradelinkError>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Token storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        context: ErrorContext,
    },
}

impl TradelinkError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            TradelinkError::Network { context, .. } => Some(context),
            TradelinkError::Server { context, .. } => Some(context),
            TradelinkError::Client { context, .. } => Some(context),
            TradelinkError::AuthExpired { context, .. } => Some(context),
            TradelinkError::RefreshFailed { context, .. } => Some(context),
            TradelinkError::Config { context, .. } => Some(context),
            TradelinkError::Storage { context, .. } => Some(context),
            TradelinkError::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TradelinkError::Server { status, .. } | TradelinkError::Client { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Transport failures and 5xx responses are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TradelinkError::Network { .. } | TradelinkError::Server { .. }
        )
    }

    /// Whether the backend rejected the bearer credential
    pub fn is_unauthorized(&self) -> bool {
        match self {
            TradelinkError::AuthExpired { .. } => true,
            TradelinkError::Client {
                status, message, ..
            } => *status == 401 || message.contains("Unauthorized"),
            _ => false,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            TradelinkError::Internal { .. } | TradelinkError::Storage { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal or storage error occurred"
                );
            }
            TradelinkError::Config { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration error"
                );
            }
            TradelinkError::Network { .. } | TradelinkError::Server { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Network or server error (may be recoverable)"
                );
            }
            TradelinkError::AuthExpired { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Access token rejected"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::TradelinkError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'tradelink config init' to create a default config"),
        }
    };
}

#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::TradelinkError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::TradelinkError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check that the token file directory is writable"),
        }
    };
}

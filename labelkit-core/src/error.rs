//! Error handling for the labelkit client

use thiserror::Error;

/// Result type alias for labelkit operations
pub type Result<T> = std::result::Result<T, LabelError>;

/// Main error type for labelkit
#[derive(Error, Debug)]
pub enum LabelError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plugin-related errors
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// Event bus errors
    #[error("Event bus error: {0}")]
    EventBus(String),

    /// Template body upload was rejected by the server
    #[error("Save error: {0}")]
    Save(String),

    /// Render/print request was rejected by the server
    #[error("{0}")]
    Trigger(String),

    /// Data output job reported an error or ran out of attempts
    #[error("{0}")]
    Poll(String),

    /// Network-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request exceeded its time budget
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// A newer preview run replaced this one
    #[error("Preview run {0} was superseded")]
    Superseded(u64),

    /// State management errors
    #[error("State error: {0}")]
    State(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("Error: {0}")]
    Generic(String),
}

impl LabelError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new plugin error
    pub fn plugin<S: Into<String>>(msg: S) -> Self {
        Self::Plugin(msg.into())
    }

    /// Create a new event bus error
    pub fn event_bus<S: Into<String>>(msg: S) -> Self {
        Self::EventBus(msg.into())
    }

    /// Create a new save error
    pub fn save<S: Into<String>>(msg: S) -> Self {
        Self::Save(msg.into())
    }

    /// Create a new trigger error
    pub fn trigger<S: Into<String>>(msg: S) -> Self {
        Self::Trigger(msg.into())
    }

    /// Create a new poll error
    pub fn poll<S: Into<String>>(msg: S) -> Self {
        Self::Poll(msg.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a new state error
    pub fn state<S: Into<String>>(msg: S) -> Self {
        Self::State(msg.into())
    }

    /// Create a generic error
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Self::Generic(msg.into())
    }

    /// True when a newer run replaced the one that produced this error
    pub fn is_superseded(&self) -> bool {
        matches!(self, LabelError::Superseded(_))
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        match self {
            LabelError::Config(_) => false,
            LabelError::Plugin(_) => true,
            LabelError::EventBus(_) => true,
            LabelError::Save(_) => true,
            LabelError::Trigger(_) => true,
            LabelError::Poll(_) => true,
            LabelError::Transport(_) => true,
            LabelError::Timeout(_) => true,
            LabelError::Superseded(_) => true,
            LabelError::State(_) => true,
            LabelError::Io(_) => true,
            LabelError::Json(_) => false,
            LabelError::Generic(_) => true,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LabelError::Config(_) => ErrorSeverity::High,
            LabelError::Plugin(_) => ErrorSeverity::Medium,
            LabelError::EventBus(_) => ErrorSeverity::Medium,
            LabelError::Save(_) => ErrorSeverity::Medium,
            LabelError::Trigger(_) => ErrorSeverity::Medium,
            LabelError::Poll(_) => ErrorSeverity::Medium,
            LabelError::Transport(_) => ErrorSeverity::High,
            LabelError::Timeout(_) => ErrorSeverity::Medium,
            LabelError::Superseded(_) => ErrorSeverity::Low,
            LabelError::State(_) => ErrorSeverity::Medium,
            LabelError::Io(_) => ErrorSeverity::Medium,
            LabelError::Json(_) => ErrorSeverity::Low,
            LabelError::Generic(_) => ErrorSeverity::Low,
        }
    }
}

impl From<reqwest::Error> for LabelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LabelError::Timeout(err.to_string())
        } else {
            LabelError::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for LabelError {
    fn from(err: url::ParseError) -> Self {
        LabelError::Config(format!("Invalid URL: {}", err))
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "LOW"),
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_and_poll_messages_are_unprefixed() {
        // These reach the error overlay verbatim
        assert_eq!(LabelError::trigger("Bad template").to_string(), "Bad template");
        assert_eq!(LabelError::poll("Process failed").to_string(), "Process failed");
        assert_eq!(
            LabelError::save("status 400").to_string(),
            "Save error: status 400"
        );
    }

    #[test]
    fn test_superseded_classification() {
        let err = LabelError::Superseded(3);
        assert!(err.is_superseded());
        assert!(err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(!LabelError::config("x").is_recoverable());
    }
}

//! Error types for docsync
//!
//! All errors are `Clone` because a single channel outcome is fanned out to
//! every caller that joined the same pending open or close.

use thiserror::Error;

/// Result type for docsync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Malformed placeholder syntax in a path template or filter value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{` with no closing `}`
    #[error("Unclosed placeholder starting at byte {position} in '{template}'")]
    Unclosed { template: String, position: usize },

    /// A `{` opened inside another placeholder
    #[error("Nested placeholder at byte {position} in '{template}'")]
    Nested { template: String, position: usize },

    /// A `}` with no opening `{`
    #[error("Unmatched '}}' at byte {position} in '{template}'")]
    Unmatched { template: String, position: usize },

    /// `{}` with no identifier
    #[error("Empty placeholder at byte {position} in '{template}'")]
    Empty { template: String, position: usize },

    /// The same identifier used twice in one path template
    #[error("Duplicate placeholder '{name}' in '{template}'")]
    DuplicatePlaceholder { template: String, name: String },
}

/// Failure reported by the subscription backend, or while preparing a subscription
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The backend rejected the subscription
    #[error("Subscribe to '{path}' rejected: {reason}")]
    SubscribeRejected { path: String, reason: String },

    /// The backend rejected the unsubscribe
    #[error("Unsubscribe from '{path}' rejected: {reason}")]
    UnsubscribeRejected { path: String, reason: String },

    /// The path template could not be resolved
    #[error("Cannot resolve channel path: {0}")]
    Template(#[from] TemplateError),
}

/// Operation requested in a lifecycle state that cannot serve it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Module '{module}' has no open channel")]
    NotOpen { module: String },
}

/// Umbrella error for the public API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    State(#[from] StateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_yaml::Error> for SyncError {
    fn from(err: serde_yaml::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Config(err.to_string())
    }
}

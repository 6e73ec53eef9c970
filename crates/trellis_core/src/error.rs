//! Error types for trellis_core

use thiserror::Error;

/// Errors raised by property registration and property writes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropertyError {
    /// Property name was empty
    #[error("property name must not be empty (owner {owner})")]
    InvalidName { owner: &'static str },

    /// `(owner, name)` is already registered
    #[error("property {owner}.{name} is already registered")]
    AlreadyRegistered { owner: &'static str, name: String },

    /// Default value has the wrong type or fails validation
    #[error("default value for {owner}.{name} is invalid: {reason}")]
    InvalidDefault {
        owner: &'static str,
        name: String,
        reason: String,
    },

    /// Value tag does not match the declared type
    #[error("{property} expects {expected}, got {found}")]
    TypeMismatch {
        property: String,
        expected: String,
        found: &'static str,
    },

    /// Validation callback rejected the value
    #[error("value {value} rejected by {property} validation")]
    ValidationFailed { property: String, value: String },

    /// Object handle is stale or belongs to no live object
    #[error("object not found")]
    ObjectNotFound,
}

/// Result type for property operations
pub type Result<T> = std::result::Result<T, PropertyError>;

/// Non-fatal binding failures, recorded on the binding
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    /// A path segment names no property on the object it is applied to
    #[error("cannot resolve '{segment}' in path '{path}' on {object_type}")]
    PathResolutionFailed {
        path: String,
        segment: String,
        object_type: &'static str,
    },

    /// An intermediate segment evaluated to null or a non-object value
    #[error("segment '{segment}' of path '{path}' is null")]
    NullIntermediate { path: String, segment: String },

    /// The source object no longer exists
    #[error("binding source has been removed")]
    SourceMissing,

    /// A template binding target has no templated parent (yet)
    #[error("target has no templated parent")]
    TemplatedParentMissing,

    /// The converter rejected the value
    #[error("conversion failed: {0}")]
    ConversionFailed(String),
}

/// Errors loading a [`TrellisConfig`](crate::config::TrellisConfig)
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

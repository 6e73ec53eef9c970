//! Error types for trellis_visual

use thiserror::Error;
use trellis_core::PropertyError;

/// Errors raised while building or applying a [`Style`](crate::style::Style)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StyleError {
    /// Setters cannot change once the style has been applied or sealed
    #[error("style is sealed")]
    Sealed,

    /// The object (or a based-on style) is not of the style's target type
    #[error("style targets {expected}, not {found}")]
    TargetTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// Result type for style operations
pub type StyleResult<T> = std::result::Result<T, StyleError>;

/// Errors raised while instantiating a template
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// The control is not of the template's target type
    #[error("template targets {expected}, not {found}")]
    TargetTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Property(#[from] PropertyError),

    /// The control or the factory's root is not a live object
    #[error("template object not found")]
    ObjectNotFound,
}

/// Result type for template operations
pub type TemplateResult<T> = std::result::Result<T, TemplateError>;

//! Error types for format conversion

use reportkit_core::ResolutionError;
use reportkit_transform::TransformError;
use reportkit_validate::ValidationFailure;
use thiserror::Error;

/// Errors raised while converting a document
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The template could not be located
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The transformation itself failed
    #[error(transparent)]
    Transform(TransformError),

    /// The converter has neither a bundled template nor an override file
    #[error("no template configured for tool '{0}'")]
    NoTemplate(String),
}

impl From<TransformError> for ConversionError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::Resolution(inner) => ConversionError::Resolution(inner),
            other => ConversionError::Transform(other),
        }
    }
}

/// Errors raised while validating consumed or produced documents
#[derive(Error, Debug)]
pub enum MetricError {
    /// The document or one of its schemas could not be processed
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
}

/// Errors raised while looking up or constructing converters
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("unknown output format '{0}'")]
    UnknownFormat(String),

    /// The tool needs an operator-supplied template
    #[error("tool '{0}' requires a template file")]
    MissingTemplate(String),

    /// The context carries settings the tool cannot use
    #[error("invalid configuration for tool '{tool}': {message}")]
    InvalidContext {
        /// Tool key
        tool: String,
        /// What is wrong
        message: String,
    },
}

/// Errors raised by a conversion job
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Validation(#[from] MetricError),
}

/// Result type for conversions
pub type Result<T, E = ConversionError> = std::result::Result<T, E>;

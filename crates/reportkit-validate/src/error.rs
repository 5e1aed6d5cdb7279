//! Error types for schema validation

use reportkit_core::{ResolutionError, XmlError};
use thiserror::Error;

/// Physical failures of a validation run
///
/// Structural violations of the document are not errors; they are returned
/// in a [`ValidationReport`](reportkit_core::ValidationReport).
#[derive(Error, Debug)]
pub enum ValidationFailure {
    /// A schema could not be located or read
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The document being validated is not well-formed XML
    #[error("cannot parse document {document}: {source}")]
    Document {
        /// Path or label of the document
        document: String,
        /// Underlying parse error
        #[source]
        source: XmlError,
    },

    /// A schema is not well-formed XML
    #[error("cannot parse schema {id}: {source}")]
    SchemaSyntax {
        /// Identity of the schema
        id: String,
        /// Underlying parse error
        #[source]
        source: XmlError,
    },

    /// A schema is well-formed but not a usable schema
    #[error("invalid schema {id}: {message}")]
    Schema {
        /// Identity of the schema
        id: String,
        /// What is wrong with it
        message: String,
    },
}

/// Result type for validation operations
pub type Result<T> = std::result::Result<T, ValidationFailure>;

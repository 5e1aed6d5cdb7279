//! Error types for stylesheet transformation

use std::path::PathBuf;

use reportkit_core::{ResolutionError, XmlError};
use thiserror::Error;

/// Errors raised while compiling or applying a stylesheet
#[derive(Error, Debug)]
pub enum TransformError {
    /// The stylesheet could not be located or read
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The input document is not well-formed XML
    #[error("cannot parse input {document}: {source}")]
    Input {
        /// Path or label of the input
        document: String,
        /// Underlying parse error
        #[source]
        source: XmlError,
    },

    /// The stylesheet is not well-formed XML
    #[error("cannot parse stylesheet {id}: {source}")]
    StylesheetSyntax {
        /// Identity of the stylesheet
        id: String,
        /// Underlying parse error
        #[source]
        source: XmlError,
    },

    /// The stylesheet uses an unsupported or malformed construct
    #[error("invalid stylesheet {id}: {message}")]
    Stylesheet {
        /// Identity of the stylesheet
        id: String,
        /// What is wrong with it
        message: String,
    },

    /// Evaluation failed while the stylesheet was running
    #[error("transformation failed: {0}")]
    Runtime(String),

    /// `xsl:message terminate="yes"` stopped the transformation
    #[error("transformation terminated by stylesheet: {0}")]
    Terminated(String),

    /// The output could not be written
    #[error("cannot write output {path}: {source}")]
    Output {
        /// Destination path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for transformation operations
pub type Result<T> = std::result::Result<T, TransformError>;

//! Error types shared by the reportkit crates

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 1-indexed line/column position in a source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, in characters)
    pub column: usize,
}

impl Position {
    /// Create a new position
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Errors raised while reading an XML document
///
/// These are physical failures: the document could not be read or is not
/// well-formed enough to be processed at all.
#[derive(Error, Debug)]
pub enum XmlError {
    /// The document is not well-formed
    #[error("XML syntax error at {position}: {message}")]
    Syntax {
        /// What went wrong
        message: String,
        /// Where it went wrong
        position: Position,
    },

    /// The document contains no root element
    #[error("XML document has no root element")]
    NoRootElement,

    /// The document could not be read from disk
    #[error("cannot read XML document {path}: {source}")]
    Io {
        /// Path of the document
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

impl XmlError {
    pub(crate) fn syntax(message: impl Into<String>, position: Position) -> Self {
        XmlError::Syntax {
            message: message.into(),
            position,
        }
    }
}

/// Errors raised while resolving a schema or template to its bytes
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// A named resource does not exist in the bundle
    #[error("resource '{name}' not found in bundle '{namespace}'")]
    NotFound {
        /// Namespace of the bundle that was searched
        namespace: String,
        /// Requested resource name
        name: String,
    },

    /// An override file could not be opened or read
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The resource was found but its bytes do not decode as text
    #[error("resource '{id}' is not valid text in its declared encoding")]
    Encoding {
        /// Identity of the resource
        id: String,
    },
}

/// Result type for XML operations
pub type Result<T> = std::result::Result<T, XmlError>;

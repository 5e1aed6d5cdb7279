//! reportkit-core - shared model for test-report conversion
//!
//! This crate holds the pieces every other reportkit crate builds on:
//!
//! - [`xml`]: an arena-backed XML document with positions, and a result-tree
//!   writer
//! - [`resource`]: bundles that resolve template and schema names to bytes
//! - [`locator`]: where a schema or template comes from
//! - [`format`]: output format descriptors
//! - [`params`]: conversion parameters
//! - [`diagnostics`]: validation errors and reports
//!
//! # Example
//!
//! ```
//! use reportkit_core::XmlDocument;
//!
//! let doc = XmlDocument::parse("<testsuite name=\"math\"><testcase name=\"add\"/></testsuite>")?;
//! let root = doc.document_element().unwrap();
//! assert_eq!(doc.attribute(root, "name"), Some("math"));
//! # Ok::<(), reportkit_core::XmlError>(())
//! ```

pub mod diagnostics;
pub mod error;
pub mod format;
pub mod locator;
pub mod params;
pub mod resource;
pub mod xml;

pub use diagnostics::{Location, ValidationError, ValidationReport, ViolationKind};
pub use error::{Position, ResolutionError, Result, XmlError};
pub use format::{FormatDescriptor, FormatDescriptorBuilder};
pub use locator::{LoadedResource, SchemaLocator, TemplateLocator};
pub use params::{ConversionParameters, ParamError, ParamValue};
pub use resource::{DirectoryBundle, EmbeddedBundle, ResourceBundle};
pub use xml::{NodeId, NodeKind, OutputElement, OutputNode, QName, XmlDocument, XmlWriter};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

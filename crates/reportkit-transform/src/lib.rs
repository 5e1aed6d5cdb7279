//! reportkit-transform - stylesheet transformation service
//!
//! Applies XSLT 1.0 stylesheets (a subset sufficient for report
//! conversion) to XML documents.
//!
//! # Example
//!
//! ```
//! use reportkit_core::ConversionParameters;
//! use reportkit_transform::Stylesheet;
//!
//! let sheet = Stylesheet::compile(
//!     "inline",
//!     r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
//!          <xsl:output omit-xml-declaration="yes"/>
//!          <xsl:template match="/run">
//!            <testsuite tests="{count(test)}"/>
//!          </xsl:template>
//!        </xsl:stylesheet>"#,
//! )?;
//! let out = sheet.apply_str("<run><test/><test/></run>", &ConversionParameters::new())?;
//! assert_eq!(out, r#"<testsuite tests="2"/>"#);
//! # Ok::<(), reportkit_transform::TransformError>(())
//! ```

mod engine;
pub mod error;
pub mod stylesheet;
mod xpath;

use std::io::Write;
use std::path::Path;

use reportkit_core::{ConversionParameters, ResourceBundle, TemplateLocator, XmlDocument};
use tempfile::NamedTempFile;
use tracing::info;

pub use error::{Result, TransformError};
pub use stylesheet::{Stylesheet, XSL_NAMESPACE};
pub use xpath::ExprError;

/// Applies templates to documents
pub trait TransformationService: Send + Sync {
    /// Transform the document at `input` into `output`
    ///
    /// On success the output file is complete. On failure nothing is left at
    /// `output`; an existing file there is untouched.
    fn transform(
        &self,
        bundle: &dyn ResourceBundle,
        template: &TemplateLocator,
        input: &Path,
        output: &Path,
        params: &ConversionParameters,
    ) -> Result<()>;
}

/// Transformation service for the supported XSLT subset
#[derive(Debug, Default, Clone, Copy)]
pub struct XsltTransformationService;

impl XsltTransformationService {
    /// Create a service
    pub fn new() -> Self {
        Self
    }

    /// Resolve and compile a template
    pub fn load(&self, bundle: &dyn ResourceBundle, template: &TemplateLocator) -> Result<Stylesheet> {
        let resource = template.resolve(bundle)?;
        Stylesheet::from_resource(&resource)
    }

    /// Transform in-memory document text, returning the serialized result
    pub fn transform_str(
        &self,
        bundle: &dyn ResourceBundle,
        template: &TemplateLocator,
        input: &str,
        params: &ConversionParameters,
    ) -> Result<String> {
        self.load(bundle, template)?.apply_str(input, params)
    }
}

impl TransformationService for XsltTransformationService {
    fn transform(
        &self,
        bundle: &dyn ResourceBundle,
        template: &TemplateLocator,
        input: &Path,
        output: &Path,
        params: &ConversionParameters,
    ) -> Result<()> {
        let sheet = self.load(bundle, template)?;
        let mut document = XmlDocument::from_file_preserving_whitespace(input).map_err(|source| {
            TransformError::Input {
                document: input.display().to_string(),
                source,
            }
        })?;
        sheet.strip_whitespace(&mut document);
        let text = sheet.apply(&document, params)?;
        write_atomically(output, &text)?;
        info!(
            "Transformed {} with {} into {}",
            input.display(),
            sheet.id(),
            output.display()
        );
        Ok(())
    }
}

/// Write through a temporary file in the destination directory, then rename
fn write_atomically(path: &Path, text: &str) -> Result<()> {
    let output_error = |source: std::io::Error| TransformError::Output {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(output_error)?;
    file.write_all(text.as_bytes()).map_err(output_error)?;
    file.as_file().sync_all().map_err(output_error)?;
    file.persist(path).map_err(|err| output_error(err.error))?;
    Ok(())
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Schema and template locators
//!
//! A locator says where a schema or template comes from: a named resource in
//! a [`ResourceBundle`], an explicit file on disk, or (for templates only)
//! literal content supplied by the caller.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ResolutionError;
use crate::resource::ResourceBundle;
use crate::xml::decode_document;

/// A resolved schema or template, ready to be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedResource {
    /// Stable identity: `namespace:name`, a file path, or `inline`
    pub id: String,
    /// Decoded contents
    pub text: String,
}

impl LoadedResource {
    fn from_bytes(id: String, bytes: Vec<u8>) -> Result<Self, ResolutionError> {
        let text = decode_document(&bytes).map_err(|_| ResolutionError::Encoding { id: id.clone() })?;
        Ok(Self { id, text })
    }
}

fn read_file(path: &Path) -> Result<LoadedResource, ResolutionError> {
    debug!("Reading override file {}", path.display());
    let bytes = fs::read(path).map_err(|source| ResolutionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    LoadedResource::from_bytes(path.display().to_string(), bytes)
}

fn read_resource(bundle: &dyn ResourceBundle, name: &str) -> Result<LoadedResource, ResolutionError> {
    debug!("Resolving resource {} in bundle {}", name, bundle.namespace());
    let bytes = bundle.load(name)?;
    LoadedResource::from_bytes(format!("{}:{}", bundle.namespace(), name), bytes)
}

/// Where a schema definition lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaLocator {
    /// A name resolved relative to the owning bundle
    Resource(String),
    /// An explicit file supplied by the caller
    File(PathBuf),
}

impl SchemaLocator {
    /// Locator for a bundled resource
    pub fn resource(name: impl Into<String>) -> Self {
        SchemaLocator::Resource(name.into())
    }

    /// Locator for a file on disk
    pub fn file(path: impl Into<PathBuf>) -> Self {
        SchemaLocator::File(path.into())
    }

    /// Resolve to text using `bundle` for named resources
    pub fn resolve(&self, bundle: &dyn ResourceBundle) -> Result<LoadedResource, ResolutionError> {
        match self {
            SchemaLocator::Resource(name) => read_resource(bundle, name),
            SchemaLocator::File(path) => read_file(path),
        }
    }
}

impl fmt::Display for SchemaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaLocator::Resource(name) => write!(f, "resource:{}", name),
            SchemaLocator::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// Where a transformation template lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateLocator {
    /// A name resolved relative to the owning bundle
    Resource(String),
    /// An explicit file supplied by the caller
    File(PathBuf),
    /// Literal template text supplied by the caller
    Inline(String),
}

impl TemplateLocator {
    /// Locator for a bundled resource
    pub fn resource(name: impl Into<String>) -> Self {
        TemplateLocator::Resource(name.into())
    }

    /// Locator for a file on disk
    pub fn file(path: impl Into<PathBuf>) -> Self {
        TemplateLocator::File(path.into())
    }

    /// Locator for literal content
    pub fn inline(content: impl Into<String>) -> Self {
        TemplateLocator::Inline(content.into())
    }

    /// Resolve to text using `bundle` for named resources
    pub fn resolve(&self, bundle: &dyn ResourceBundle) -> Result<LoadedResource, ResolutionError> {
        match self {
            TemplateLocator::Resource(name) => read_resource(bundle, name),
            TemplateLocator::File(path) => read_file(path),
            TemplateLocator::Inline(text) => Ok(LoadedResource {
                id: "inline".to_string(),
                text: text.clone(),
            }),
        }
    }
}

impl fmt::Display for TemplateLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateLocator::Resource(name) => write!(f, "resource:{}", name),
            TemplateLocator::File(path) => write!(f, "file:{}", path.display()),
            TemplateLocator::Inline(_) => write!(f, "inline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::EmbeddedBundle;
    use tempfile::NamedTempFile;

    static ENTRIES: &[(&str, &str)] = &[("xsd/in.xsd", "<xs:schema/>")];

    #[test]
    fn test_resource_resolution() {
        let bundle = EmbeddedBundle::new("tools/demo", ENTRIES);
        let loaded = SchemaLocator::resource("xsd/in.xsd").resolve(&bundle).unwrap();
        assert_eq!(loaded.id, "tools/demo:xsd/in.xsd");
        assert_eq!(loaded.text, "<xs:schema/>");
    }

    #[test]
    fn test_file_resolution_ignores_bundle() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "<x/>").unwrap();
        let bundle = EmbeddedBundle::empty("none");
        let loaded = TemplateLocator::file(file.path()).resolve(&bundle).unwrap();
        assert_eq!(loaded.text, "<x/>");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let bundle = EmbeddedBundle::empty("none");
        let err = SchemaLocator::file("/definitely/not/here.xsd")
            .resolve(&bundle)
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Io { .. }));
    }

    #[test]
    fn test_inline_template() {
        let bundle = EmbeddedBundle::empty("none");
        let loaded = TemplateLocator::inline("<t/>").resolve(&bundle).unwrap();
        assert_eq!(loaded.id, "inline");
        assert_eq!(loaded.text, "<t/>");
    }

    #[test]
    fn test_non_utf8_rejected() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), [0xff, 0xfe, 0x00]).unwrap();
        let bundle = EmbeddedBundle::empty("none");
        let err = SchemaLocator::file(file.path()).resolve(&bundle).unwrap_err();
        assert!(matches!(err, ResolutionError::Encoding { .. }));
    }
}

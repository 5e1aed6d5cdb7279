//! Converter and format registries
//!
//! Converters are created by plain factory functions registered under a
//! tool key. Factories receive a [`ConverterContext`] carrying the operator
//! settings (override template, extra schemas) and the shared services.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reportkit_core::FormatDescriptor;
use reportkit_transform::{TransformationService, XsltTransformationService};
use reportkit_validate::{ValidationService, XsdValidationService};
use tracing::debug;

use crate::converter::FormatConverter;
use crate::error::RegistryError;
use crate::tool::ToolInfo;

/// Builds a converter from its context
pub type ConverterFactory = fn(&ConverterContext<'_>) -> Result<Box<dyn FormatConverter>, RegistryError>;

/// Output formats by key
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    formats: BTreeMap<String, FormatDescriptor>,
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in formats
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_formats(&mut registry);
        registry
    }

    /// Register a format, replacing any format with the same key
    pub fn register(&mut self, format: FormatDescriptor) {
        debug!("Registered output format {}", format);
        self.formats.insert(format.key().to_string(), format);
    }

    pub fn get(&self, key: &str) -> Option<&FormatDescriptor> {
        self.formats.get(key)
    }

    /// Look up a format, failing on unknown keys
    pub fn require(&self, key: &str) -> Result<&FormatDescriptor, RegistryError> {
        self.get(key)
            .ok_or_else(|| RegistryError::UnknownFormat(key.to_string()))
    }

    /// All formats, ordered by key
    pub fn iter(&self) -> impl Iterator<Item = &FormatDescriptor> {
        self.formats.values()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

/// Settings and services handed to converter factories
#[derive(Clone)]
pub struct ConverterContext<'r> {
    formats: &'r FormatRegistry,
    template_file: Option<PathBuf>,
    input_schemas: Vec<PathBuf>,
    user_content: Option<PathBuf>,
    validator: Arc<dyn ValidationService>,
    transformer: Arc<dyn TransformationService>,
}

impl<'r> ConverterContext<'r> {
    /// Create a context with default services
    pub fn new(formats: &'r FormatRegistry) -> Self {
        Self {
            formats,
            template_file: None,
            input_schemas: Vec::new(),
            user_content: None,
            validator: Arc::new(XsdValidationService::new()),
            transformer: Arc::new(XsltTransformationService::new()),
        }
    }

    /// Operator-supplied template file
    pub fn with_template_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_file = Some(path.into());
        self
    }

    /// Operator-supplied input schema files, in order
    pub fn with_input_schemas(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.input_schemas.extend(paths);
        self
    }

    /// Root under which operators keep per-tool templates
    ///
    /// A file at `<root>/<tool user content dir>/<template name>` replaces the
    /// bundled template of the same name.
    pub fn with_user_content(mut self, root: impl Into<PathBuf>) -> Self {
        self.user_content = Some(root.into());
        self
    }

    pub fn with_validation_service(mut self, service: Arc<dyn ValidationService>) -> Self {
        self.validator = service;
        self
    }

    pub fn with_transformation_service(mut self, service: Arc<dyn TransformationService>) -> Self {
        self.transformer = service;
        self
    }

    pub fn formats(&self) -> &'r FormatRegistry {
        self.formats
    }

    pub fn template_file(&self) -> Option<&Path> {
        self.template_file.as_deref()
    }

    pub fn input_schemas(&self) -> &[PathBuf] {
        &self.input_schemas
    }

    pub fn validator(&self) -> Arc<dyn ValidationService> {
        Arc::clone(&self.validator)
    }

    pub fn transformer(&self) -> Arc<dyn TransformationService> {
        Arc::clone(&self.transformer)
    }

    /// The template file overriding the bundled `template` for `tool`
    ///
    /// An explicit template file wins over user content.
    pub fn override_for(&self, tool: &ToolInfo, template: &str) -> Option<PathBuf> {
        if let Some(file) = &self.template_file {
            return Some(file.clone());
        }
        let root = self.user_content.as_ref()?;
        let name = Path::new(template).file_name()?;
        let candidate = root.join(tool.user_content_dir()).join(name);
        if candidate.is_file() {
            debug!("Using user template {} for {}", candidate.display(), tool);
            Some(candidate)
        } else {
            None
        }
    }
}

struct Registration {
    tool: ToolInfo,
    description: String,
    factory: ConverterFactory,
}

/// Converter factories by tool key
#[derive(Default)]
pub struct ConverterRegistry {
    entries: BTreeMap<String, Registration>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in tools
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_converters(&mut registry);
        registry
    }

    /// Register a factory under `key`, replacing any previous one
    pub fn register(
        &mut self,
        key: impl Into<String>,
        tool: ToolInfo,
        description: impl Into<String>,
        factory: ConverterFactory,
    ) {
        let key = key.into();
        debug!("Registered converter {} for {}", key, tool);
        self.entries.insert(
            key,
            Registration {
                tool,
                description: description.into(),
                factory,
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Build the converter registered under `key`
    pub fn create(
        &self,
        key: &str,
        context: &ConverterContext<'_>,
    ) -> Result<Box<dyn FormatConverter>, RegistryError> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| RegistryError::UnknownTool(key.to_string()))?;
        (entry.factory)(context)
    }

    /// Registered tools as `(key, tool, description)`, ordered by key
    pub fn tools(&self) -> impl Iterator<Item = (&str, &ToolInfo, &str)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), &entry.tool, entry.description.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::XslConverter;
    use reportkit_core::EmbeddedBundle;
    use tempfile::TempDir;

    fn demo(context: &ConverterContext<'_>) -> Result<Box<dyn FormatConverter>, RegistryError> {
        let tool = ToolInfo::new("demo", "2.0");
        let mut builder = XslConverter::builder(tool.clone(), Arc::new(EmbeddedBundle::empty("tools/demo")))
            .template("xsl/demo.xsl")
            .output_format(context.formats().require("junit")?.clone());
        if let Some(file) = context.override_for(&tool, "xsl/demo.xsl") {
            builder = builder.template_file(file);
        }
        Ok(Box::new(builder.build()))
    }

    fn registry() -> ConverterRegistry {
        let mut registry = ConverterRegistry::new();
        registry.register("demo", ToolInfo::new("demo", "2.0"), "Demo reports", demo);
        registry
    }

    #[test]
    fn test_unknown_tool() {
        let formats = FormatRegistry::with_builtins();
        let err = registry()
            .create("nunit", &ConverterContext::new(&formats))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownTool(ref key) if key == "nunit"));
    }

    #[test]
    fn test_factory_sees_formats() {
        let formats = FormatRegistry::with_builtins();
        let converter = registry().create("demo", &ConverterContext::new(&formats)).unwrap();
        assert_eq!(converter.output_format().unwrap().key(), "junit");

        let empty = FormatRegistry::new();
        let err = registry().create("demo", &ConverterContext::new(&empty)).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownFormat(_)));
    }

    #[test]
    fn test_user_content_override() {
        let dir = TempDir::new().unwrap();
        let tool = ToolInfo::new("demo", "2.0");
        let formats = FormatRegistry::new();
        let context = ConverterContext::new(&formats).with_user_content(dir.path());
        assert_eq!(context.override_for(&tool, "xsl/demo.xsl"), None);

        let user_dir = dir.path().join("xunit/demo/2.0");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(user_dir.join("demo.xsl"), "<xsl:stylesheet/>").unwrap();
        assert_eq!(
            context.override_for(&tool, "xsl/demo.xsl"),
            Some(user_dir.join("demo.xsl"))
        );

        let explicit = context.with_template_file("/etc/reportkit/mine.xsl");
        assert_eq!(
            explicit.override_for(&tool, "xsl/demo.xsl"),
            Some(PathBuf::from("/etc/reportkit/mine.xsl"))
        );
    }

    #[test]
    fn test_tools_are_ordered() {
        let mut registry = registry();
        registry.register("alpha", ToolInfo::new("alpha", ""), "First", demo);
        let keys: Vec<&str> = registry.tools().map(|(key, _, _)| key).collect();
        assert_eq!(keys, vec!["alpha", "demo"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("alpha"));
    }
}

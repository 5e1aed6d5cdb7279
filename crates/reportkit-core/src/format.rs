//! Output format descriptors

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::locator::SchemaLocator;
use crate::resource::ResourceBundle;

/// The identity of a supported output shape
///
/// A descriptor carries the schemas that define the format together with the
/// bundle they are resolved from. Once built it never changes; equality is
/// over `(key, version)`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use reportkit_core::{EmbeddedBundle, FormatDescriptor, SchemaLocator};
///
/// let junit = FormatDescriptor::builder("junit", "1.0", Arc::new(EmbeddedBundle::empty("formats/junit")))
///     .description("JUnit output format 1.0")
///     .schema(SchemaLocator::resource("xsd/junit-1.0.xsd"))
///     .build();
///
/// assert_eq!(junit.key(), "junit");
/// assert_eq!(junit.schema_refs().len(), 1);
/// ```
#[derive(Clone)]
pub struct FormatDescriptor {
    key: String,
    description: String,
    version: String,
    schema_refs: Vec<SchemaLocator>,
    bundle: Arc<dyn ResourceBundle>,
}

impl FormatDescriptor {
    /// Start building a descriptor
    pub fn builder(
        key: impl Into<String>,
        version: impl Into<String>,
        bundle: Arc<dyn ResourceBundle>,
    ) -> FormatDescriptorBuilder {
        FormatDescriptorBuilder {
            key: key.into(),
            description: String::new(),
            version: version.into(),
            schema_refs: Vec::new(),
            bundle,
        }
    }

    /// Stable identifier
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Human description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Version string
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Schemas defining the format, in validation order
    pub fn schema_refs(&self) -> &[SchemaLocator] {
        &self.schema_refs
    }

    /// Whether the format declares any schema
    pub fn has_schema(&self) -> bool {
        !self.schema_refs.is_empty()
    }

    /// Bundle the schema resources are resolved from
    pub fn bundle(&self) -> &dyn ResourceBundle {
        self.bundle.as_ref()
    }
}

impl PartialEq for FormatDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.version == other.version
    }
}

impl Eq for FormatDescriptor {}

impl Hash for FormatDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.version.hash(state);
    }
}

impl fmt::Debug for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatDescriptor")
            .field("key", &self.key)
            .field("version", &self.version)
            .field("description", &self.description)
            .field("schema_refs", &self.schema_refs)
            .field("bundle", &self.bundle.namespace())
            .finish()
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.version)
    }
}

/// Builder for [`FormatDescriptor`]
pub struct FormatDescriptorBuilder {
    key: String,
    description: String,
    version: String,
    schema_refs: Vec<SchemaLocator>,
    bundle: Arc<dyn ResourceBundle>,
}

impl FormatDescriptorBuilder {
    /// Set the human description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a schema
    pub fn schema(mut self, schema: SchemaLocator) -> Self {
        self.schema_refs.push(schema);
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> FormatDescriptor {
        FormatDescriptor {
            key: self.key,
            description: self.description,
            version: self.version,
            schema_refs: self.schema_refs,
            bundle: self.bundle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::EmbeddedBundle;
    use std::collections::HashSet;

    fn bundle() -> Arc<dyn ResourceBundle> {
        Arc::new(EmbeddedBundle::empty("formats/test"))
    }

    #[test]
    fn test_equality_by_key_and_version() {
        let a = FormatDescriptor::builder("junit", "1.0", bundle())
            .description("first")
            .build();
        let b = FormatDescriptor::builder("junit", "1.0", bundle())
            .description("second")
            .schema(SchemaLocator::resource("x.xsd"))
            .build();
        let c = FormatDescriptor::builder("junit", "2.0", bundle()).build();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_schema_less_format() {
        let format = FormatDescriptor::builder("plain", "1", bundle()).build();
        assert!(!format.has_schema());
        assert_eq!(format.to_string(), "plain 1");
    }
}

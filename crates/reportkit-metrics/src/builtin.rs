//! Built-in formats and tools
//!
//! Templates and schemas are compiled into the binary, one bundle per tool
//! or format.

use std::sync::Arc;

use reportkit_core::{EmbeddedBundle, FormatDescriptor, ResourceBundle, SchemaLocator};

use crate::converter::{FormatConverter, XslConverter, XslConverterBuilder};
use crate::error::RegistryError;
use crate::registry::{ConverterContext, ConverterRegistry, FormatRegistry};
use crate::tool::ToolInfo;

/// Key of the JUnit output format
pub const JUNIT: &str = "junit";

static JUNIT_RESOURCES: &[(&str, &str)] = &[(
    "xsd/junit-1.0.xsd",
    include_str!("../resources/formats/junit/xsd/junit-1.0.xsd"),
)];

static CPPUNIT_RESOURCES: &[(&str, &str)] = &[
    (
        "xsl/cppunit-to-junit.xsl",
        include_str!("../resources/tools/cppunit/xsl/cppunit-to-junit.xsl"),
    ),
    (
        "xsd/cppunit-1.0.xsd",
        include_str!("../resources/tools/cppunit/xsd/cppunit-1.0.xsd"),
    ),
];

static GTEST_RESOURCES: &[(&str, &str)] = &[(
    "xsl/gtest-to-junit.xsl",
    include_str!("../resources/tools/gtest/xsl/gtest-to-junit.xsl"),
)];

/// The JUnit 1.0 output format
pub fn junit_format() -> FormatDescriptor {
    FormatDescriptor::builder(JUNIT, "1.0", Arc::new(EmbeddedBundle::new("formats/junit", JUNIT_RESOURCES)))
        .description("JUnit output format 1.0")
        .schema(SchemaLocator::resource("xsd/junit-1.0.xsd"))
        .build()
}

pub(crate) fn register_formats(registry: &mut FormatRegistry) {
    registry.register(junit_format());
}

pub(crate) fn register_converters(registry: &mut ConverterRegistry) {
    registry.register("cppunit", cppunit_tool(), "CppUnit 1.x XML reports", cppunit);
    registry.register("gtest", gtest_tool(), "GoogleTest XML reports", gtest);
    registry.register(
        "custom",
        custom_tool(),
        "Any XML report, with an operator-supplied stylesheet",
        custom,
    );
}

fn cppunit_tool() -> ToolInfo {
    ToolInfo::new("cppunit", "1.x")
}

fn gtest_tool() -> ToolInfo {
    ToolInfo::new("gtest", "")
}

fn custom_tool() -> ToolInfo {
    ToolInfo::new("custom", "")
}

/// A builder for a bundled tool, with the context's services, target format
/// and template override applied
fn bundled(
    context: &ConverterContext<'_>,
    tool: ToolInfo,
    bundle: Arc<dyn ResourceBundle>,
    template: &str,
) -> Result<XslConverterBuilder, RegistryError> {
    if !context.input_schemas().is_empty() {
        return Err(RegistryError::InvalidContext {
            tool: tool.name,
            message: "input schemas can only be set for the custom tool".to_string(),
        });
    }
    let format = context.formats().require(JUNIT)?.clone();
    let override_file = context.override_for(&tool, template);
    let mut builder = XslConverter::builder(tool, bundle)
        .template(template)
        .output_format(format)
        .validation_service(context.validator())
        .transformation_service(context.transformer());
    if let Some(file) = override_file {
        builder = builder.template_file(file);
    }
    Ok(builder)
}

fn cppunit(context: &ConverterContext<'_>) -> Result<Box<dyn FormatConverter>, RegistryError> {
    let bundle = Arc::new(EmbeddedBundle::new("tools/cppunit", CPPUNIT_RESOURCES));
    let converter = bundled(context, cppunit_tool(), bundle, "xsl/cppunit-to-junit.xsl")?
        .input_schema(SchemaLocator::resource("xsd/cppunit-1.0.xsd"))
        .build();
    Ok(Box::new(converter))
}

fn gtest(context: &ConverterContext<'_>) -> Result<Box<dyn FormatConverter>, RegistryError> {
    let bundle = Arc::new(EmbeddedBundle::new("tools/gtest", GTEST_RESOURCES));
    let converter = bundled(context, gtest_tool(), bundle, "xsl/gtest-to-junit.xsl")?.build();
    Ok(Box::new(converter))
}

fn custom(context: &ConverterContext<'_>) -> Result<Box<dyn FormatConverter>, RegistryError> {
    let tool = custom_tool();
    let template = context
        .template_file()
        .ok_or_else(|| RegistryError::MissingTemplate(tool.name.clone()))?
        .to_path_buf();
    let converter = XslConverter::builder(tool, Arc::new(EmbeddedBundle::empty("tools/custom")))
        .template_file(template)
        .input_schemas(context.input_schemas().iter().cloned().map(SchemaLocator::File))
        .output_format(context.formats().require(JUNIT)?.clone())
        .validation_service(context.validator())
        .transformation_service(context.transformer())
        .build();
    Ok(Box::new(converter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportkit_core::TemplateLocator;

    #[test]
    fn test_builtin_resources_resolve() {
        let format = junit_format();
        for schema in format.schema_refs() {
            assert!(schema.resolve(format.bundle()).is_ok(), "{}", schema);
        }
        let cppunit = EmbeddedBundle::new("tools/cppunit", CPPUNIT_RESOURCES);
        assert!(TemplateLocator::resource("xsl/cppunit-to-junit.xsl").resolve(&cppunit).is_ok());
        assert!(SchemaLocator::resource("xsd/cppunit-1.0.xsd").resolve(&cppunit).is_ok());
    }

    #[test]
    fn test_builtin_registrations() {
        let formats = FormatRegistry::with_builtins();
        let format = formats.get(JUNIT).unwrap();
        assert_eq!(format.version(), "1.0");
        assert_eq!(format.description(), "JUnit output format 1.0");

        let registry = ConverterRegistry::with_builtins();
        let keys: Vec<&str> = registry.tools().map(|(key, _, _)| key).collect();
        assert_eq!(keys, vec!["cppunit", "custom", "gtest"]);
    }

    #[test]
    fn test_gtest_has_no_input_schema() {
        let formats = FormatRegistry::with_builtins();
        let registry = ConverterRegistry::with_builtins();
        let gtest = registry.create("gtest", &ConverterContext::new(&formats)).unwrap();
        assert!(gtest.input_schemas().is_empty());
        let cppunit = registry.create("cppunit", &ConverterContext::new(&formats)).unwrap();
        assert_eq!(cppunit.input_schemas().len(), 1);
    }

    #[test]
    fn test_custom_requires_template() {
        let formats = FormatRegistry::with_builtins();
        let registry = ConverterRegistry::with_builtins();
        let err = registry.create("custom", &ConverterContext::new(&formats)).unwrap_err();
        assert!(matches!(err, RegistryError::MissingTemplate(_)));

        let context = ConverterContext::new(&formats)
            .with_template_file("report.xsl")
            .with_input_schemas(vec!["a.xsd".into(), "b.xsd".into()]);
        let converter = registry.create("custom", &context).unwrap();
        assert_eq!(
            converter.input_schemas(),
            &[SchemaLocator::file("a.xsd"), SchemaLocator::file("b.xsd")]
        );
    }

    #[test]
    fn test_bundled_tools_reject_input_schemas() {
        let formats = FormatRegistry::with_builtins();
        let context = ConverterContext::new(&formats).with_input_schemas(vec!["a.xsd".into()]);
        let err = ConverterRegistry::with_builtins()
            .create("cppunit", &context)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidContext { .. }));
    }
}

//! Format converters
//!
//! A converter knows which tool produced its input, which template rewrites
//! that input into the target format, and which schemas the consumed and
//! produced documents must satisfy.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reportkit_core::{
    ConversionParameters, FormatDescriptor, ResourceBundle, SchemaLocator, TemplateLocator,
    ValidationReport,
};
use reportkit_transform::{TransformationService, XsltTransformationService};
use reportkit_validate::{ValidationService, XsdValidationService};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ConversionError, MetricError, Result};
use crate::tool::ToolInfo;

/// How a converter rewrites its input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    /// Stylesheet transformation
    Xsl,
}

/// A caller-supplied template replacing the converter's own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalTemplate {
    /// Template file on disk
    File(PathBuf),
    /// Template text
    Content(String),
}

impl ExternalTemplate {
    fn locator(&self) -> TemplateLocator {
        match self {
            ExternalTemplate::File(path) => TemplateLocator::file(path),
            ExternalTemplate::Content(text) => TemplateLocator::inline(text.as_str()),
        }
    }
}

/// Converts one tool's reports into an output format
pub trait FormatConverter: Send + Sync + fmt::Debug {
    /// The tool whose reports this converter consumes
    fn tool(&self) -> &ToolInfo;

    /// How this converter works
    fn kind(&self) -> ConverterKind {
        ConverterKind::Xsl
    }

    /// Target format, if the converter declares one
    fn output_format(&self) -> Option<&FormatDescriptor>;

    /// Schemas the input must satisfy
    fn input_schemas(&self) -> &[SchemaLocator];

    /// Convert `input` into `output` with the converter's template
    fn convert_with_params(&self, input: &Path, output: &Path, params: &ConversionParameters) -> Result<()>;

    /// Convert `input` into `output` with a caller-supplied template
    fn convert_with_template(
        &self,
        input: &Path,
        output: &Path,
        template: &ExternalTemplate,
        params: &ConversionParameters,
    ) -> Result<()>;

    /// Validate a consumed document against the input schemas
    fn validate_input(&self, input: &Path) -> Result<ValidationReport, MetricError>;

    /// Validate a produced document against the output format's schemas
    fn validate_output(&self, output: &Path) -> Result<ValidationReport, MetricError>;

    /// Convert without parameters
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        self.convert_with_params(input, output, &ConversionParameters::new())
    }
}

/// Converter driven by a stylesheet
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
///
/// use reportkit_core::{DirectoryBundle, SchemaLocator};
/// use reportkit_metrics::{FormatConverter, ToolInfo, XslConverter};
///
/// let bundle = Arc::new(DirectoryBundle::new("tools/nunit", "/opt/reportkit/nunit"));
/// let converter = XslConverter::builder(ToolInfo::new("nunit", "2.6"), bundle)
///     .template("nunit-to-junit.xsl")
///     .input_schema(SchemaLocator::resource("nunit-2.6.xsd"))
///     .build();
///
/// if converter.validate_input(Path::new("TestResult.xml"))?.is_valid() {
///     converter.convert(Path::new("TestResult.xml"), Path::new("junit.xml"))?;
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct XslConverter {
    tool: ToolInfo,
    template: Option<String>,
    template_file: Option<PathBuf>,
    input_schemas: Vec<SchemaLocator>,
    output_format: Option<FormatDescriptor>,
    bundle: Arc<dyn ResourceBundle>,
    validator: Arc<dyn ValidationService>,
    transformer: Arc<dyn TransformationService>,
}

impl XslConverter {
    /// Start building a converter whose named resources live in `bundle`
    pub fn builder(tool: ToolInfo, bundle: Arc<dyn ResourceBundle>) -> XslConverterBuilder {
        XslConverterBuilder {
            tool,
            template: None,
            template_file: None,
            input_schemas: Vec::new(),
            output_format: None,
            bundle,
            validator: None,
            transformer: None,
        }
    }

    /// Name of the bundled template
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Override template file
    pub fn template_file(&self) -> Option<&Path> {
        self.template_file.as_deref()
    }

    /// Bundle the template and input schemas are resolved through
    pub fn bundle(&self) -> &dyn ResourceBundle {
        self.bundle.as_ref()
    }

    /// The template used by [`FormatConverter::convert_with_params`]: the
    /// override file when set, else the bundled resource
    pub fn template_locator(&self) -> Result<TemplateLocator> {
        match (&self.template_file, &self.template) {
            (Some(file), _) => Ok(TemplateLocator::file(file)),
            (None, Some(name)) => Ok(TemplateLocator::resource(name.as_str())),
            (None, None) => Err(ConversionError::NoTemplate(self.tool.name.clone())),
        }
    }

    fn run(
        &self,
        template: &TemplateLocator,
        input: &Path,
        output: &Path,
        params: &ConversionParameters,
    ) -> Result<()> {
        debug!("Converting {} for {} with {}", input.display(), self.tool, template);
        self.transformer
            .transform(self.bundle.as_ref(), template, input, output, params)?;
        info!("Converted {} report {} to {}", self.tool, input.display(), output.display());
        Ok(())
    }
}

impl FormatConverter for XslConverter {
    fn tool(&self) -> &ToolInfo {
        &self.tool
    }

    fn output_format(&self) -> Option<&FormatDescriptor> {
        self.output_format.as_ref()
    }

    fn input_schemas(&self) -> &[SchemaLocator] {
        &self.input_schemas
    }

    fn convert_with_params(&self, input: &Path, output: &Path, params: &ConversionParameters) -> Result<()> {
        let template = self.template_locator()?;
        self.run(&template, input, output, params)
    }

    fn convert_with_template(
        &self,
        input: &Path,
        output: &Path,
        template: &ExternalTemplate,
        params: &ConversionParameters,
    ) -> Result<()> {
        self.run(&template.locator(), input, output, params)
    }

    fn validate_input(&self, input: &Path) -> Result<ValidationReport, MetricError> {
        if self.input_schemas.is_empty() {
            debug!("No input schema for {}; {} accepted as is", self.tool, input.display());
            return Ok(ValidationReport::new());
        }
        Ok(self
            .validator
            .validate(self.bundle.as_ref(), &self.input_schemas, input)?)
    }

    fn validate_output(&self, output: &Path) -> Result<ValidationReport, MetricError> {
        let format = match &self.output_format {
            Some(format) if format.has_schema() => format,
            _ => {
                debug!("No output schema for {}; {} accepted as is", self.tool, output.display());
                return Ok(ValidationReport::new());
            }
        };
        Ok(self
            .validator
            .validate(format.bundle(), format.schema_refs(), output)?)
    }
}

impl PartialEq for XslConverter {
    fn eq(&self, other: &Self) -> bool {
        self.tool == other.tool
            && self.template == other.template
            && self.template_file == other.template_file
            && self.input_schemas == other.input_schemas
            && self.output_format == other.output_format
            && self.bundle.namespace() == other.bundle.namespace()
    }
}

impl Eq for XslConverter {}

impl Hash for XslConverter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tool.hash(state);
        self.template.hash(state);
        self.template_file.hash(state);
        self.input_schemas.hash(state);
        self.output_format.hash(state);
        self.bundle.namespace().hash(state);
    }
}

impl fmt::Debug for XslConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XslConverter")
            .field("tool", &self.tool)
            .field("template", &self.template)
            .field("template_file", &self.template_file)
            .field("input_schemas", &self.input_schemas)
            .field("output_format", &self.output_format)
            .field("bundle", &self.bundle.namespace())
            .finish()
    }
}

/// Builder for [`XslConverter`]
pub struct XslConverterBuilder {
    tool: ToolInfo,
    template: Option<String>,
    template_file: Option<PathBuf>,
    input_schemas: Vec<SchemaLocator>,
    output_format: Option<FormatDescriptor>,
    bundle: Arc<dyn ResourceBundle>,
    validator: Option<Arc<dyn ValidationService>>,
    transformer: Option<Arc<dyn TransformationService>>,
}

impl XslConverterBuilder {
    /// Bundled template name
    pub fn template(mut self, name: impl Into<String>) -> Self {
        self.template = Some(name.into());
        self
    }

    /// Template file that takes precedence over the bundled template
    pub fn template_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_file = Some(path.into());
        self
    }

    /// Add an input schema
    pub fn input_schema(mut self, schema: SchemaLocator) -> Self {
        self.input_schemas.push(schema);
        self
    }

    /// Add several input schemas, in order
    pub fn input_schemas(mut self, schemas: impl IntoIterator<Item = SchemaLocator>) -> Self {
        self.input_schemas.extend(schemas);
        self
    }

    /// Target format
    pub fn output_format(mut self, format: FormatDescriptor) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Validation service; defaults to [`XsdValidationService`]
    pub fn validation_service(mut self, service: Arc<dyn ValidationService>) -> Self {
        self.validator = Some(service);
        self
    }

    /// Transformation service; defaults to [`XsltTransformationService`]
    pub fn transformation_service(mut self, service: Arc<dyn TransformationService>) -> Self {
        self.transformer = Some(service);
        self
    }

    pub fn build(self) -> XslConverter {
        XslConverter {
            tool: self.tool,
            template: self.template,
            template_file: self.template_file,
            input_schemas: self.input_schemas,
            output_format: self.output_format,
            bundle: self.bundle,
            validator: self
                .validator
                .unwrap_or_else(|| Arc::new(XsdValidationService::new())),
            transformer: self
                .transformer
                .unwrap_or_else(|| Arc::new(XsltTransformationService::new())),
        }
    }
}

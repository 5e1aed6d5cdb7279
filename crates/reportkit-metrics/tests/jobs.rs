use std::fs;
use std::path::PathBuf;

use reportkit_core::ConversionParameters;
use reportkit_metrics::{
    ConversionJob, ConverterContext, ConverterRegistry, ExternalTemplate, FormatConverter,
    FormatRegistry, JobError, JobOptions, JobStage,
};
use tempfile::TempDir;

const VALID: &str = r#"<TestRun>
  <SuccessfulTests>
    <Test id="1"><Name>Suite::passes</Name></Test>
  </SuccessfulTests>
</TestRun>"#;

/// `Test` lacks its required id
const INVALID: &str = r#"<TestRun>
  <SuccessfulTests>
    <Test><Name>Suite::passes</Name></Test>
  </SuccessfulTests>
</TestRun>"#;

fn cppunit(formats: &FormatRegistry) -> Box<dyn FormatConverter> {
    ConverterRegistry::with_builtins()
        .create("cppunit", &ConverterContext::new(formats))
        .unwrap()
}

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn valid_input_runs_every_stage() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.xml", VALID);
    let output = dir.path().join("out.xml");
    let formats = FormatRegistry::with_builtins();
    let converter = cppunit(&formats);

    let report = ConversionJob::new(converter.as_ref()).run(&input, &output).unwrap();
    assert_eq!(report.stage, JobStage::OutputValidated);
    assert!(report.is_valid());
    assert!(report.input_report.is_some());
    assert!(report.output_report.is_some());
    assert!(output.exists());
}

#[test]
fn invalid_input_stops_before_transforming() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.xml", INVALID);
    let output = dir.path().join("out.xml");
    let formats = FormatRegistry::with_builtins();
    let converter = cppunit(&formats);

    let report = ConversionJob::new(converter.as_ref()).run(&input, &output).unwrap();
    assert_eq!(report.stage, JobStage::InputValidated);
    assert!(!report.is_valid());
    assert!(!report.transformed());
    assert!(report.output_report.is_none());
    assert!(!output.exists());
}

#[test]
fn invalid_input_can_still_be_converted() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.xml", INVALID);
    let output = dir.path().join("out.xml");
    let formats = FormatRegistry::with_builtins();
    let converter = cppunit(&formats);

    let options = JobOptions {
        stop_on_invalid_input: false,
        ..JobOptions::default()
    };
    let report = ConversionJob::new(converter.as_ref())
        .options(options)
        .run(&input, &output)
        .unwrap();
    assert_eq!(report.stage, JobStage::OutputValidated);
    assert!(!report.input_report.as_ref().unwrap().is_valid());
    assert!(report.output_report.as_ref().unwrap().is_valid());
}

#[test]
fn validation_stages_are_optional() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.xml", INVALID);
    let output = dir.path().join("out.xml");
    let formats = FormatRegistry::with_builtins();
    let converter = cppunit(&formats);

    let options = JobOptions {
        validate_input: false,
        validate_output: false,
        stop_on_invalid_input: true,
    };
    let report = ConversionJob::new(converter.as_ref())
        .options(options)
        .params(ConversionParameters::new().with("suite_name", "smoke"))
        .run(&input, &output)
        .unwrap();
    assert_eq!(report.stage, JobStage::Transformed);
    assert!(report.input_report.is_none());
    assert!(report.output_report.is_none());
    assert!(fs::read_to_string(&output).unwrap().contains(r#"name="smoke""#));
}

#[test]
fn job_uses_external_template() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "in.xml", VALID);
    let output = dir.path().join("out.xml");
    let formats = FormatRegistry::with_builtins();
    let converter = cppunit(&formats);

    // Produces a document the JUnit schema rejects
    let template = ExternalTemplate::Content(
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
             <xsl:template match="/"><summary/></xsl:template>
           </xsl:stylesheet>"#
            .to_string(),
    );
    let report = ConversionJob::new(converter.as_ref())
        .template(template)
        .run(&input, &output)
        .unwrap();
    assert_eq!(report.stage, JobStage::OutputValidated);
    assert!(!report.output_report.as_ref().unwrap().is_valid());
}

#[test]
fn unreadable_input_is_an_error() {
    let dir = TempDir::new().unwrap();
    let formats = FormatRegistry::with_builtins();
    let converter = cppunit(&formats);

    let err = ConversionJob::new(converter.as_ref())
        .run(&dir.path().join("missing.xml"), &dir.path().join("out.xml"))
        .unwrap_err();
    assert!(matches!(err, JobError::Validation(_)));

    let options = JobOptions {
        validate_input: false,
        ..JobOptions::default()
    };
    let err = ConversionJob::new(converter.as_ref())
        .options(options)
        .run(&dir.path().join("missing.xml"), &dir.path().join("out.xml"))
        .unwrap_err();
    assert!(matches!(err, JobError::Conversion(_)));
}

use std::fs;

use reportkit_core::{ConversionParameters, EmbeddedBundle, TemplateLocator};
use reportkit_transform::{TransformError, TransformationService, XsltTransformationService};
use tempfile::TempDir;

const SUMMARY_XSL: &str = r#"<?xml version="1.0"?>
<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:output method="xml" indent="yes"/>
  <xsl:param name="suite" select="'unnamed'"/>
  <xsl:template match="/results">
    <testsuite name="{$suite}" tests="{count(test)}" failures="{count(test[@status='fail'])}">
      <xsl:apply-templates select="test"/>
    </testsuite>
  </xsl:template>
  <xsl:template match="test">
    <testcase name="{@id}">
      <xsl:if test="@status='fail'">
        <failure message="{normalize-space(.)}"/>
      </xsl:if>
    </testcase>
  </xsl:template>
</xsl:stylesheet>
"#;

const FAILING_XSL: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/"><partial/><xsl:message terminate="yes">giving up</xsl:message></xsl:template>
</xsl:stylesheet>"#;

static ENTRIES: &[(&str, &str)] = &[("xsl/summary.xsl", SUMMARY_XSL), ("xsl/failing.xsl", FAILING_XSL)];

const RESULTS: &str = r#"<results>
  <test id="t1" status="pass"/>
  <test id="t2" status="fail">  expected   3
     got 4 </test>
</results>"#;

fn bundle() -> EmbeddedBundle {
    EmbeddedBundle::new("tools/test", ENTRIES)
}

fn setup() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("results.xml");
    fs::write(&input, RESULTS).unwrap();
    (dir, input)
}

#[test]
fn transforms_bundled_template_to_file() {
    let (dir, input) = setup();
    let output = dir.path().join("junit.xml");
    XsltTransformationService::new()
        .transform(
            &bundle(),
            &TemplateLocator::resource("xsl/summary.xsl"),
            &input,
            &output,
            &ConversionParameters::new(),
        )
        .unwrap();

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
    assert!(text.contains(r#"<testsuite name="unnamed" tests="2" failures="1">"#));
    assert!(text.contains(r#"<testcase name="t1"/>"#));
    assert!(text.contains(r#"<failure message="expected 3 got 4"/>"#));
}

#[test]
fn parameters_override_defaults() {
    let params = ConversionParameters::new()
        .with("suite", "nightly")
        .with("unused", 42i64);
    let text = XsltTransformationService::new()
        .transform_str(&bundle(), &TemplateLocator::resource("xsl/summary.xsl"), RESULTS, &params)
        .unwrap();
    assert!(text.contains(r#"name="nightly""#));
}

#[test]
fn inline_and_file_templates() {
    let (dir, input) = setup();
    let service = XsltTransformationService::new();

    let inline = TemplateLocator::inline(
        r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
             <xsl:output method="text"/>
             <xsl:template match="/"><xsl:value-of select="count(//test)"/></xsl:template>
           </xsl:stylesheet>"#,
    );
    let output = dir.path().join("count.txt");
    service
        .transform(&EmbeddedBundle::empty("none"), &inline, &input, &output, &ConversionParameters::new())
        .unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap(), "2");

    let xsl = dir.path().join("custom.xsl");
    fs::write(&xsl, SUMMARY_XSL).unwrap();
    let output = dir.path().join("custom.xml");
    service
        .transform(&EmbeddedBundle::empty("none"), &TemplateLocator::file(&xsl), &input, &output, &ConversionParameters::new())
        .unwrap();
    assert!(fs::read_to_string(&output).unwrap().contains("<testsuite"));
}

#[test]
fn failed_transformation_leaves_no_output() {
    let (dir, input) = setup();
    let output = dir.path().join("out.xml");
    let err = XsltTransformationService::new()
        .transform(
            &bundle(),
            &TemplateLocator::resource("xsl/failing.xsl"),
            &input,
            &output,
            &ConversionParameters::new(),
        )
        .unwrap_err();
    assert!(matches!(err, TransformError::Terminated(ref m) if m == "giving up"));
    assert!(!output.exists());
    // Only the input remains: no stray temporary files
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn existing_output_survives_failure() {
    let (dir, input) = setup();
    let output = dir.path().join("out.xml");
    fs::write(&output, "previous").unwrap();
    let result = XsltTransformationService::new().transform(
        &bundle(),
        &TemplateLocator::resource("xsl/failing.xsl"),
        &input,
        &output,
        &ConversionParameters::new(),
    );
    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&output).unwrap(), "previous");
}

#[test]
fn error_kinds_are_distinct() {
    let (dir, input) = setup();
    let service = XsltTransformationService::new();
    let output = dir.path().join("out.xml");
    let none = ConversionParameters::new();

    let err = service
        .transform(&bundle(), &TemplateLocator::resource("xsl/missing.xsl"), &input, &output, &none)
        .unwrap_err();
    assert!(matches!(err, TransformError::Resolution(_)));

    let broken = dir.path().join("broken.xml");
    fs::write(&broken, "<results><test></results>").unwrap();
    let err = service
        .transform(&bundle(), &TemplateLocator::resource("xsl/summary.xsl"), &broken, &output, &none)
        .unwrap_err();
    assert!(matches!(err, TransformError::Input { .. }));

    let err = service
        .transform(&bundle(), &TemplateLocator::inline("<not-xsl/>"), &input, &output, &none)
        .unwrap_err();
    assert!(matches!(err, TransformError::Stylesheet { .. }));
}

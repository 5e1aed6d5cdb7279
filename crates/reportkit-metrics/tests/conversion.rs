use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reportkit_core::{
    ConversionParameters, EmbeddedBundle, FormatDescriptor, NodeId, SchemaLocator, ViolationKind,
    XmlDocument,
};
use reportkit_metrics::{
    ConversionError, ConverterContext, ConverterRegistry, ExternalTemplate, FormatConverter,
    FormatRegistry, ToolInfo, XslConverter,
};
use tempfile::TempDir;

const CPPUNIT_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TestRun>
  <FailedTests>
    <FailedTest id="2">
      <Name>MathTest::testDivide</Name>
      <FailureType>Assertion</FailureType>
      <Location>
        <File>MathTest.cpp</File>
        <Line>42</Line>
      </Location>
      <Message>equality assertion failed
- Expected: 1
- Actual  : 2</Message>
    </FailedTest>
    <FailedTest id="3">
      <Name>IoTest::testOpen</Name>
      <FailureType>Error</FailureType>
      <Message>uncaught exception</Message>
    </FailedTest>
  </FailedTests>
  <SuccessfulTests>
    <Test id="1">
      <Name>MathTest::testAdd</Name>
    </Test>
  </SuccessfulTests>
  <Statistics>
    <Tests>3</Tests>
    <FailuresTotal>2</FailuresTotal>
    <Errors>1</Errors>
    <Failures>1</Failures>
  </Statistics>
</TestRun>
"#;

const GTEST_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites tests="3" failures="1" disabled="1" errors="0" time="0.012" name="AllTests">
  <testsuite name="MathTest" tests="3" failures="1" disabled="1" errors="0" time="0.012">
    <testcase name="Add" status="run" result="completed" time="0.001" classname="MathTest"/>
    <testcase name="Divide" status="run" result="completed" time="0.002" classname="MathTest">
      <failure message="Expected equality" type="">math_test.cc:12</failure>
    </testcase>
    <testcase name="DISABLED_Pow" status="notrun" result="suppressed" time="0" classname="MathTest"/>
  </testsuite>
</testsuites>
"#;

fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

fn create(formats: &FormatRegistry, key: &str) -> Box<dyn FormatConverter> {
    ConverterRegistry::with_builtins()
        .create(key, &ConverterContext::new(formats))
        .unwrap()
}

fn elements(doc: &XmlDocument, local: &str) -> Vec<NodeId> {
    doc.descendants(doc.root())
        .into_iter()
        .filter(|node| doc.is_element(*node) && doc.name(*node).map_or(false, |name| name.local == local))
        .collect()
}

fn parse(path: &Path) -> XmlDocument {
    XmlDocument::from_file(path).unwrap()
}

#[test]
fn cppunit_report_converts_to_valid_junit() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "cppunit.xml", CPPUNIT_REPORT);
    let output = dir.path().join("junit.xml");
    let formats = FormatRegistry::with_builtins();
    let converter = create(&formats, "cppunit");

    assert!(converter.validate_input(&input).unwrap().is_valid());
    converter.convert(&input, &output).unwrap();
    let report = converter.validate_output(&output).unwrap();
    assert!(report.is_valid(), "{:?}", report);

    let doc = parse(&output);
    let suite = elements(&doc, "testsuite")[0];
    assert_eq!(doc.attribute(suite, "name"), Some("cppunit"));
    assert_eq!(doc.attribute(suite, "tests"), Some("3"));
    assert_eq!(doc.attribute(suite, "failures"), Some("1"));
    assert_eq!(doc.attribute(suite, "errors"), Some("1"));

    let cases = elements(&doc, "testcase");
    let names: Vec<_> = cases.iter().map(|c| doc.attribute(*c, "name").unwrap()).collect();
    assert_eq!(names, vec!["testAdd", "testDivide", "testOpen"]);
    assert_eq!(doc.attribute(cases[2], "classname"), Some("IoTest"));

    let failure = elements(&doc, "failure")[0];
    assert_eq!(
        doc.attribute(failure, "message"),
        Some("equality assertion failed - Expected: 1 - Actual : 2")
    );
    assert_eq!(doc.string_value(failure), "MathTest.cpp:42");
    let error = elements(&doc, "error")[0];
    assert_eq!(doc.attribute(error, "message"), Some("uncaught exception"));
}

#[test]
fn latin1_report_is_decoded() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("cppunit-latin1.xml");
    let mut bytes = br#"<?xml version="1.0" encoding='ISO-8859-1' standalone='yes' ?>
<TestRun>
  <FailedTests>
    <FailedTest id="1">
      <Name>CafeTest::testMenu</Name>
      <FailureType>Assertion</FailureType>
      <Message>caf"#
        .to_vec();
    bytes.push(0xE9);
    bytes.extend_from_slice(b" is closed</Message>\n    </FailedTest>\n  </FailedTests>\n</TestRun>\n");
    fs::write(&input, bytes).unwrap();

    let output = dir.path().join("junit.xml");
    let formats = FormatRegistry::with_builtins();
    let converter = create(&formats, "cppunit");
    assert!(converter.validate_input(&input).unwrap().is_valid());
    converter.convert(&input, &output).unwrap();
    assert!(converter.validate_output(&output).unwrap().is_valid());

    let doc = parse(&output);
    let failure = elements(&doc, "failure")[0];
    assert_eq!(doc.attribute(failure, "message"), Some("caf\u{E9} is closed"));
}

#[test]
fn gtest_report_converts_to_valid_junit() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "gtest.xml", GTEST_REPORT);
    let output = dir.path().join("junit.xml");
    let formats = FormatRegistry::with_builtins();
    let converter = create(&formats, "gtest");

    converter.convert(&input, &output).unwrap();
    let report = converter.validate_output(&output).unwrap();
    assert!(report.is_valid(), "{:?}", report);

    let doc = parse(&output);
    let root = doc.document_element().unwrap();
    assert_eq!(doc.attribute(root, "name"), Some("AllTests"));
    assert_eq!(doc.attribute(root, "time"), Some("0.012"));
    let suite = elements(&doc, "testsuite")[0];
    assert_eq!(doc.attribute(suite, "skipped"), Some("1"));
    assert_eq!(doc.attribute(suite, "failures"), Some("1"));
    assert_eq!(elements(&doc, "skipped").len(), 1);
    let failure = elements(&doc, "failure")[0];
    assert_eq!(doc.attribute(failure, "type"), None);
    assert_eq!(doc.string_value(failure), "math_test.cc:12");
}

#[test]
fn minimal_inputs_produce_valid_documents() {
    let dir = TempDir::new().unwrap();
    let formats = FormatRegistry::with_builtins();
    for (key, text) in [("cppunit", "<TestRun/>"), ("gtest", "<testsuites/>")] {
        let input = write(&dir, &format!("{}.xml", key), text);
        let output = dir.path().join(format!("{}-junit.xml", key));
        let converter = create(&formats, key);

        assert!(converter.validate_input(&input).unwrap().is_valid());
        converter.convert(&input, &output).unwrap();
        assert!(converter.validate_output(&output).unwrap().is_valid(), "{}", key);
        let doc = parse(&output);
        assert_eq!(doc.name(doc.document_element().unwrap()).unwrap().local, "testsuites");
    }
}

#[test]
fn no_input_schema_accepts_anything() {
    let dir = TempDir::new().unwrap();
    let garbage = write(&dir, "garbage.xml", "this is <<< not xml");
    let formats = FormatRegistry::with_builtins();
    let report = create(&formats, "gtest").validate_input(&garbage).unwrap();
    assert!(report.is_valid());
}

#[test]
fn no_output_schema_accepts_anything() {
    let dir = TempDir::new().unwrap();
    let garbage = write(&dir, "garbage.xml", "not xml either");
    let bundle = Arc::new(EmbeddedBundle::empty("tools/demo"));

    let without_format = XslConverter::builder(ToolInfo::new("demo", ""), bundle.clone())
        .template("demo.xsl")
        .build();
    assert!(without_format.validate_output(&garbage).unwrap().is_valid());

    let schemaless = FormatDescriptor::builder("plain", "1.0", bundle.clone()).build();
    let with_schemaless = XslConverter::builder(ToolInfo::new("demo", ""), bundle)
        .template("demo.xsl")
        .output_format(schemaless)
        .build();
    assert!(with_schemaless.validate_output(&garbage).unwrap().is_valid());
}

#[test]
fn missing_root_is_reported_at_the_root() {
    let dir = TempDir::new().unwrap();
    let output = write(&dir, "out.xml", "<results>\n  <testsuite name=\"a\" tests=\"0\"/>\n</results>");
    let formats = FormatRegistry::with_builtins();
    let report = create(&formats, "cppunit").validate_output(&output).unwrap();

    assert!(!report.is_valid());
    let first = &report.errors()[0];
    assert_eq!(first.kind, ViolationKind::UndeclaredElement);
    let location = first.location.as_ref().unwrap();
    assert_eq!(location.line, Some(1));
    assert_eq!(location.path.as_deref(), Some("/results"));
}

#[test]
fn invalid_cppunit_input_is_reported() {
    let dir = TempDir::new().unwrap();
    let input = write(
        &dir,
        "bad.xml",
        "<TestRun>\n  <SuccessfulTests>\n    <Test><Name>a</Name></Test>\n  </SuccessfulTests>\n</TestRun>",
    );
    let formats = FormatRegistry::with_builtins();
    let report = create(&formats, "cppunit").validate_input(&input).unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.errors()[0].kind, ViolationKind::MissingAttribute);
}

#[test]
fn empty_parameters_match_the_plain_call() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "cppunit.xml", CPPUNIT_REPORT);
    let plain = dir.path().join("plain.xml");
    let with_params = dir.path().join("params.xml");
    let formats = FormatRegistry::with_builtins();
    let converter = create(&formats, "cppunit");

    converter.convert(&input, &plain).unwrap();
    converter
        .convert_with_params(&input, &with_params, &ConversionParameters::new())
        .unwrap();
    assert_eq!(fs::read(&plain).unwrap(), fs::read(&with_params).unwrap());
}

#[test]
fn parameters_reach_the_template() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "cppunit.xml", CPPUNIT_REPORT);
    let output = dir.path().join("junit.xml");
    let formats = FormatRegistry::with_builtins();
    let params = ConversionParameters::new()
        .with("suite_prefix", "nightly.")
        .with("ignored", true);

    create(&formats, "cppunit")
        .convert_with_params(&input, &output, &params)
        .unwrap();
    let doc = parse(&output);
    let suite = elements(&doc, "testsuite")[0];
    assert_eq!(doc.attribute(suite, "name"), Some("nightly.cppunit"));
}

const RENAMING_XSL: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:param name="label" select="'file'"/>
  <xsl:template match="/">
    <testsuites><testsuite name="{$label}" tests="{count(//Test)}"/></testsuites>
  </xsl:template>
</xsl:stylesheet>"#;

#[test]
fn override_templates_take_precedence() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "cppunit.xml", CPPUNIT_REPORT);
    let xsl = write(&dir, "rename.xsl", RENAMING_XSL);
    let formats = FormatRegistry::with_builtins();
    let converter = create(&formats, "cppunit");
    let none = ConversionParameters::new();

    let from_file = dir.path().join("file.xml");
    converter
        .convert_with_template(&input, &from_file, &ExternalTemplate::File(xsl), &none)
        .unwrap();

    let from_content = dir.path().join("content.xml");
    let content = RENAMING_XSL.replace("'file'", "'content'");
    converter
        .convert_with_template(&input, &from_content, &ExternalTemplate::Content(content), &none)
        .unwrap();

    let name = |path: &Path| {
        let doc = parse(path);
        let suite = elements(&doc, "testsuite")[0];
        doc.attribute(suite, "name").unwrap().to_string()
    };
    assert_eq!(name(&from_file), "file");
    assert_eq!(name(&from_content), "content");
    assert_ne!(fs::read(&from_file).unwrap(), fs::read(&from_content).unwrap());
    assert!(converter.validate_output(&from_file).unwrap().is_valid());
}

#[test]
fn configured_template_file_replaces_bundled_one() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "cppunit.xml", CPPUNIT_REPORT);
    let output = dir.path().join("junit.xml");
    let xsl = write(&dir, "rename.xsl", RENAMING_XSL);
    let formats = FormatRegistry::with_builtins();

    let converter = ConverterRegistry::with_builtins()
        .create("cppunit", &ConverterContext::new(&formats).with_template_file(&xsl))
        .unwrap();
    converter.convert(&input, &output).unwrap();
    let doc = parse(&output);
    assert_eq!(doc.attribute(elements(&doc, "testsuite")[0], "name"), Some("file"));
}

#[test]
fn user_content_template_replaces_bundled_one() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "cppunit.xml", CPPUNIT_REPORT);
    let output = dir.path().join("junit.xml");
    let user_dir = dir.path().join("content").join("xunit/cppunit/1.x");
    fs::create_dir_all(&user_dir).unwrap();
    fs::write(user_dir.join("cppunit-to-junit.xsl"), RENAMING_XSL).unwrap();
    let formats = FormatRegistry::with_builtins();

    let context = ConverterContext::new(&formats).with_user_content(dir.path().join("content"));
    let converter = ConverterRegistry::with_builtins().create("cppunit", &context).unwrap();
    converter.convert(&input, &output).unwrap();
    let doc = parse(&output);
    assert_eq!(doc.attribute(elements(&doc, "testsuite")[0], "name"), Some("file"));
}

const TOOL_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="report">
    <xs:complexType>
      <xs:sequence>
        <xs:any processContents="skip" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
      <xs:attribute name="tool" type="xs:string" use="required"/>
      <xs:anyAttribute/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

const VERSION_XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="report">
    <xs:complexType>
      <xs:sequence>
        <xs:any processContents="skip" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
      <xs:attribute name="version" type="xs:int" use="required"/>
      <xs:anyAttribute/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

#[test]
fn custom_tool_validates_against_every_schema() {
    let dir = TempDir::new().unwrap();
    let xsl = write(&dir, "custom.xsl", RENAMING_XSL);
    let tool_xsd = write(&dir, "tool.xsd", TOOL_XSD);
    let version_xsd = write(&dir, "version.xsd", VERSION_XSD);
    let formats = FormatRegistry::with_builtins();
    let registry = ConverterRegistry::with_builtins();
    let converter_with = |schemas: Vec<PathBuf>| {
        let context = ConverterContext::new(&formats)
            .with_template_file(&xsl)
            .with_input_schemas(schemas);
        registry.create("custom", &context).unwrap()
    };

    let good = write(&dir, "good.xml", r#"<report tool="lint" version="2"/>"#);
    let bad = write(&dir, "bad.xml", r#"<report version="two"/>"#);
    let both = converter_with(vec![tool_xsd.clone(), version_xsd.clone()]);
    assert!(both.validate_input(&good).unwrap().is_valid());

    let only_tool = converter_with(vec![tool_xsd]).validate_input(&bad).unwrap();
    let only_version = converter_with(vec![version_xsd]).validate_input(&bad).unwrap();
    let combined = both.validate_input(&bad).unwrap();
    assert_eq!(only_tool.len(), 1);
    assert_eq!(only_version.len(), 1);

    let mut expected = only_tool.errors().to_vec();
    expected.extend(only_version.errors().iter().cloned());
    assert_eq!(combined.errors(), expected.as_slice());

    // A document passing one schema still fails the pair
    let half = write(&dir, "half.xml", r#"<report tool="lint" version="x"/>"#);
    assert!(converter_with(vec![dir.path().join("tool.xsd")])
        .validate_input(&half)
        .unwrap()
        .is_valid());
    assert!(!both.validate_input(&half).unwrap().is_valid());
}

#[test]
fn conversion_errors_are_typed() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "cppunit.xml", CPPUNIT_REPORT);
    let output = dir.path().join("junit.xml");
    let formats = FormatRegistry::with_builtins();
    let converter = create(&formats, "cppunit");
    let none = ConversionParameters::new();

    let missing = ExternalTemplate::File(dir.path().join("missing.xsl"));
    let err = converter
        .convert_with_template(&input, &output, &missing, &none)
        .unwrap_err();
    assert!(matches!(err, ConversionError::Resolution(_)));

    let broken = ExternalTemplate::Content("<xsl:stylesheet".to_string());
    let err = converter
        .convert_with_template(&input, &output, &broken, &none)
        .unwrap_err();
    assert!(matches!(err, ConversionError::Transform(_)));
    assert!(!output.exists());

    let not_xml = write(&dir, "not-xml.xml", "plain text");
    assert!(converter.validate_input(&not_xml).is_err());
}

#[test]
fn converters_with_same_configuration_are_equal() {
    let bundle = Arc::new(EmbeddedBundle::empty("tools/demo"));
    let build = |schema: &str| {
        XslConverter::builder(ToolInfo::new("demo", "1"), bundle.clone())
            .template("demo.xsl")
            .input_schema(SchemaLocator::resource(schema))
            .build()
    };
    assert_eq!(build("a.xsd"), build("a.xsd"));
    assert_ne!(build("a.xsd"), build("b.xsd"));
}

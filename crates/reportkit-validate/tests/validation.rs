use std::fs;

use reportkit_core::{EmbeddedBundle, SchemaLocator, ViolationKind};
use reportkit_validate::{ValidationFailure, ValidationService, XsdValidationService};
use tempfile::TempDir;

const SUITE_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="testsuite">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="testcase" minOccurs="0" maxOccurs="unbounded">
          <xs:complexType>
            <xs:attribute name="name" type="xs:string" use="required"/>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
      <xs:attribute name="name" type="xs:string" use="required"/>
      <xs:attribute name="tests" type="xs:int"/>
    </xs:complexType>
  </xs:element>
</xs:schema>
"#;

/// Accepts any suite but requires a numeric `tests` attribute
const COUNTS_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="testsuite">
    <xs:complexType>
      <xs:sequence>
        <xs:any processContents="skip" minOccurs="0" maxOccurs="unbounded"/>
      </xs:sequence>
      <xs:attribute name="tests" type="xs:int" use="required"/>
      <xs:anyAttribute/>
    </xs:complexType>
  </xs:element>
</xs:schema>
"#;

static ENTRIES: &[(&str, &str)] = &[("xsd/suite.xsd", SUITE_XSD), ("xsd/counts.xsd", COUNTS_XSD)];

fn bundle() -> EmbeddedBundle {
    EmbeddedBundle::new("tools/test", ENTRIES)
}

fn write(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn valid_document_has_empty_report() {
    let dir = TempDir::new().unwrap();
    let doc = write(
        &dir,
        "ok.xml",
        r#"<testsuite name="math" tests="1"><testcase name="add"/></testsuite>"#,
    );
    let service = XsdValidationService::new();
    let schemas = [
        SchemaLocator::resource("xsd/suite.xsd"),
        SchemaLocator::resource("xsd/counts.xsd"),
    ];
    let report = service.validate(&bundle(), &schemas, &doc).unwrap();
    assert!(report.is_valid(), "{:?}", report);
}

#[test]
fn undeclared_attribute_is_reported() {
    let service = XsdValidationService::new();
    let report = service
        .validate_str(
            &bundle(),
            &[SchemaLocator::resource("xsd/suite.xsd")],
            r#"<testsuite name="math" tests="1" retries="2"/>"#,
        )
        .unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.errors()[0].kind, ViolationKind::UndeclaredAttribute);
}

#[test]
fn multiple_schemas_concatenate_in_list_order() {
    let dir = TempDir::new().unwrap();
    // Fails the suite schema (testcase without name) and the counts schema
    // (no tests attribute).
    let doc = write(&dir, "bad.xml", "<testsuite name=\"math\">\n  <testcase/>\n</testsuite>");
    let service = XsdValidationService::new();
    let suite = SchemaLocator::resource("xsd/suite.xsd");
    let counts = SchemaLocator::resource("xsd/counts.xsd");

    let only_suite = service.validate(&bundle(), &[suite.clone()], &doc).unwrap();
    let only_counts = service.validate(&bundle(), &[counts.clone()], &doc).unwrap();
    let both = service.validate(&bundle(), &[suite, counts], &doc).unwrap();

    assert_eq!(only_suite.len(), 1);
    assert_eq!(only_counts.len(), 1);
    assert_eq!(both.len(), 2);
    assert_eq!(both.errors()[0], only_suite.errors()[0]);
    assert_eq!(both.errors()[1], only_counts.errors()[0]);
    assert_eq!(both.errors()[0].source.as_deref(), Some("tools/test:xsd/suite.xsd"));
    assert_eq!(both.errors()[1].source.as_deref(), Some("tools/test:xsd/counts.xsd"));
}

#[test]
fn errors_of_one_schema_are_sorted_by_position() {
    let service = XsdValidationService::new();
    let report = service
        .validate_str(
            &bundle(),
            &[SchemaLocator::resource("xsd/suite.xsd")],
            "<testsuite>\n  <testcase/>\n  <testcase/>\n</testsuite>",
        )
        .unwrap();
    let lines: Vec<_> = report
        .iter()
        .map(|e| e.location.as_ref().and_then(|l| l.line))
        .collect();
    assert_eq!(lines, vec![Some(1), Some(2), Some(3)]);
    assert!(report.iter().all(|e| e.kind == ViolationKind::MissingAttribute));
}

#[test]
fn wrong_root_is_reported_at_the_root() {
    let service = XsdValidationService::new();
    let report = service
        .validate_str(
            &bundle(),
            &[SchemaLocator::resource("xsd/suite.xsd")],
            "<?xml version=\"1.0\"?>\n<results/>",
        )
        .unwrap();
    assert!(!report.is_valid());
    let first = &report.errors()[0];
    assert_eq!(first.kind, ViolationKind::UndeclaredElement);
    let location = first.location.as_ref().unwrap();
    assert_eq!(location.line, Some(2));
    assert_eq!(location.path.as_deref(), Some("/results"));
}

#[test]
fn file_locator_bypasses_the_bundle() {
    let dir = TempDir::new().unwrap();
    let xsd = write(&dir, "override.xsd", SUITE_XSD);
    let service = XsdValidationService::new();
    let report = service
        .validate_str(
            &EmbeddedBundle::empty("empty"),
            &[SchemaLocator::file(&xsd)],
            r#"<testsuite name="x"/>"#,
        )
        .unwrap();
    assert!(report.is_valid());
}

#[test]
fn resolution_failure_is_distinct() {
    let service = XsdValidationService::new();
    let err = service
        .validate_str(&bundle(), &[SchemaLocator::resource("xsd/missing.xsd")], "<a/>")
        .unwrap_err();
    assert!(matches!(err, ValidationFailure::Resolution(_)));
}

#[test]
fn malformed_document_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let doc = write(&dir, "broken.xml", "<testsuite><testcase></testsuite>");
    let service = XsdValidationService::new();
    let err = service
        .validate(&bundle(), &[SchemaLocator::resource("xsd/suite.xsd")], &doc)
        .unwrap_err();
    assert!(matches!(err, ValidationFailure::Document { .. }));
}

#[test]
fn missing_document_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let service = XsdValidationService::new();
    let err = service
        .validate(
            &bundle(),
            &[SchemaLocator::resource("xsd/suite.xsd")],
            &dir.path().join("absent.xml"),
        )
        .unwrap_err();
    assert!(matches!(err, ValidationFailure::Document { .. }));
}

#[test]
fn unsupported_schema_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let xsd = write(
        &dir,
        "import.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"><xs:redefine schemaLocation="x.xsd"/></xs:schema>"#,
    );
    let service = XsdValidationService::new();
    let err = service
        .validate_str(&bundle(), &[SchemaLocator::file(&xsd)], "<a/>")
        .unwrap_err();
    assert!(matches!(err, ValidationFailure::Schema { .. }));
}

#[test]
fn bundled_schemas_are_compiled_once() {
    let service = XsdValidationService::new();
    for _ in 0..3 {
        service
            .validate_str(&bundle(), &[SchemaLocator::resource("xsd/suite.xsd")], r#"<testsuite name="a"/>"#)
            .unwrap();
    }
    assert_eq!(service.cache().len(), 1);
}

#[test]
fn empty_schema_list_accepts_any_well_formed_document() {
    let service = XsdValidationService::new();
    let report = service
        .validate_str(&bundle(), &[], "<anything><goes/></anything>")
        .unwrap();
    assert!(report.is_valid());
}

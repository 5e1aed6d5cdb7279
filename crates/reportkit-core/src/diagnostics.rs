//! Validation diagnostics
//!
//! Structural violations found while validating a document are data, not
//! errors. They are collected into a [`ValidationReport`]; an empty report
//! means the document is valid.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Position;

/// The kind of structural violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    /// The root element is not declared by the schema
    UndeclaredElement,
    /// A child element is not allowed at this point
    UnexpectedElement,
    /// A required child element is missing
    MissingElement,
    /// A required attribute is missing
    MissingAttribute,
    /// An attribute is not declared for the element
    UndeclaredAttribute,
    /// A text or attribute value does not satisfy its simple type
    InvalidValue,
    /// A value differs from the declared fixed value
    FixedValueMismatch,
    /// Character data appears in element-only content
    UnexpectedText,
    /// The root element is in the wrong namespace
    NamespaceMismatch,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::UndeclaredElement => "undeclared-element",
            ViolationKind::UnexpectedElement => "unexpected-element",
            ViolationKind::MissingElement => "missing-element",
            ViolationKind::MissingAttribute => "missing-attribute",
            ViolationKind::UndeclaredAttribute => "undeclared-attribute",
            ViolationKind::InvalidValue => "invalid-value",
            ViolationKind::FixedValueMismatch => "fixed-value-mismatch",
            ViolationKind::UnexpectedText => "unexpected-text",
            ViolationKind::NamespaceMismatch => "namespace-mismatch",
        };
        f.write_str(name)
    }
}

/// Where a violation was found
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Line number (1-indexed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    /// Column number (1-indexed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,

    /// Element path, e.g. `/testsuites/testsuite[2]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Location {
    /// A location from a source position
    pub fn at(position: Position) -> Self {
        Self {
            line: Some(position.line),
            column: Some(position.column),
            path: None,
        }
    }

    /// A location from an element path only
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            line: None,
            column: None,
            path: Some(path.into()),
        }
    }

    /// Set the element path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Line/column as a position, when both are known
    pub fn position(&self) -> Option<Position> {
        match (self.line, self.column) {
            (Some(line), Some(column)) => Some(Position::new(line, column)),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.position(), &self.path) {
            (Some(pos), Some(path)) => write!(f, "{} ({})", pos, path),
            (Some(pos), None) => write!(f, "{}", pos),
            (None, Some(path)) => write!(f, "{}", path),
            (None, None) => write!(f, "<unknown>"),
        }
    }
}

/// A single structural violation
///
/// # Example
///
/// ```
/// use reportkit_core::diagnostics::{Location, ValidationError, ViolationKind};
/// use reportkit_core::Position;
///
/// let err = ValidationError::new(ViolationKind::MissingAttribute, "attribute 'name' is required")
///     .with_location(Location::at(Position::new(3, 5)).with_path("/testsuite"))
///     .with_source("junit:xsd/junit-1.0.xsd");
/// assert_eq!(err.location.unwrap().line, Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationError {
    /// The kind of violation
    pub kind: ViolationKind,

    /// Human-readable message
    pub message: String,

    /// Where the violation occurred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    /// Identity of the schema that reported it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ValidationError {
    /// Create a new violation
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            source: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the reporting schema
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    fn sort_key(&self) -> (usize, usize) {
        self.location
            .as_ref()
            .and_then(Location::position)
            .map(|p| (p.line, p.column))
            .unwrap_or((usize::MAX, usize::MAX))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format: error[kind]: message
        write!(f, "error[{}]: {}", self.kind, self.message)?;
        if let Some(ref location) = self.location {
            write!(f, "\n  --> {}", location)?;
        }
        if let Some(ref source) = self.source {
            write!(f, "\n  = schema: {}", source)?;
        }
        Ok(())
    }
}

/// The result of one validation run
///
/// Reports are returned by value from every validation call; nothing is
/// stored on the validator or converter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    /// Create an empty (valid) report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a violation
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Append all violations of another report
    pub fn extend(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
    }

    /// Stable-sort violations by document position; unlocated ones go last
    pub fn sort_by_position(&mut self) {
        self.errors.sort_by_key(ValidationError::sort_key);
    }

    /// `true` when no violation was found
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All violations in order
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Get all violations
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the count
    pub fn len(&self) -> usize {
        self.errors.len()
    }
}

impl From<Vec<ValidationError>> for ValidationReport {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }
}

impl IntoIterator for ValidationReport {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl FromIterator<ValidationError> for ValidationReport {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located(line: usize, column: usize) -> ValidationError {
        ValidationError::new(ViolationKind::UnexpectedElement, format!("at {}", line))
            .with_location(Location::at(Position::new(line, column)))
    }

    #[test]
    fn test_empty_report_is_valid() {
        let report = ValidationReport::new();
        assert!(report.is_valid());
        assert_eq!(report.len(), 0);
    }

    #[test]
    fn test_sort_is_stable_and_by_position() {
        let mut report = ValidationReport::new();
        report.push(ValidationError::new(ViolationKind::MissingElement, "unlocated"));
        report.push(located(5, 1));
        report.push(located(2, 9));
        report.push(located(2, 3));
        report.sort_by_position();

        let lines: Vec<_> = report
            .iter()
            .map(|e| e.location.as_ref().and_then(|l| l.line))
            .collect();
        assert_eq!(lines, vec![Some(2), Some(2), Some(5), None]);
        assert_eq!(report.errors()[0].location.as_ref().unwrap().column, Some(3));
    }

    #[test]
    fn test_display() {
        let err = located(3, 5)
            .with_source("junit:xsd/junit-1.0.xsd");
        let display = format!("{}", err);
        assert!(display.contains("error[unexpected-element]"));
        assert!(display.contains("--> 3:5"));
        assert!(display.contains("schema: junit:xsd/junit-1.0.xsd"));
    }

    #[test]
    fn test_serialize() {
        let err = ValidationError::new(ViolationKind::MissingAttribute, "missing 'name'")
            .with_location(Location::path("/testsuite"));
        let report: ValidationReport = vec![err].into();

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"kind\":\"missing-attribute\""));
        assert!(json.contains("\"path\":\"/testsuite\""));
        assert!(!json.contains("\"line\""));

        let restored: ValidationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, report);
    }
}

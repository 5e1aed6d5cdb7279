//! Conversion parameters
//!
//! Parameters are passed opaquely to the transformation; which names a
//! template actually reads is the template's business.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A boolean
    Boolean(bool),
    /// A number
    Number(f64),
    /// A string
    String(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Boolean(b) => write!(f, "{}", b),
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Number(value as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Boolean(value)
    }
}

/// Errors from parsing `name=value` assignments
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// No `=` in the assignment
    #[error("parameter '{0}' must be written as name=value")]
    MissingValue(String),

    /// Empty name before `=`
    #[error("parameter name is empty in '{0}'")]
    EmptyName(String),
}

/// Named parameters for a conversion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionParameters {
    values: BTreeMap<String, ParamValue>,
}

impl ConversionParameters {
    /// An empty parameter mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a parameter (builder form)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Add or replace a parameter
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a parameter
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Iterate parameters in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the count
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Merge `other` into `self`; entries of `other` win
    pub fn merge(&mut self, other: &ConversionParameters) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Parse a `name=value` assignment
    ///
    /// `true`/`false` become booleans; anything else stays the exact text
    /// given, so `2.10` and `007` reach the stylesheet unchanged. XPath
    /// arithmetic and comparisons still convert such strings to numbers.
    pub fn parse_assignment(assignment: &str) -> Result<(String, ParamValue), ParamError> {
        let (name, raw) = assignment
            .split_once('=')
            .ok_or_else(|| ParamError::MissingValue(assignment.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ParamError::EmptyName(assignment.to_string()));
        }
        let value = match raw {
            "true" => ParamValue::Boolean(true),
            "false" => ParamValue::Boolean(false),
            _ => ParamValue::String(raw.to_string()),
        };
        Ok((name.to_string(), value))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ConversionParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            ConversionParameters::parse_assignment("prefix=nightly.").unwrap(),
            ("prefix".to_string(), ParamValue::String("nightly.".to_string()))
        );
        assert_eq!(
            ConversionParameters::parse_assignment("limit=10").unwrap().1,
            ParamValue::String("10".to_string())
        );
        assert_eq!(
            ConversionParameters::parse_assignment("version=2.10").unwrap().1,
            ParamValue::String("2.10".to_string())
        );
        assert_eq!(
            ConversionParameters::parse_assignment("build=007").unwrap().1,
            ParamValue::String("007".to_string())
        );
        assert_eq!(
            ConversionParameters::parse_assignment("strict=true").unwrap().1,
            ParamValue::Boolean(true)
        );
        assert_eq!(
            ConversionParameters::parse_assignment("empty=").unwrap().1,
            ParamValue::String(String::new())
        );
    }

    #[test]
    fn test_parse_assignment_errors() {
        assert_eq!(
            ConversionParameters::parse_assignment("novalue"),
            Err(ParamError::MissingValue("novalue".to_string()))
        );
        assert_eq!(
            ConversionParameters::parse_assignment("=x"),
            Err(ParamError::EmptyName("=x".to_string()))
        );
    }

    #[test]
    fn test_from_toml_table() {
        let params: ConversionParameters = toml::from_str(
            r#"
suite_prefix = "nightly."
retries = 3
verbose = false
"#,
        )
        .unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("retries"), Some(&ParamValue::Number(3.0)));
        assert_eq!(params.get("verbose"), Some(&ParamValue::Boolean(false)));
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base: ConversionParameters = [("a", "1"), ("b", "2")].into_iter().collect();
        let over = ConversionParameters::new().with("b", "3");
        base.merge(&over);
        assert_eq!(base.get("b"), Some(&ParamValue::String("3".to_string())));
        assert_eq!(base.len(), 2);
    }
}

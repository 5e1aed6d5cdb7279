//! Input tool identity

use std::fmt;

use serde::{Deserialize, Serialize};

/// What an input tool measures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Unit or integration test results
    #[default]
    Test,
    /// Code coverage
    Coverage,
    /// Generic measures
    Measure,
    /// Static analysis violations
    Violation,
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolKind::Test => "test",
            ToolKind::Coverage => "coverage",
            ToolKind::Measure => "measure",
            ToolKind::Violation => "violation",
        };
        f.write_str(name)
    }
}

/// The tool whose reports a converter consumes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name, e.g. `cppunit`
    pub name: String,
    /// Tool version; empty when any version is accepted
    pub version: String,
    /// What the tool reports
    #[serde(default)]
    pub kind: ToolKind,
}

impl ToolInfo {
    /// Create a test tool
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            kind: ToolKind::Test,
        }
    }

    /// Set the tool kind
    pub fn with_kind(mut self, kind: ToolKind) -> Self {
        self.kind = kind;
        self
    }

    /// Directory, relative to a user content root, where operators drop
    /// templates for this tool
    ///
    /// ```
    /// use reportkit_metrics::ToolInfo;
    ///
    /// assert_eq!(ToolInfo::new("cppunit", "1.12").user_content_dir(), "xunit/cppunit/1.12");
    /// assert_eq!(ToolInfo::new("boost", "N/A").user_content_dir(), "xunit/boost/");
    /// ```
    pub fn user_content_dir(&self) -> String {
        if self.version.is_empty() || self.version.ends_with("N/A") {
            format!("xunit/{}/", self.name)
        } else {
            format!("xunit/{}/{}", self.name, self.version)
        }
    }
}

impl fmt::Display for ToolInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{} {}", self.name, self.version)
        }
    }
}

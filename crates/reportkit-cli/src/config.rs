//! Configuration Settings
//!
//! Batch jobs are described in `reportkit.toml`.

use std::path::{Path, PathBuf};

use reportkit_core::ConversionParameters;
use reportkit_metrics::JobOptions;
use serde::{Deserialize, Serialize};

/// Top-level settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Options shared by every job
    pub defaults: Defaults,
    /// Root of per-tool user templates (`<root>/xunit/<tool>/...`)
    pub user_content: Option<PathBuf>,
    /// Conversion jobs, run in order
    pub jobs: Vec<JobSettings>,
}

impl Settings {
    /// Parse settings from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

/// Options every job inherits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub validate_input: bool,
    pub validate_output: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            validate_input: true,
            validate_output: true,
        }
    }
}

/// One batch job: a tool applied to every file matching a pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Registered tool key
    pub tool: String,
    /// Glob pattern selecting the input reports
    pub pattern: String,
    /// Directory receiving `<stem>.xml` for every input
    pub output_dir: PathBuf,
    /// A pattern matching nothing is not an error
    pub skip_no_test_files: bool,
    /// Remove produced files once validated
    pub delete_output_files: bool,
    /// Abort the whole run on the first failure
    pub stop_processing_if_error: bool,
    /// Override template
    pub xsl: Option<PathBuf>,
    /// Input schemas (custom tool only)
    pub input_schemas: Vec<PathBuf>,
    /// Overrides `defaults.validate_input`
    pub validate_input: Option<bool>,
    /// Overrides `defaults.validate_output`
    pub validate_output: Option<bool>,
    /// Template parameters
    pub params: ConversionParameters,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            tool: String::new(),
            pattern: String::new(),
            output_dir: PathBuf::from("junit"),
            skip_no_test_files: false,
            delete_output_files: false,
            stop_processing_if_error: true,
            xsl: None,
            input_schemas: Vec::new(),
            validate_input: None,
            validate_output: None,
            params: ConversionParameters::new(),
        }
    }
}

impl JobSettings {
    /// Stage options for this job
    pub fn options(&self, defaults: &Defaults) -> JobOptions {
        JobOptions {
            validate_input: self.validate_input.unwrap_or(defaults.validate_input),
            validate_output: self.validate_output.unwrap_or(defaults.validate_output),
            stop_on_invalid_input: true,
        }
    }

    /// Resolve relative paths against `base` (the config file's directory)
    pub fn resolved(&self, base: &Path) -> JobSettings {
        let mut job = self.clone();
        job.pattern = base.join(&self.pattern).to_string_lossy().into_owned();
        job.output_dir = base.join(&self.output_dir);
        job.xsl = self.xsl.as_ref().map(|xsl| base.join(xsl));
        job.input_schemas = self.input_schemas.iter().map(|xsd| base.join(xsd)).collect();
        job
    }
}

//! Conversion jobs
//!
//! A job takes one input file through the converter's stages in order:
//! optional input validation, transformation, optional output validation.

use std::path::Path;

use reportkit_core::{ConversionParameters, ValidationReport};
use serde::Serialize;
use tracing::{info, warn};

use crate::converter::{ExternalTemplate, FormatConverter};
use crate::error::JobError;

/// Last stage a job completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Configured,
    InputValidated,
    Transformed,
    OutputValidated,
}

/// Which optional stages a job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub validate_input: bool,
    pub validate_output: bool,
    /// Skip the transformation when the input is invalid
    pub stop_on_invalid_input: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            validate_input: true,
            validate_output: true,
            stop_on_invalid_input: true,
        }
    }
}

/// Outcome of one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    /// Last stage reached
    pub stage: JobStage,
    /// Input violations, when input validation ran
    pub input_report: Option<ValidationReport>,
    /// Output violations, when output validation ran
    pub output_report: Option<ValidationReport>,
}

impl JobReport {
    /// Whether the output document was produced
    pub fn transformed(&self) -> bool {
        self.stage >= JobStage::Transformed
    }

    /// Whether every validation that ran passed
    pub fn is_valid(&self) -> bool {
        self.input_report.as_ref().map_or(true, ValidationReport::is_valid)
            && self.output_report.as_ref().map_or(true, ValidationReport::is_valid)
    }
}

/// Drives one converter over one file
#[derive(Debug)]
pub struct ConversionJob<'c> {
    converter: &'c dyn FormatConverter,
    options: JobOptions,
    params: ConversionParameters,
    template: Option<ExternalTemplate>,
}

impl<'c> ConversionJob<'c> {
    /// Create a job with default options
    pub fn new(converter: &'c dyn FormatConverter) -> Self {
        Self {
            converter,
            options: JobOptions::default(),
            params: ConversionParameters::new(),
            template: None,
        }
    }

    pub fn options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    pub fn params(mut self, params: ConversionParameters) -> Self {
        self.params = params;
        self
    }

    /// Use a caller-supplied template instead of the converter's
    pub fn template(mut self, template: ExternalTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Run the job
    ///
    /// Violations are reported, not raised; only processing failures are
    /// errors.
    pub fn run(&self, input: &Path, output: &Path) -> Result<JobReport, JobError> {
        let mut report = JobReport {
            stage: JobStage::Configured,
            input_report: None,
            output_report: None,
        };

        if self.options.validate_input {
            let input_report = self.converter.validate_input(input)?;
            let valid = input_report.is_valid();
            report.input_report = Some(input_report);
            report.stage = JobStage::InputValidated;
            if !valid {
                warn!("{} is not a valid {} report", input.display(), self.converter.tool());
                if self.options.stop_on_invalid_input {
                    return Ok(report);
                }
            }
        }

        match &self.template {
            Some(template) => self
                .converter
                .convert_with_template(input, output, template, &self.params)?,
            None => self.converter.convert_with_params(input, output, &self.params)?,
        }
        report.stage = JobStage::Transformed;

        if self.options.validate_output {
            let output_report = self.converter.validate_output(output)?;
            if !output_report.is_valid() {
                warn!(
                    "{} produced from {} has {} violation(s)",
                    output.display(),
                    input.display(),
                    output_report.len()
                );
            }
            report.output_report = Some(output_report);
            report.stage = JobStage::OutputValidated;
        }

        info!("Job for {} finished at {:?}", input.display(), report.stage);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(JobStage::Configured < JobStage::InputValidated);
        assert!(JobStage::InputValidated < JobStage::Transformed);
        assert!(JobStage::Transformed < JobStage::OutputValidated);
    }

    #[test]
    fn test_report_validity() {
        let mut report = JobReport {
            stage: JobStage::Transformed,
            input_report: None,
            output_report: None,
        };
        assert!(report.is_valid());
        assert!(report.transformed());

        report.output_report = Some(ValidationReport::from(vec![reportkit_core::ValidationError::new(
            reportkit_core::ViolationKind::MissingElement,
            "missing testsuite",
        )]));
        assert!(!report.is_valid());
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStage::OutputValidated).unwrap(),
            "\"output_validated\""
        );
    }
}

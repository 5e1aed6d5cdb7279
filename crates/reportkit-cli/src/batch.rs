//! Batch processing of configured jobs

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use reportkit_metrics::{ConversionJob, ConverterContext, ConverterRegistry, FormatRegistry, JobReport};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{JobSettings, Settings};

/// Result of converting one file
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Stage and violations, when the job ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<JobReport>,
    /// Processing failure, when it did not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.report.as_ref().map_or(false, |r| r.transformed() && r.is_valid())
    }
}

/// Result of one configured job
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub tool: String,
    pub pattern: String,
    pub files: Vec<FileOutcome>,
    /// Job-level failure, e.g. a pattern matching nothing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.files.iter().all(FileOutcome::succeeded)
    }
}

/// Result of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub jobs: Vec<JobOutcome>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> bool {
        self.jobs.iter().all(JobOutcome::succeeded)
    }

    pub fn file_count(&self) -> usize {
        self.jobs.iter().map(|job| job.files.len()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.jobs
            .iter()
            .map(|job| job.files.iter().filter(|f| !f.succeeded()).count() + usize::from(job.error.is_some()))
            .sum()
    }
}

/// Run every job of `settings`; relative paths are resolved against `base`
///
/// Failures are recorded in the summary. A failure in a job with
/// `stop_processing_if_error` aborts the run with an error.
pub fn run_batch(settings: &Settings, base: &Path) -> Result<BatchSummary> {
    let formats = FormatRegistry::with_builtins();
    let converters = ConverterRegistry::with_builtins();
    let mut summary = BatchSummary::default();

    for job in &settings.jobs {
        let job = job.resolved(base);
        let outcome = run_job(settings, &job, base, &formats, &converters)?;
        let failed = !outcome.succeeded();
        summary.jobs.push(outcome);
        if failed && job.stop_processing_if_error {
            anyhow::bail!("Job for tool '{}' ({}) failed; processing stopped", job.tool, job.pattern);
        }
    }
    Ok(summary)
}

fn run_job(
    settings: &Settings,
    job: &JobSettings,
    base: &Path,
    formats: &FormatRegistry,
    converters: &ConverterRegistry,
) -> Result<JobOutcome> {
    let mut context = ConverterContext::new(formats).with_input_schemas(job.input_schemas.iter().cloned());
    if let Some(xsl) = &job.xsl {
        context = context.with_template_file(xsl);
    }
    if let Some(root) = &settings.user_content {
        context = context.with_user_content(base.join(root));
    }
    let converter = converters
        .create(&job.tool, &context)
        .with_context(|| format!("Failed to configure tool '{}'", job.tool))?;

    let mut outcome = JobOutcome {
        tool: job.tool.clone(),
        pattern: job.pattern.clone(),
        files: Vec::new(),
        error: None,
    };

    let inputs = expand(&job.pattern)?;
    if inputs.is_empty() {
        if job.skip_no_test_files {
            info!("No files match {}; skipped", job.pattern);
        } else {
            outcome.error = Some(format!("No test report files found matching {}", job.pattern));
        }
        return Ok(outcome);
    }

    fs::create_dir_all(&job.output_dir)
        .with_context(|| format!("Failed to create output directory: {}", job.output_dir.display()))?;

    let runner = ConversionJob::new(converter.as_ref())
        .options(job.options(&settings.defaults))
        .params(job.params.clone());
    let mut produced = HashSet::new();

    for input in inputs {
        let output = output_path(&job.output_dir, &input);
        if !produced.insert(output.clone()) {
            warn!("{} overwrites the output of an earlier input", output.display());
        }
        let file = if output == input {
            FileOutcome {
                input,
                output,
                report: None,
                error: Some("output would overwrite the input".to_string()),
            }
        } else {
            match runner.run(&input, &output) {
                Ok(report) => {
                    if job.delete_output_files && output.exists() {
                        fs::remove_file(&output)
                            .with_context(|| format!("Failed to delete {}", output.display()))?;
                    }
                    FileOutcome {
                        input,
                        output,
                        report: Some(report),
                        error: None,
                    }
                }
                Err(err) => {
                    warn!("Conversion of {} failed: {}", input.display(), err);
                    FileOutcome {
                        input,
                        output,
                        report: None,
                        error: Some(err.to_string()),
                    }
                }
            }
        };
        let failed = !file.succeeded();
        outcome.files.push(file);
        if failed && job.stop_processing_if_error {
            break;
        }
    }
    Ok(outcome)
}

/// Files matching `pattern`, sorted
fn expand(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in glob(pattern).with_context(|| format!("Invalid pattern: {}", pattern))? {
        let path = entry.with_context(|| format!("Failed to read a match of {}", pattern))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `<output_dir>/<input stem>.xml`
pub fn output_path(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    output_dir.join(format!("{}.xml", stem))
}

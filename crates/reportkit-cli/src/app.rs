//! CLI Application logic
//!
//! Contains the command-line interface implementation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use reportkit_core::{ConversionParameters, ValidationReport};
use reportkit_metrics::{
    ConversionJob, ConverterContext, ConverterRegistry, FormatConverter, FormatRegistry, JobOptions,
    JobReport,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::batch::{run_batch, BatchSummary};
use crate::config::Settings;

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for CI tooling
    Json,
}

#[derive(Parser)]
#[command(name = "reportkit")]
#[command(author, version, about = "Convert and validate test reports", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a tool report into the tool's output format
    Convert {
        /// Registered tool key (see `reportkit list`)
        tool: String,

        /// Input report
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Stylesheet replacing the tool's bundled template
        #[arg(long)]
        xsl: Option<PathBuf>,

        /// Input schema for the custom tool (repeatable)
        #[arg(long = "schema")]
        schemas: Vec<PathBuf>,

        /// Template parameter as name=value (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Validate the input before and the output after converting
        #[arg(long)]
        validate: bool,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate a tool report, or with --output-format a produced document
    Validate {
        /// Registered tool key
        tool: String,

        /// Document to validate
        file: PathBuf,

        /// Validate against this output format instead of the input schemas
        #[arg(long)]
        output_format: Option<String>,

        /// Stylesheet for the custom tool
        #[arg(long)]
        xsl: Option<PathBuf>,

        /// Input schema for the custom tool (repeatable)
        #[arg(long = "schema")]
        schemas: Vec<PathBuf>,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List registered tools and output formats
    List {
        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Run the batch jobs of a configuration file
    Process {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Tool-specific settings for building a converter
#[derive(Debug, Clone, Default)]
pub struct ToolOptions {
    pub xsl: Option<PathBuf>,
    pub schemas: Vec<PathBuf>,
}

/// Run the CLI application
///
/// This is the main entry point for the command-line interface.
/// It parses arguments and dispatches to the appropriate command.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let success = match cli.command {
        Commands::Convert {
            tool,
            input,
            output,
            xsl,
            schemas,
            params,
            validate,
            format,
        } => {
            let params = parse_params(&params)?;
            let options = ToolOptions { xsl, schemas };
            convert_command(&tool, &input, &output, &options, &params, validate, format)?
        }
        Commands::Validate {
            tool,
            file,
            output_format,
            xsl,
            schemas,
            format,
        } => {
            let options = ToolOptions { xsl, schemas };
            validate_command(&tool, &file, output_format.as_deref(), &options, format)?
        }
        Commands::List { format } => {
            list_command(format)?;
            true
        }
        Commands::Process { config, format } => process_command(config.as_deref(), format)?,
    };

    // Exit with error code if there are violations
    if !success {
        std::process::exit(1);
    }

    Ok(())
}

/// Install the stderr log subscriber; `RUST_LOG` wins over `-v`
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed (tests, embedding)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse repeated `name=value` arguments
pub fn parse_params(assignments: &[String]) -> Result<ConversionParameters> {
    let mut params = ConversionParameters::new();
    for assignment in assignments {
        let (name, value) = ConversionParameters::parse_assignment(assignment)
            .with_context(|| format!("Invalid parameter: {}", assignment))?;
        params.insert(name, value);
    }
    Ok(params)
}

fn create_converter(
    formats: &FormatRegistry,
    tool: &str,
    options: &ToolOptions,
) -> Result<Box<dyn FormatConverter>> {
    let mut context = ConverterContext::new(formats).with_input_schemas(options.schemas.iter().cloned());
    if let Some(xsl) = &options.xsl {
        context = context.with_template_file(xsl);
    }
    ConverterRegistry::with_builtins()
        .create(tool, &context)
        .with_context(|| format!("Failed to configure tool '{}'", tool))
}

/// Execute the convert command
///
/// Returns `false` when validation found violations.
pub fn convert_command(
    tool: &str,
    input: &Path,
    output: &Path,
    options: &ToolOptions,
    params: &ConversionParameters,
    validate: bool,
    format: OutputFormat,
) -> Result<bool> {
    // Check input file exists
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    if let Some(xsl) = &options.xsl {
        if !xsl.exists() {
            anyhow::bail!("Stylesheet not found: {}", xsl.display());
        }
    }

    let formats = FormatRegistry::with_builtins();
    let converter = create_converter(&formats, tool, options)?;

    let job_options = JobOptions {
        validate_input: validate,
        validate_output: validate,
        stop_on_invalid_input: true,
    };
    let report = ConversionJob::new(converter.as_ref())
        .options(job_options)
        .params(params.clone())
        .run(input, output)
        .with_context(|| format!("Failed to convert {}", input.display()))?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report to JSON")?;
            println!("{}", json);
        }
        OutputFormat::Text => print_job_report(input, output, &report),
    }
    Ok(report.transformed() && report.is_valid())
}

fn print_job_report(input: &Path, output: &Path, report: &JobReport) {
    if let Some(input_report) = &report.input_report {
        print_violations(input, input_report);
    }
    if !report.transformed() {
        println!("✗ {} was not converted", input.display());
        return;
    }
    println!("✓ Converted {} to {}", input.display(), output.display());
    if let Some(output_report) = &report.output_report {
        print_violations(output, output_report);
    }
}

fn print_violations(file: &Path, report: &ValidationReport) {
    if report.is_valid() {
        println!("✓ No issues found in {}", file.display());
        return;
    }
    for error in report.iter() {
        println!("{}: {}", file.display(), error);
    }
    println!("Found {} violation(s) in {}", report.len(), file.display());
}

/// Execute the validate command
///
/// Returns `false` when the document has violations.
pub fn validate_command(
    tool: &str,
    file: &Path,
    output_format: Option<&str>,
    options: &ToolOptions,
    format: OutputFormat,
) -> Result<bool> {
    // Check input file exists
    if !file.exists() {
        anyhow::bail!("Input file not found: {}", file.display());
    }

    let formats = FormatRegistry::with_builtins();
    let converter = create_converter(&formats, tool, options)?;
    let report = match output_format {
        Some(key) => {
            let requested = formats.require(key)?;
            match converter.output_format() {
                Some(produced) if produced == requested => {}
                _ => anyhow::bail!("Tool '{}' does not produce the '{}' format", tool, key),
            }
            converter.validate_output(file)
        }
        None => converter.validate_input(file),
    }
    .with_context(|| format!("Failed to validate {}", file.display()))?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report to JSON")?;
            println!("{}", json);
        }
        OutputFormat::Text => print_violations(file, &report),
    }
    Ok(report.is_valid())
}

#[derive(Serialize)]
struct ToolEntry<'a> {
    key: &'a str,
    name: &'a str,
    version: &'a str,
    kind: String,
    description: &'a str,
}

#[derive(Serialize)]
struct FormatEntry<'a> {
    key: &'a str,
    version: &'a str,
    description: &'a str,
    schemas: Vec<String>,
}

#[derive(Serialize)]
struct Listing<'a> {
    tools: Vec<ToolEntry<'a>>,
    formats: Vec<FormatEntry<'a>>,
}

/// Execute the list command
pub fn list_command(format: OutputFormat) -> Result<()> {
    let formats = FormatRegistry::with_builtins();
    let converters = ConverterRegistry::with_builtins();
    let listing = Listing {
        tools: converters
            .tools()
            .map(|(key, tool, description)| ToolEntry {
                key,
                name: &tool.name,
                version: &tool.version,
                kind: tool.kind.to_string(),
                description,
            })
            .collect(),
        formats: formats
            .iter()
            .map(|f| FormatEntry {
                key: f.key(),
                version: f.version(),
                description: f.description(),
                schemas: f.schema_refs().iter().map(|s| s.to_string()).collect(),
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&listing).context("Failed to serialize listing to JSON")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("Tools:");
            for tool in &listing.tools {
                println!("  {:<10} {}", tool.key, tool.description);
            }
            println!();
            println!("Output formats:");
            for f in &listing.formats {
                println!("  {:<10} {} {}", f.key, f.version, f.description);
            }
        }
    }
    Ok(())
}

/// Execute the process command
///
/// Returns `false` when a job failed without stopping the run.
pub fn process_command(config_path: Option<&Path>, format: OutputFormat) -> Result<bool> {
    let (settings, base) = load_settings(config_path)?;
    if let OutputFormat::Text = format {
        println!("reportkit v{}", reportkit_metrics::VERSION);
    }
    let summary = run_batch(&settings, &base)?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summary).context("Failed to serialize summary to JSON")?;
            println!("{}", json);
        }
        OutputFormat::Text => print_summary(&summary),
    }
    Ok(summary.succeeded())
}

fn print_summary(summary: &BatchSummary) {
    for job in &summary.jobs {
        println!("Job {} ({})", job.tool, job.pattern);
        if let Some(error) = &job.error {
            println!("  ✗ {}", error);
        }
        for file in &job.files {
            let mark = if file.succeeded() { "✓" } else { "✗" };
            match &file.error {
                Some(error) => println!("  {} {}: {}", mark, file.input.display(), error),
                None => println!("  {} {} -> {}", mark, file.input.display(), file.output.display()),
            }
        }
    }
    println!(
        "Processed {} file(s), {} failure(s)",
        summary.file_count(),
        summary.failure_count()
    );
}

/// Load settings and the directory relative paths are resolved against
pub fn load_settings(config_path: Option<&Path>) -> Result<(Settings, PathBuf)> {
    let path = match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            path.to_path_buf()
        }
        None => {
            // Try to find reportkit.toml in common locations
            let candidates = ["reportkit.toml", ".reportkit.toml"];
            match candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
                Some(path) => path,
                None => return Ok((Settings::default(), PathBuf::from("."))),
            }
        }
    };
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let settings = Settings::from_toml_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    let base = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((settings, base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportkit_core::ParamValue;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&["suite=nightly".to_string(), "retries=3".to_string()]).unwrap();
        assert_eq!(params.get("suite"), Some(&ParamValue::String("nightly".to_string())));
        assert_eq!(params.get("retries"), Some(&ParamValue::String("3".to_string())));
        assert!(parse_params(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_convert() {
        let cli = Cli::try_parse_from([
            "reportkit", "-vv", "convert", "cppunit", "in.xml", "-o", "out.xml", "-p", "a=1", "--param", "b=x",
            "--validate",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Convert {
                tool,
                params,
                validate,
                ..
            } => {
                assert_eq!(tool, "cppunit");
                assert_eq!(params, vec!["a=1", "b=x"]);
                assert!(validate);
            }
            _ => panic!("expected convert"),
        }
    }

    #[test]
    fn test_missing_config_is_an_error() {
        assert!(load_settings(Some(Path::new("/definitely/missing/reportkit.toml"))).is_err());
    }
}

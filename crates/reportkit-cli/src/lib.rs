//! reportkit CLI - Command-line interface library
//!
//! This library provides the CLI functionality for reportkit, including:
//! - Convert: Rewrite a tool report into JUnit
//! - Validate: Check a report or a produced document against its schemas
//! - List: Show registered tools and output formats
//! - Process: Run the batch jobs of `reportkit.toml`
//!
//! # Library Usage
//!
//! ```ignore
//! use reportkit_cli::{convert_command, OutputFormat, ToolOptions};
//!
//! let ok = convert_command(
//!     "cppunit",
//!     &input,
//!     &output,
//!     &ToolOptions::default(),
//!     &ConversionParameters::new(),
//!     true,
//!     OutputFormat::Json,
//! )?;
//! ```
//!
//! # Binary Usage
//!
//! ```bash
//! # Convert a CppUnit report and validate both sides
//! reportkit convert cppunit cppunit-report.xml -o TEST-cppunit.xml --validate
//!
//! # Validate a produced JUnit document
//! reportkit validate cppunit TEST-cppunit.xml --output-format junit
//!
//! # Run the configured batch jobs
//! reportkit process --config reportkit.toml
//! ```

pub mod app;
pub mod batch;
pub mod config;

// Re-export main entry point and types
pub use app::{convert_command, list_command, process_command, validate_command};
pub use app::{init_logging, load_settings, parse_params, run_cli, OutputFormat, ToolOptions};
pub use batch::{run_batch, BatchSummary, FileOutcome, JobOutcome};
pub use config::{Defaults, JobSettings, Settings};

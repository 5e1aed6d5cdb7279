//! reportkit-metrics - format converters for test reports
//!
//! A [`FormatConverter`] rewrites the report of one input tool into an
//! output format, and validates both the consumed and the produced
//! documents. [`ConversionJob`] runs those stages in order for one file.
//!
//! # Architecture
//!
//! ```text
//! ConverterRegistry --factory--> XslConverter
//!                                  |-- TransformationService (template)
//!                                  `-- ValidationService (input / output schemas)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use reportkit_metrics::{ConversionJob, ConverterContext, ConverterRegistry, FormatRegistry};
//!
//! let formats = FormatRegistry::with_builtins();
//! let converters = ConverterRegistry::with_builtins();
//! let converter = converters.create("cppunit", &ConverterContext::new(&formats))?;
//!
//! let report = ConversionJob::new(converter.as_ref())
//!     .run(Path::new("cppunit-report.xml"), Path::new("TEST-cppunit.xml"))?;
//! assert!(report.is_valid());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod builtin;
pub mod converter;
pub mod error;
pub mod job;
pub mod registry;
pub mod tool;

pub use builtin::{junit_format, JUNIT};
pub use converter::{ConverterKind, ExternalTemplate, FormatConverter, XslConverter, XslConverterBuilder};
pub use error::{ConversionError, JobError, MetricError, RegistryError, Result};
pub use job::{ConversionJob, JobOptions, JobReport, JobStage};
pub use registry::{ConverterContext, ConverterFactory, ConverterRegistry, FormatRegistry};
pub use tool::{ToolInfo, ToolKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

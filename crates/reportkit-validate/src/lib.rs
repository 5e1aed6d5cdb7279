//! reportkit-validate - schema validation service
//!
//! Documents are checked against one or more schema definitions written in
//! the XML Schema language. Every schema in the list must accept the
//! document; the violations of each schema are concatenated in list order.
//!
//! # Architecture
//!
//! The [`ValidationService`] trait is the seam used by converters. The
//! provided [`XsdValidationService`] resolves schema locators through a
//! [`ResourceBundle`], compiles them (through a [`SchemaCache`]) and runs the
//! document through each compiled [`Schema`].
//!
//! # Example
//!
//! ```
//! use reportkit_core::EmbeddedBundle;
//! use reportkit_core::SchemaLocator;
//! use reportkit_validate::XsdValidationService;
//!
//! static ENTRIES: &[(&str, &str)] = &[(
//!     "suite.xsd",
//!     r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
//!          <xs:element name="testsuite"/>
//!        </xs:schema>"#,
//! )];
//! let bundle = EmbeddedBundle::new("demo", ENTRIES);
//! let service = XsdValidationService::new();
//!
//! let report = service.validate_str(&bundle, &[SchemaLocator::resource("suite.xsd")], "<testsuite/>")?;
//! assert!(report.is_valid());
//!
//! let report = service.validate_str(&bundle, &[SchemaLocator::resource("suite.xsd")], "<results/>")?;
//! assert_eq!(report.len(), 1);
//! # Ok::<(), reportkit_validate::ValidationFailure>(())
//! ```

mod builtin;
pub mod cache;
pub mod error;
pub mod schema;
mod validator;

use std::path::Path;
use std::sync::Arc;

use reportkit_core::{
    LoadedResource, ResourceBundle, SchemaLocator, ValidationReport, XmlDocument,
};
use tracing::{debug, info};

pub use cache::SchemaCache;
pub use error::{Result, ValidationFailure};
pub use schema::{Schema, XSD_NAMESPACE, XSI_NAMESPACE};

/// Validates documents against lists of schemas
pub trait ValidationService: Send + Sync {
    /// Validate the document at `document` against every schema in `schemas`
    ///
    /// Named schemas are resolved through `bundle`. Structural problems are
    /// returned in the report; only unreadable or unparseable inputs fail.
    fn validate(
        &self,
        bundle: &dyn ResourceBundle,
        schemas: &[SchemaLocator],
        document: &Path,
    ) -> Result<ValidationReport>;
}

/// Validation service for the supported XML Schema subset
#[derive(Debug, Default, Clone)]
pub struct XsdValidationService {
    cache: Arc<SchemaCache>,
}

impl XsdValidationService {
    /// Create a service with its own schema cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a service sharing an existing cache
    pub fn with_cache(cache: Arc<SchemaCache>) -> Self {
        Self { cache }
    }

    /// The schema cache used by this service
    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Resolve and compile every locator, in order
    ///
    /// All locators are resolved before any is compiled, so a missing schema
    /// is reported as a resolution failure even when an earlier one is broken.
    pub fn load_schemas(
        &self,
        bundle: &dyn ResourceBundle,
        schemas: &[SchemaLocator],
    ) -> Result<Vec<Arc<Schema>>> {
        let resources = schemas
            .iter()
            .map(|locator| locator.resolve(bundle))
            .collect::<std::result::Result<Vec<LoadedResource>, _>>()?;
        resources
            .iter()
            .map(|resource| self.cache.get_or_compile(resource))
            .collect()
    }

    /// Validate an already-parsed document against compiled schemas
    pub fn validate_document(&self, schemas: &[Arc<Schema>], document: &XmlDocument) -> ValidationReport {
        let mut report = ValidationReport::new();
        for schema in schemas {
            let mut errors = ValidationReport::from(validator::validate(schema, document));
            errors.sort_by_position();
            debug!("Schema {} reported {} violation(s)", schema.id(), errors.len());
            report.extend(errors);
        }
        report
    }

    /// Validate in-memory document text
    pub fn validate_str(
        &self,
        bundle: &dyn ResourceBundle,
        schemas: &[SchemaLocator],
        text: &str,
    ) -> Result<ValidationReport> {
        let compiled = self.load_schemas(bundle, schemas)?;
        let document = XmlDocument::parse(text).map_err(|source| ValidationFailure::Document {
            document: "<memory>".to_string(),
            source,
        })?;
        Ok(self.validate_document(&compiled, &document))
    }
}

impl ValidationService for XsdValidationService {
    fn validate(
        &self,
        bundle: &dyn ResourceBundle,
        schemas: &[SchemaLocator],
        document: &Path,
    ) -> Result<ValidationReport> {
        let compiled = self.load_schemas(bundle, schemas)?;
        let parsed = XmlDocument::from_file(document).map_err(|source| ValidationFailure::Document {
            document: document.display().to_string(),
            source,
        })?;
        let report = self.validate_document(&compiled, &parsed);
        info!(
            "Validated {} against {} schema(s): {} violation(s)",
            document.display(),
            compiled.len(),
            report.len()
        );
        Ok(report)
    }
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

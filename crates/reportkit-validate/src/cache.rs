//! Compiled schema cache

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reportkit_core::LoadedResource;
use tracing::debug;

use crate::error::Result;
use crate::schema::Schema;

#[derive(Debug)]
struct Entry {
    text: String,
    schema: Arc<Schema>,
}

/// Compiled schemas keyed by resource identity
///
/// An entry is reused only while the resource text is unchanged, so an
/// override file edited between runs is recompiled.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl SchemaCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the compiled form of `resource`, compiling it on first use
    pub fn get_or_compile(&self, resource: &LoadedResource) -> Result<Arc<Schema>> {
        if let Some(schema) = self.lookup(resource) {
            debug!("Schema cache hit for {}", resource.id);
            return Ok(schema);
        }
        let schema = Arc::new(Schema::parse(resource.id.clone(), &resource.text)?);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                resource.id.clone(),
                Entry {
                    text: resource.text.clone(),
                    schema: Arc::clone(&schema),
                },
            );
        }
        Ok(schema)
    }

    fn lookup(&self, resource: &LoadedResource) -> Option<Arc<Schema>> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(&resource.id)
            .filter(|entry| entry.text == resource.text)
            .map(|entry| Arc::clone(&entry.schema))
    }

    /// Number of cached schemas
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached schema
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

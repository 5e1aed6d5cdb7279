//! Resource bundles
//!
//! Templates and schemas that ship with a converter or format are resolved
//! through a [`ResourceBundle`]: an opaque handle, passed in at construction
//! time, that maps a relative name to bytes.

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::ResolutionError;

/// Resolves relative resource names to bytes
pub trait ResourceBundle: Send + Sync {
    /// Namespace the names are relative to (used in errors and cache keys)
    fn namespace(&self) -> &str;

    /// Load the named resource
    fn load(&self, name: &str) -> Result<Vec<u8>, ResolutionError>;

    /// Check whether a resource exists
    fn contains(&self, name: &str) -> bool {
        self.load(name).is_ok()
    }
}

impl fmt::Debug for dyn ResourceBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceBundle({})", self.namespace())
    }
}

/// Normalize a resource name: strip leading `/` and `./`
fn normalize(name: &str) -> &str {
    let mut name = name.trim_start_matches('/');
    while let Some(rest) = name.strip_prefix("./") {
        name = rest;
    }
    name
}

/// Resources compiled into the binary
///
/// # Example
///
/// ```
/// use reportkit_core::{EmbeddedBundle, ResourceBundle};
///
/// static ENTRIES: &[(&str, &str)] = &[("xsl/identity.xsl", "<xsl:stylesheet/>")];
/// let bundle = EmbeddedBundle::new("demo", ENTRIES);
/// assert!(bundle.contains("xsl/identity.xsl"));
/// assert!(bundle.contains("/xsl/identity.xsl"));
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedBundle {
    namespace: String,
    entries: &'static [(&'static str, &'static str)],
}

impl EmbeddedBundle {
    /// Create a bundle from a static `(name, contents)` table
    pub fn new(namespace: impl Into<String>, entries: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            namespace: namespace.into(),
            entries,
        }
    }

    /// A bundle holding no resources
    pub fn empty(namespace: impl Into<String>) -> Self {
        Self::new(namespace, &[])
    }

    /// Names of all bundled resources
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }
}

impl ResourceBundle for EmbeddedBundle {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn load(&self, name: &str) -> Result<Vec<u8>, ResolutionError> {
        let wanted = normalize(name);
        self.entries
            .iter()
            .find(|(entry, _)| *entry == wanted)
            .map(|(_, contents)| contents.as_bytes().to_vec())
            .ok_or_else(|| ResolutionError::NotFound {
                namespace: self.namespace.clone(),
                name: name.to_string(),
            })
    }

    fn contains(&self, name: &str) -> bool {
        let wanted = normalize(name);
        self.entries.iter().any(|(entry, _)| *entry == wanted)
    }
}

/// Resources read from a directory tree
///
/// Names may not escape the root directory.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    namespace: String,
    root: PathBuf,
}

impl DirectoryBundle {
    /// Create a bundle rooted at `root`
    pub fn new(namespace: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
            root: root.into(),
        }
    }

    /// Root directory of the bundle
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(normalize(name));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl ResourceBundle for DirectoryBundle {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn load(&self, name: &str) -> Result<Vec<u8>, ResolutionError> {
        let not_found = || ResolutionError::NotFound {
            namespace: self.namespace.clone(),
            name: name.to_string(),
        };
        let path = self.path_for(name).ok_or_else(not_found)?;
        debug!("Loading resource {} from {}", name, path.display());
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(source) => Err(ResolutionError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    static ENTRIES: &[(&str, &str)] = &[("xsd/a.xsd", "<a/>"), ("b.xsl", "<b/>")];

    #[test]
    fn test_embedded_lookup() {
        let bundle = EmbeddedBundle::new("tools/demo", ENTRIES);
        assert_eq!(bundle.load("xsd/a.xsd").unwrap(), b"<a/>");
        assert_eq!(bundle.load("./b.xsl").unwrap(), b"<b/>");
        assert_eq!(bundle.names().count(), 2);
    }

    #[test]
    fn test_embedded_missing() {
        let bundle = EmbeddedBundle::empty("tools/demo");
        let err = bundle.load("missing.xsd").unwrap_err();
        match err {
            ResolutionError::NotFound { namespace, name } => {
                assert_eq!(namespace, "tools/demo");
                assert_eq!(name, "missing.xsd");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_directory_bundle() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("xsl")).unwrap();
        fs::write(dir.path().join("xsl/t.xsl"), "<t/>").unwrap();

        let bundle = DirectoryBundle::new("local", dir.path());
        assert_eq!(bundle.load("xsl/t.xsl").unwrap(), b"<t/>");
        assert!(matches!(
            bundle.load("xsl/none.xsl"),
            Err(ResolutionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_directory_bundle_rejects_escape() {
        let dir = TempDir::new().unwrap();
        let bundle = DirectoryBundle::new("local", dir.path());
        assert!(!bundle.contains("../etc/passwd"));
    }
}

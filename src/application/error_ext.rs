//! Error conversion helpers adding path context to I/O and parse failures.

use std::io;
use std::path::Path;

use crate::application::{ApplicationError, ApplicationResult};

/// Extension trait for converting `io::Result` to `ApplicationResult` with context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    ///
    /// # Example
    /// ```ignore
    /// fs.read_to_string(&table)
    ///     .with_path_context("read table", &table)?;
    /// ```
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: format!("{}: {}", action, path.display()),
            source: Box::new(e),
        })
    }
}

/// Report a manifest deserialization failure against the manifest file.
pub trait ManifestResultExt<T> {
    fn in_manifest(self, path: &Path) -> ApplicationResult<T>;
}

impl<T> ManifestResultExt<T> for Result<T, toml::de::Error> {
    fn in_manifest(self, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::InvalidManifest {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }
}

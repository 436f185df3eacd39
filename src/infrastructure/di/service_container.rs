//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{ExportService, TreeLoader};
use crate::config::Settings;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    pub loader: TreeLoader,
    pub exporter: ExportService,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(settings, Arc::new(RealFileSystem))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>) -> Self {
        let settings = Arc::new(settings);
        Self {
            settings,
            loader: TreeLoader::new(fs.clone()),
            exporter: ExportService::new(fs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TreeSource;
    use crate::util::testing;

    #[test]
    fn test_services_share_injected_filesystem() {
        testing::init_test_setup();
        let container = ServiceContainer::with_deps(Settings::default(), Arc::new(RealFileSystem));

        let tree = container.loader.load(&testing::resource("qa.toml")).unwrap();

        assert_eq!(container.settings.n_entries, 100_000_000);
        assert_eq!(tree.name(), "qa");
    }
}

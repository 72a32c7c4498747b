use std::fs;
use std::path::Path;

/// Filesystem questions the bootstrap pipeline needs answered.
pub trait PathProbe {
    fn exists(&self, path: &Path) -> bool;

    /// A path that resolves to an existing directory. Listing permission is
    /// not required: after privileges are dropped the home directory may no
    /// longer be readable.
    fn is_accessible_dir(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPaths;

impl PathProbe for LocalPaths {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_accessible_dir(&self, path: &Path) -> bool {
        fs::metadata(path).is_ok_and(|metadata| metadata.is_dir())
    }
}

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("user home directory {} does not exist or is not accessible", path.display())]
    HomeDirUnavailable { path: PathBuf },

    #[error("failed to read {}: {message}", path.display())]
    Dotfile { path: PathBuf, message: String },
}

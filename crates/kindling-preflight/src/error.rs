use std::path::PathBuf;

use semver::Version;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PreflightError {
    #[error("{runtime} {found} is not supported; version {minimum} or newer is required")]
    UnsupportedRuntime {
        runtime: String,
        found: Version,
        minimum: Version,
    },

    #[error("refusing to continue with elevated privileges: {message}")]
    PrivilegeDrop { message: String },

    #[error("{}", missing_home_message(.path.as_ref()))]
    MissingHomeDir { path: Option<PathBuf> },
}

fn missing_home_message(path: Option<&PathBuf>) -> String {
    match path {
        Some(path) => format!("user home directory {} does not exist", path.display()),
        None => "user home directory could not be determined".to_string(),
    }
}

use thiserror::Error;

/// Failures while fetching package metadata from a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("package name must not be empty")]
    EmptyPackageName,

    #[error("invalid registry url '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("registry request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("registry returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("registry response from {url} is not package metadata: {message}")]
    Body { url: String, message: String },
}

impl RegistryError {
    /// True when the registry could not be reached at all (including timeouts).
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

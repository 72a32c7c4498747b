mod client;
mod error;
mod metadata;

pub use client::{
    fetch_metadata, package_url, MetadataSource, RegistryClient, DEFAULT_REGISTRY_URL,
    OFFICIAL_REGISTRY_ALIAS, OFFICIAL_REGISTRY_URL, REQUEST_TIMEOUT,
};
pub use error::RegistryError;
pub use metadata::RegistryMetadata;

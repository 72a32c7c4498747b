use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value};

/// The part of a registry package document this tool reads: the keys of its
/// `versions` object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryMetadata {
    pub versions: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct PackageDocument {
    versions: Map<String, Value>,
}

impl RegistryMetadata {
    pub fn from_json_slice(input: &[u8]) -> Result<Self, serde_json::Error> {
        let document: PackageDocument = serde_json::from_slice(input)?;
        Ok(Self {
            versions: document.versions.into_iter().map(|(key, _)| key).collect(),
        })
    }

    pub fn version_strs(&self) -> impl Iterator<Item = &str> {
        self.versions.iter().map(String::as_str)
    }
}

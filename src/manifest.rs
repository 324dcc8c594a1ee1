//! Asset manifest
//!
//! The fixed list of resource identifiers a generation must contain to be
//! considered valid. Every entry is equally critical.

use crate::error::{OffcacheError, OffcacheResult};
use std::collections::HashSet;

/// Ordered, de-duplicated set of asset identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    assets: Vec<String>,
}

impl AssetManifest {
    /// Build a manifest, dropping duplicates while keeping first-seen order
    pub fn new<I, S>(assets: I) -> OffcacheResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();

        for asset in assets {
            let asset = asset.into();
            let trimmed = asset.trim();
            if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
                return Err(OffcacheError::ManifestEntry(asset));
            }
            if seen.insert(trimmed.to_string()) {
                ordered.push(trimmed.to_string());
            }
        }

        if ordered.is_empty() {
            return Err(OffcacheError::ManifestEmpty);
        }

        Ok(Self { assets: ordered })
    }

    /// Number of assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Always false: empty manifests are rejected at construction
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Iterate identifiers in manifest order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().map(String::as_str)
    }

    /// Whether an identifier is part of the manifest
    pub fn contains(&self, identifier: &str) -> bool {
        self.assets.iter().any(|a| a == identifier)
    }

    /// Identifiers from the manifest that are absent from `present`
    pub fn missing_from<'a>(&'a self, present: &HashSet<String>) -> Vec<&'a str> {
        self.iter().filter(|a| !present.contains(*a)).collect()
    }

    /// True when `present` holds exactly the manifest identifiers
    pub fn is_satisfied_by(&self, present: &HashSet<String>) -> bool {
        present.len() == self.len() && self.missing_from(present).is_empty()
    }
}

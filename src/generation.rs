//! Generation naming
//!
//! A deployment owns two generation names: the live one
//! (`<app>-<version>`) and the staging one (`<app>-temp-<version>`).
//! The app prefix is everything before the first `-`.

use crate::error::{OffcacheError, OffcacheResult};
use std::fmt;

/// Separator between name components
pub const SEPARATOR: char = '-';

/// Extract the app prefix from a generation name
pub fn app_prefix(name: &str) -> &str {
    name.split(SEPARATOR).next().unwrap_or(name)
}

/// Live and staging generation names for one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationNames {
    live: String,
    staging: String,
}

impl GenerationNames {
    /// Derive names from an app name and version tag
    pub fn new(app_name: &str, version: &str) -> OffcacheResult<Self> {
        if app_name.is_empty() || app_name.contains(SEPARATOR) {
            // A separator inside the app name would shorten the derived prefix
            return Err(OffcacheError::GenerationName(app_name.to_string()));
        }
        if version.is_empty() || version.contains(['/', '\\']) {
            return Err(OffcacheError::GenerationName(version.to_string()));
        }

        Ok(Self {
            live: format!("{app_name}{SEPARATOR}{version}"),
            staging: format!("{app_name}{SEPARATOR}temp{SEPARATOR}{version}"),
        })
    }

    /// Use explicit names, as a pre-stamped worker would
    pub fn from_parts(live: impl Into<String>, staging: impl Into<String>) -> Self {
        Self {
            live: live.into(),
            staging: staging.into(),
        }
    }

    /// The generation consulted for fallback
    pub fn live(&self) -> &str {
        &self.live
    }

    /// The generation populated during install
    pub fn staging(&self) -> &str {
        &self.staging
    }

    /// App prefix shared by this deployment's generations
    pub fn prefix(&self) -> &str {
        app_prefix(&self.live)
    }

    /// Whether `name` is an older generation of this app that should be removed
    pub fn is_stale(&self, name: &str) -> bool {
        let prefix = self.prefix();
        name.len() > prefix.len()
            && name.starts_with(prefix)
            && name[prefix.len()..].starts_with(SEPARATOR)
            && name != self.live
            && name != self.staging
    }

    /// Select stale generations from a list of names
    pub fn stale<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|n| self.is_stale(n))
            .cloned()
            .collect()
    }
}

impl fmt::Display for GenerationNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (staging {})", self.live, self.staging)
    }
}

/// Whether a client is pinned to an old deployment and should re-register.
///
/// True when caches exist but none of them belongs to `version`.
pub fn needs_rescue<'a, I>(names: I, version: &str) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    let marker = format!("{SEPARATOR}{version}");
    let mut any = false;
    for name in names {
        if name.contains(&marker) {
            return false;
        }
        any = true;
    }
    any
}

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Target package name must not be empty")]
    EmptyTarget,
}

/// What to search for and which kinds of releases to look at.
///
/// Immutable once built. A policy that selects neither development nor
/// tagged releases is normalized to development-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchPolicy {
    target: String,
    include_dev_releases: bool,
    include_tagged_releases: bool,
}

impl SearchPolicy {
    pub fn new(
        target: impl Into<String>,
        include_dev_releases: bool,
        include_tagged_releases: bool,
    ) -> Result<Self, PolicyError> {
        let target = target.into();
        if target.trim().is_empty() {
            return Err(PolicyError::EmptyTarget);
        }

        let include_dev_releases = include_dev_releases || !include_tagged_releases;

        Ok(Self {
            target,
            include_dev_releases,
            include_tagged_releases,
        })
    }

    /// Development releases only.
    pub fn dev_only(target: impl Into<String>) -> Result<Self, PolicyError> {
        Self::new(target, true, false)
    }

    /// Tagged releases only.
    pub fn tagged_only(target: impl Into<String>) -> Result<Self, PolicyError> {
        Self::new(target, false, true)
    }

    /// Every non-alias release.
    pub fn all(target: impl Into<String>) -> Result<Self, PolicyError> {
        Self::new(target, true, true)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn include_dev_releases(&self) -> bool {
        self.include_dev_releases
    }

    pub fn include_tagged_releases(&self) -> bool {
        self.include_tagged_releases
    }
}
